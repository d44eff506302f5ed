//! # Brewline Testing
//!
//! In-memory implementations of the coordinator's external collaborators,
//! used across the workspace's unit and integration tests:
//!
//! - [`mocks::InMemoryOrderStore`]: a machine-validated order store with
//!   per-record atomic compare-and-write and transport-failure injection
//! - [`mocks::InMemoryEventBus`]: an at-least-once publish/subscribe bus with
//!   per-key ordering and a raw-payload hook for poison-message tests
//!
//! ## Example
//!
//! ```rust
//! use brewline_core::{Money, OrderStatus};
//! use brewline_testing::mocks::InMemoryOrderStore;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = InMemoryOrderStore::new();
//! let order = store
//!     .create_order("alice", vec!["latte".into()], Money::zero("USD"))
//!     .await
//!     .unwrap();
//! let paid = store.apply(order.id, OrderStatus::Paid).await.unwrap();
//! assert_eq!(paid.status, OrderStatus::Paid);
//! # }
//! ```

pub mod mocks;

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Install a test tracing subscriber, once per process.
///
/// Honors `RUST_LOG`; defaults to `warn` so passing tests stay quiet.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
