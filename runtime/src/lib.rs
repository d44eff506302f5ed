//! # Brewline Runtime
//!
//! Process-side machinery for the Brewline order lifecycle coordinator.
//!
//! The coordination core in one picture:
//!
//! ```text
//! intake ──create/pay──> OrderStore
//!   │                        ▲
//!   ├──publish NewWork──> EventBus ──> FulfillmentListener
//!   │                        ▲           (brew, assign worker,
//!   └──track──> TrackingSet  │            publish WorkCompleted)
//!                   │        │
//!                   ▼        │
//!        ReconciliationScheduler ──ResilienceGate──> remote order calls
//!            (fixed-interval poll; Brewed -> Taken)
//! ```
//!
//! - [`circuit_breaker`] / [`bulkhead`] / [`gate`]: the resilience layer
//!   around every remote call the scheduler makes
//! - [`client`]: the two gate-wrapped remote call sites
//! - [`fulfillment`]: the `new-work` consumer
//! - [`intake`]: the producing side's create/pay path
//! - [`scheduler`]: the tracking set and the polling loop
//! - [`config`]: tunables for all of the above

pub mod bulkhead;
pub mod circuit_breaker;
pub mod client;
pub mod config;
pub mod fulfillment;
pub mod gate;
pub mod intake;
pub mod scheduler;

pub use bulkhead::{Bulkhead, BulkheadConfig, BulkheadError};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};
pub use client::OrderClient;
pub use config::CoordinatorConfig;
pub use fulfillment::{FulfillmentListener, FulfillmentOutcome};
pub use gate::{GateError, ResilienceGate};
pub use intake::OrderIntake;
pub use scheduler::{ReconcileOutcome, ReconciliationScheduler, SchedulerHandle, TrackingSet};
