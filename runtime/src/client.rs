//! Gate-wrapped remote order calls used by the reconciliation scheduler.
//!
//! The scheduler makes exactly two kinds of remote call: a state fetch and
//! the pickup transition. Both go through the same [`ResilienceGate`] (one
//! call-group named "order"), so the breaker window and bulkhead ceiling are
//! shared across every call the loop fans out.

use crate::gate::{GateError, ResilienceGate};
use brewline_core::{Order, OrderId, OrderStatus, OrderStore, OrderStoreError};
use std::sync::Arc;

/// Result of a gated remote order call.
pub type ClientResult<T> = Result<T, GateError<OrderStoreError>>;

/// Remote order-query client.
///
/// Wraps the remote order store behind the call-group's resilience gate; the
/// two methods are the only call sites the scheduler uses.
#[derive(Clone)]
pub struct OrderClient {
    store: Arc<dyn OrderStore>,
    gate: Arc<ResilienceGate>,
}

impl OrderClient {
    /// Create a client over a remote store and its call-group gate.
    #[must_use]
    pub fn new(store: Arc<dyn OrderStore>, gate: Arc<ResilienceGate>) -> Self {
        Self { store, gate }
    }

    /// Fetch an order's current remote state.
    ///
    /// # Errors
    ///
    /// Returns a [`GateError`]: a resilience rejection, or the store's own
    /// error wrapped in [`GateError::Inner`].
    pub async fn get_order(&self, id: OrderId) -> ClientResult<Order> {
        self.gate.call(|| self.store.get(id)).await
    }

    /// Request a state transition on the remote order.
    ///
    /// # Errors
    ///
    /// Returns a [`GateError`]: a resilience rejection, or the store's own
    /// error wrapped in [`GateError::Inner`].
    pub async fn update_state(&self, id: OrderId, target: OrderStatus) -> ClientResult<Order> {
        self.gate
            .call(|| self.store.apply_transition(id, target))
            .await
    }

    /// The gate protecting this client's call-group.
    #[must_use]
    pub fn gate(&self) -> &ResilienceGate {
        &self.gate
    }
}
