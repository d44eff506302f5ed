//! The fulfillment listener: consumes `new-work`, brews, announces completion.
//!
//! On `NewWork(order_id)` the listener re-fetches the order (events carry no
//! state), drives it `Paid → Brewing → Brewed` with the worker identity
//! attached, and only then publishes `WorkCompleted`. The persisted state
//! change completes before the completion event goes out, so any poll that
//! races the event still observes the new state.
//!
//! Delivery is at-least-once: a redelivered `NewWork` for an order already at
//! `Brewing` or beyond is a no-op. A malformed payload or an unresolvable
//! order identifier is logged and dropped without retry.

use brewline_core::{
    EventBus, EventBusError, NEW_WORK_TOPIC, Order, OrderId, OrderStatus, OrderStore,
    OrderStoreError, WorkEvent, WorkEventKind, WorkerId,
};
use futures::StreamExt;
use std::sync::Arc;

/// Outcome of handling one `NewWork` event, for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FulfillmentOutcome {
    /// The order was brewed and `WorkCompleted` published
    Fulfilled(OrderId),
    /// Redelivery of work already done (or in progress); nothing happened
    AlreadyHandled(OrderId),
    /// The order does not exist: referential bug, surfaced loudly, dropped
    UnknownOrder(OrderId),
}

/// Subscribes to `new-work` and performs fulfillment.
pub struct FulfillmentListener {
    store: Arc<dyn OrderStore>,
    bus: Arc<dyn EventBus>,
    worker: WorkerId,
}

impl FulfillmentListener {
    /// Create a listener for one fulfilling worker.
    #[must_use]
    pub fn new(store: Arc<dyn OrderStore>, bus: Arc<dyn EventBus>, worker: WorkerId) -> Self {
        Self { store, bus, worker }
    }

    /// Consume `new-work` events until the stream ends.
    ///
    /// Per-event failures are logged and never crash the loop; only a failed
    /// subscription is returned to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::SubscriptionFailed`] if the subscription
    /// cannot be established.
    pub async fn run(&self) -> Result<(), EventBusError> {
        let mut stream = self.bus.subscribe(&[NEW_WORK_TOPIC]).await?;
        tracing::info!(worker = %self.worker, "Fulfillment listener subscribed to {NEW_WORK_TOPIC}");

        while let Some(item) = stream.next().await {
            match item {
                Ok(event) => {
                    if let Err(err) = self.handle(&event).await {
                        // Handler failures are not redelivered by this design.
                        tracing::error!(
                            order_id = %event.order_id,
                            error = %err,
                            "Fulfillment failed; event dropped"
                        );
                    }
                }
                Err(err) => {
                    // Poison message: log and drop, no retry.
                    tracing::error!(error = %err, "Undecodable work event dropped");
                }
            }
        }

        tracing::info!(worker = %self.worker, "Fulfillment listener stream ended");
        Ok(())
    }

    /// Handle a single `NewWork` event.
    ///
    /// # Errors
    ///
    /// Returns [`OrderStoreError`] for store failures other than the handled
    /// idempotence and not-found cases.
    pub async fn handle(&self, event: &WorkEvent) -> Result<FulfillmentOutcome, OrderStoreError> {
        if event.kind != WorkEventKind::NewWork {
            tracing::warn!(kind = %event.kind, "Ignoring unexpected event kind on {NEW_WORK_TOPIC}");
            return Ok(FulfillmentOutcome::AlreadyHandled(event.order_id));
        }

        let order = match self.store.get(event.order_id).await {
            Ok(order) => order,
            Err(OrderStoreError::NotFound(id)) => {
                // Referential integrity failure: surface loudly, never retry.
                tracing::error!(order_id = %id, "NewWork for unknown order; dropping");
                return Ok(FulfillmentOutcome::UnknownOrder(id));
            }
            Err(err) => return Err(err),
        };

        if order.status.rank() >= OrderStatus::Brewing.rank() {
            tracing::debug!(
                order_id = %order.id,
                status = %order.status,
                "Duplicate NewWork delivery; no-op"
            );
            return Ok(FulfillmentOutcome::AlreadyHandled(order.id));
        }

        let brewed = self.brew(&order).await?;

        // Persisted state first, completion signal second.
        let completed = WorkEvent::new(brewed.id, WorkEventKind::WorkCompleted);
        if let Err(err) = self
            .bus
            .publish(WorkEventKind::WorkCompleted.topic(), &completed)
            .await
        {
            // State is already Brewed; the scheduler's polling path still
            // completes the lifecycle without this signal.
            tracing::warn!(order_id = %brewed.id, error = %err, "Failed to publish WorkCompleted");
        }

        Ok(FulfillmentOutcome::Fulfilled(brewed.id))
    }

    /// Drive `Paid → Brewing → Brewed` with the worker identity attached.
    async fn brew(&self, order: &Order) -> Result<Order, OrderStoreError> {
        tracing::info!(order_id = %order.id, worker = %self.worker, "Brewing order");

        self.store
            .apply_transition(order.id, OrderStatus::Brewing)
            .await?;
        self.store
            .assign_fulfiller(order.id, self.worker.clone())
            .await?;
        let brewed = self
            .store
            .apply_transition(order.id, OrderStatus::Brewed)
            .await?;

        tracing::info!(order_id = %brewed.id, "Order brewed, awaiting pickup");
        Ok(brewed)
    }
}
