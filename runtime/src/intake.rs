//! The producing side's intake path: create, pay, hand off to fulfillment.
//!
//! HTTP wiring is out of scope; this is the boundary the request handler
//! calls into. `pay` persists the `Init → Paid` transition first, publishes
//! `NewWork` second, and only then registers the order with the tracking set
//! so the reconciliation scheduler starts polling it. Transition failures are
//! returned synchronously to the caller.

use crate::scheduler::TrackingSet;
use brewline_core::{
    EventBus, Money, Order, OrderId, OrderStatus, OrderStore, OrderStoreError, WorkEvent,
    WorkEventKind,
};
use std::sync::Arc;

/// The order-creation path of the producing service.
pub struct OrderIntake {
    store: Arc<dyn OrderStore>,
    bus: Arc<dyn EventBus>,
    tracking: TrackingSet,
}

impl OrderIntake {
    /// Create an intake over the store, the bus, and the scheduler's
    /// tracking set.
    #[must_use]
    pub fn new(store: Arc<dyn OrderStore>, bus: Arc<dyn EventBus>, tracking: TrackingSet) -> Self {
        Self {
            store,
            bus,
            tracking,
        }
    }

    /// Create a new order in the `Init` state.
    ///
    /// # Errors
    ///
    /// Returns [`OrderStoreError::EmptyItems`] for an empty item list, or
    /// whatever the store surfaces.
    pub async fn place(
        &self,
        customer: &str,
        items: Vec<String>,
        total: Money,
    ) -> Result<Order, OrderStoreError> {
        let order = self.store.create(customer, items, total).await?;
        tracing::info!(order_id = %order.id, customer = %order.customer, "Order placed");
        Ok(order)
    }

    /// Confirm payment: `Init → Paid`, announce the work, start tracking.
    ///
    /// The transition is persisted before `NewWork` is published; the order
    /// enters the tracking set last, after the hand-off to fulfillment is on
    /// its way.
    ///
    /// # Errors
    ///
    /// Transition failures (`InvalidTransition`, `Conflict`, `NotFound`)
    /// surface synchronously to the caller.
    pub async fn pay(&self, id: OrderId) -> Result<Order, OrderStoreError> {
        let paid = self.store.apply_transition(id, OrderStatus::Paid).await?;

        let event = WorkEvent::new(paid.id, WorkEventKind::NewWork);
        if let Err(err) = self.bus.publish(WorkEventKind::NewWork.topic(), &event).await {
            // The bus is at-least-once, not exactly-once; a lost publish here
            // leaves the order Paid and is an operational signal, not a
            // caller-visible failure of the payment itself.
            tracing::error!(order_id = %paid.id, error = %err, "Failed to publish NewWork");
        }

        self.tracking.track(paid.clone()).await;
        tracing::info!(order_id = %paid.id, "Order paid and tracked for reconciliation");
        Ok(paid)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use brewline_core::{NEW_WORK_TOPIC, TransitionError};
    use brewline_testing::mocks::{InMemoryEventBus, InMemoryOrderStore};
    use futures::StreamExt;

    fn intake(
        store: &Arc<InMemoryOrderStore>,
        bus: &Arc<InMemoryEventBus>,
        tracking: TrackingSet,
    ) -> OrderIntake {
        OrderIntake::new(
            Arc::clone(store) as Arc<dyn OrderStore>,
            Arc::clone(bus) as Arc<dyn EventBus>,
            tracking,
        )
    }

    #[tokio::test]
    async fn place_rejects_empty_items() {
        let store = Arc::new(InMemoryOrderStore::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let intake = intake(&store, &bus, TrackingSet::new());

        let result = intake.place("alice", vec![], Money::zero("USD")).await;
        assert_eq!(result, Err(OrderStoreError::EmptyItems));
    }

    #[tokio::test]
    async fn pay_publishes_new_work_and_tracks() {
        let store = Arc::new(InMemoryOrderStore::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let tracking = TrackingSet::new();
        let intake = intake(&store, &bus, tracking.clone());

        let mut new_work = bus.subscribe(&[NEW_WORK_TOPIC]).await.unwrap();

        let order = intake
            .place("alice", vec!["latte".into()], Money::new(450, "USD").unwrap())
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Init);

        let paid = intake.pay(order.id).await.unwrap();
        assert_eq!(paid.status, OrderStatus::Paid);

        let event = new_work.next().await.unwrap().unwrap();
        assert_eq!(event.order_id, order.id);
        assert_eq!(event.kind, WorkEventKind::NewWork);
        assert!(tracking.contains(order.id).await);
    }

    #[tokio::test]
    async fn double_pay_surfaces_conflict_synchronously() {
        let store = Arc::new(InMemoryOrderStore::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let intake = intake(&store, &bus, TrackingSet::new());

        let order = intake
            .place("bob", vec!["mocha".into()], Money::zero("USD"))
            .await
            .unwrap();
        intake.pay(order.id).await.unwrap();

        let second = intake.pay(order.id).await;
        assert_eq!(
            second,
            Err(OrderStoreError::Transition(TransitionError::Conflict {
                current: OrderStatus::Paid,
            }))
        );
    }
}
