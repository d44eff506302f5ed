//! In-memory collaborators for tests.

use brewline_core::{
    EventBus, EventBusError, EventStream, Money, Order, OrderId, OrderStatus, OrderStore,
    OrderStoreError, StoreFuture, WorkEvent, WorkerId, machine,
};
use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, UnboundedSender};

#[derive(Debug, Default)]
struct StoreInner {
    orders: HashMap<OrderId, Order>,
    next_id: u64,
    fail_budget: u32,
}

/// In-memory order store with per-record atomic compare-and-write.
///
/// Every operation validates through the state machine under one lock, so
/// concurrent duplicate transitions observe exactly one winner. `fail_next`
/// makes the following operations fail with a transport error, for breaker
/// and scheduler failure-path tests.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl InMemoryOrderStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` operations fail with a transport error.
    pub async fn fail_next(&self, n: u32) {
        let mut inner = self.inner.lock().await;
        inner.fail_budget = n;
    }

    /// Remove a record outright, simulating referential breakage.
    pub async fn evict(&self, id: OrderId) {
        let mut inner = self.inner.lock().await;
        inner.orders.remove(&id);
    }

    /// Fetch an order that must exist.
    ///
    /// # Panics
    ///
    /// Panics if the order is not in the store; test helper only.
    #[allow(clippy::panic)]
    pub async fn expect_order(&self, id: OrderId) -> Order {
        let inner = self.inner.lock().await;
        match inner.orders.get(&id) {
            Some(order) => order.clone(),
            None => panic!("order {id} not in store"),
        }
    }

    fn consume_failure(inner: &mut StoreInner) -> Result<(), OrderStoreError> {
        if inner.fail_budget > 0 {
            inner.fail_budget -= 1;
            return Err(OrderStoreError::Transport("injected failure".to_string()));
        }
        Ok(())
    }

    /// Create a new `Init` order.
    ///
    /// # Errors
    ///
    /// Returns [`OrderStoreError::EmptyItems`] for an empty item list, or an
    /// injected transport failure.
    pub async fn create_order(
        &self,
        customer: &str,
        items: Vec<String>,
        total: Money,
    ) -> Result<Order, OrderStoreError> {
        let mut inner = self.inner.lock().await;
        Self::consume_failure(&mut inner)?;
        if items.is_empty() {
            return Err(OrderStoreError::EmptyItems);
        }

        inner.next_id += 1;
        let now = Utc::now();
        let order = Order {
            id: OrderId::new(inner.next_id),
            customer: customer.to_string(),
            items,
            total,
            status: OrderStatus::Init,
            fulfilled_by: None,
            created_at: now,
            updated_at: now,
        };
        inner.orders.insert(order.id, order.clone());
        Ok(order)
    }

    /// Fetch an order.
    ///
    /// # Errors
    ///
    /// Returns [`OrderStoreError::NotFound`] or an injected failure.
    pub async fn get_order(&self, id: OrderId) -> Result<Order, OrderStoreError> {
        let mut inner = self.inner.lock().await;
        Self::consume_failure(&mut inner)?;
        inner
            .orders
            .get(&id)
            .cloned()
            .ok_or(OrderStoreError::NotFound(id))
    }

    /// Atomically transition an order: read, validate, compare-and-write
    /// under the store lock.
    ///
    /// # Errors
    ///
    /// Returns [`OrderStoreError::NotFound`], a wrapped transition error, or
    /// an injected failure.
    pub async fn apply(&self, id: OrderId, target: OrderStatus) -> Result<Order, OrderStoreError> {
        let mut inner = self.inner.lock().await;
        Self::consume_failure(&mut inner)?;
        let order = inner
            .orders
            .get_mut(&id)
            .ok_or(OrderStoreError::NotFound(id))?;

        machine::validate(order.status, target)?;
        order.status = target;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    /// Record the fulfilling worker; valid only while `Brewing`.
    ///
    /// # Errors
    ///
    /// Returns [`OrderStoreError::NotFound`], an invalid-transition error if
    /// the order is not `Brewing`, or an injected failure.
    pub async fn assign(&self, id: OrderId, worker: WorkerId) -> Result<Order, OrderStoreError> {
        let mut inner = self.inner.lock().await;
        Self::consume_failure(&mut inner)?;
        let order = inner
            .orders
            .get_mut(&id)
            .ok_or(OrderStoreError::NotFound(id))?;

        if order.status.rank() != OrderStatus::Brewing.rank() {
            return Err(brewline_core::TransitionError::InvalidTransition {
                from: order.status,
                to: OrderStatus::Brewing,
            }
            .into());
        }
        order.fulfilled_by = Some(worker);
        order.updated_at = Utc::now();
        Ok(order.clone())
    }
}

impl OrderStore for InMemoryOrderStore {
    fn create(&self, customer: &str, items: Vec<String>, total: Money) -> StoreFuture<'_, Order> {
        let customer = customer.to_string();
        Box::pin(async move { self.create_order(&customer, items, total).await })
    }

    fn get(&self, id: OrderId) -> StoreFuture<'_, Order> {
        Box::pin(self.get_order(id))
    }

    fn apply_transition(&self, id: OrderId, target: OrderStatus) -> StoreFuture<'_, Order> {
        Box::pin(self.apply(id, target))
    }

    fn assign_fulfiller(&self, id: OrderId, worker: WorkerId) -> StoreFuture<'_, Order> {
        Box::pin(self.assign(id, worker))
    }
}

type BusItem = Result<WorkEvent, EventBusError>;

#[derive(Default)]
struct BusInner {
    subscribers: HashMap<String, Vec<UnboundedSender<BusItem>>>,
}

/// In-memory event bus: per-topic fan-out over unbounded channels.
///
/// Publishing goes through the wire encoding, so subscribers observe exactly
/// what a real transport would hand them, including undecodable payloads
/// injected with [`InMemoryEventBus::publish_raw`]. Delivery order per
/// subscriber follows publish order, which is stronger than the per-key
/// ordering the contract promises.
#[derive(Default)]
pub struct InMemoryEventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl InMemoryEventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a raw payload to every subscriber of `topic`.
    ///
    /// An undecodable payload is delivered as the consumer-side
    /// deserialization error, exercising the poison-message path.
    pub async fn publish_raw(&self, topic: &str, payload: Vec<u8>) {
        let item = WorkEvent::decode(&payload);
        let mut inner = self.inner.lock().await;
        if let Some(senders) = inner.subscribers.get_mut(topic) {
            senders.retain(|tx| tx.send(item.clone()).is_ok());
        }
    }

    /// Drop all subscriptions so their streams end.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        inner.subscribers.clear();
    }
}

impl EventBus for InMemoryEventBus {
    fn publish(
        &self,
        topic: &str,
        event: &WorkEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let topic = topic.to_string();
        let event = event.clone();
        Box::pin(async move {
            let payload = event.encode()?;
            tracing::debug!(topic = %topic, key = %event.key(), "Publishing event");
            self.publish_raw(&topic, payload).await;
            Ok(())
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
        let topics: Vec<String> = topics.iter().map(|t| (*t).to_string()).collect();
        Box::pin(async move {
            let (tx, mut rx) = mpsc::unbounded_channel();
            {
                let mut inner = self.inner.lock().await;
                for topic in &topics {
                    inner
                        .subscribers
                        .entry(topic.clone())
                        .or_default()
                        .push(tx.clone());
                }
            }
            drop(tx);

            let stream = async_stream::stream! {
                while let Some(item) = rx.recv().await {
                    yield item;
                }
            };
            Ok(Box::pin(stream) as EventStream)
        })
    }
}
