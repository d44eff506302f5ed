//! The tracking set and the reconciliation scheduler.
//!
//! The tracking set is the scheduler's working set: a concurrency-safe map
//! from order identifier to the snapshot taken when the order entered the
//! awaiting state. It is mutated from two independent contexts — the intake
//! path inserting, the scheduler's tick removing — and a single `RwLock`
//! around the map gives those interleavings linearizable insert/remove/
//! iterate semantics.
//!
//! The scheduler owns an explicit timer (no framework-dispatched callbacks):
//! a fixed-interval tick fires a reconciliation pass that polls every tracked
//! order's remote state through the resilience gate and issues the pickup
//! transition once the fulfilled state is observed. Passes never overlap: the
//! loop awaits each pass before the next tick, and missed ticks are skipped.

use crate::client::OrderClient;
use crate::gate::GateError;
use brewline_core::{Order, OrderId, OrderStatus, OrderStoreError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Concurrent registry of orders awaiting the terminal transition.
///
/// Clone-cheap: clones share the same map.
#[derive(Clone, Default)]
pub struct TrackingSet {
    inner: Arc<RwLock<HashMap<OrderId, Order>>>,
}

impl TrackingSet {
    /// Create an empty tracking set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an order, keyed by its identifier.
    ///
    /// Called by the intake path when the order enters the awaiting state.
    pub async fn track(&self, order: Order) {
        let mut map = self.inner.write().await;
        map.insert(order.id, order);
    }

    /// Remove an order; returns its snapshot if it was tracked.
    pub async fn remove(&self, id: OrderId) -> Option<Order> {
        let mut map = self.inner.write().await;
        map.remove(&id)
    }

    /// Whether the order is currently tracked.
    pub async fn contains(&self, id: OrderId) -> bool {
        let map = self.inner.read().await;
        map.contains_key(&id)
    }

    /// Number of tracked orders.
    pub async fn len(&self) -> usize {
        let map = self.inner.read().await;
        map.len()
    }

    /// Whether anything is tracked.
    pub async fn is_empty(&self) -> bool {
        let map = self.inner.read().await;
        map.is_empty()
    }

    /// A point-in-time copy of the tracked snapshots.
    pub async fn snapshot(&self) -> Vec<Order> {
        let map = self.inner.read().await;
        map.values().cloned().collect()
    }
}

/// What one reconciliation pass decided for one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Pickup transition applied; order untracked
    PickedUp,
    /// Order already terminal remotely; untracked
    AlreadyTerminal,
    /// Not yet fulfilled; still tracked
    NotReady,
    /// Transient failure (rejection or transport); still tracked
    Deferred,
    /// The order can never reach a valid terminal state; untracked
    Abandoned,
}

/// Periodically reconciles tracked orders against remote state.
pub struct ReconciliationScheduler {
    tracking: TrackingSet,
    client: OrderClient,
    period: Duration,
}

/// Handle to a spawned scheduler. Dropping the handle stops the timer;
/// [`SchedulerHandle::shutdown`] additionally waits for the in-flight pass.
pub struct SchedulerHandle {
    stop: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the timer and wait for the in-flight pass to finish.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        if let Err(err) = self.join.await {
            tracing::error!(error = %err, "Reconciliation scheduler task panicked");
        }
    }
}

impl ReconciliationScheduler {
    /// Create a scheduler over a tracking set and a gate-wrapped client.
    #[must_use]
    pub const fn new(tracking: TrackingSet, client: OrderClient, period: Duration) -> Self {
        Self {
            tracking,
            client,
            period,
        }
    }

    /// The tracking set this scheduler drains.
    #[must_use]
    pub const fn tracking(&self) -> &TrackingSet {
        &self.tracking
    }

    /// Spawn the timer loop.
    ///
    /// Missed ticks are skipped, and the loop awaits each pass before the
    /// next tick, so two passes never run concurrently.
    #[must_use]
    pub fn spawn(self) -> SchedulerHandle {
        let (stop, mut stopped) = watch::channel(false);
        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first interval tick fires immediately; consume it so the
            // first pass happens one period after spawn.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_pass().await;
                    }
                    changed = stopped.changed() => {
                        // A dropped sender also stops the loop.
                        if changed.is_err() || *stopped.borrow() {
                            tracing::info!("Reconciliation scheduler stopping");
                            break;
                        }
                    }
                }
            }
        });
        SchedulerHandle { stop, join }
    }

    /// Run one reconciliation pass over the tracked orders.
    ///
    /// Per-order remote calls fan out concurrently; the gate's bulkhead caps
    /// how many are in flight at once.
    pub async fn run_pass(&self) {
        if self.tracking.is_empty().await {
            return;
        }

        let tracked = self.tracking.snapshot().await;
        tracing::debug!(tracked = tracked.len(), "Reconciliation pass starting");

        let checks = tracked.iter().map(|order| self.reconcile_one(order.id));
        let outcomes = futures::future::join_all(checks).await;

        let picked_up = outcomes
            .iter()
            .filter(|o| **o == ReconcileOutcome::PickedUp)
            .count();
        if picked_up > 0 {
            tracing::info!(picked_up, "Reconciliation pass completed pickups");
        }
    }

    /// Reconcile a single tracked order against its remote state.
    pub async fn reconcile_one(&self, id: OrderId) -> ReconcileOutcome {
        let order = match self.client.get_order(id).await {
            Ok(order) => order,
            Err(err) => return self.on_fetch_error(id, &err).await,
        };

        match order.status {
            OrderStatus::Brewed => self.pick_up(id).await,
            OrderStatus::Taken => {
                // Someone else completed the pickup; stop polling.
                tracing::debug!(order_id = %id, "Order already terminal; untracking");
                self.tracking.remove(id).await;
                ReconcileOutcome::AlreadyTerminal
            }
            status => {
                tracing::debug!(order_id = %id, %status, "Order not ready yet");
                ReconcileOutcome::NotReady
            }
        }
    }

    /// Issue `Brewed → Taken`; untrack only after the attempt.
    async fn pick_up(&self, id: OrderId) -> ReconcileOutcome {
        match self.client.update_state(id, OrderStatus::Taken).await {
            Ok(_) => {
                tracing::info!(order_id = %id, "Order picked up");
                self.tracking.remove(id).await;
                ReconcileOutcome::PickedUp
            }
            Err(err) => self.on_transition_error(id, &err).await,
        }
    }

    async fn on_fetch_error(
        &self,
        id: OrderId,
        err: &GateError<OrderStoreError>,
    ) -> ReconcileOutcome {
        match err {
            GateError::BulkheadRejected | GateError::CircuitOpen => {
                // Back off to the next tick; the poll interval paces retries.
                tracing::warn!(order_id = %id, error = %err, "Fetch rejected; deferring");
                ReconcileOutcome::Deferred
            }
            GateError::Inner(inner) if inner.is_transient() => {
                tracing::warn!(order_id = %id, error = %inner, "Fetch failed; deferring");
                ReconcileOutcome::Deferred
            }
            GateError::Inner(inner) => {
                // NotFound or a machine rule violation: this order will never
                // reach a valid terminal state, stop polling it.
                tracing::error!(order_id = %id, error = %inner, "Untracking unreconcilable order");
                self.tracking.remove(id).await;
                ReconcileOutcome::Abandoned
            }
        }
    }

    async fn on_transition_error(
        &self,
        id: OrderId,
        err: &GateError<OrderStoreError>,
    ) -> ReconcileOutcome {
        match err {
            GateError::BulkheadRejected | GateError::CircuitOpen => {
                tracing::warn!(order_id = %id, error = %err, "Pickup rejected; deferring");
                ReconcileOutcome::Deferred
            }
            GateError::Inner(inner) if inner.is_transient() => {
                // Includes Conflict: re-read on the next tick and decide then.
                tracing::warn!(order_id = %id, error = %inner, "Pickup failed; deferring");
                ReconcileOutcome::Deferred
            }
            GateError::Inner(inner) => {
                tracing::error!(order_id = %id, error = %inner, "Untracking unreconcilable order");
                self.tracking.remove(id).await;
                ReconcileOutcome::Abandoned
            }
        }
    }
}
