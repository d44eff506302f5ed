//! Order store abstraction.
//!
//! The store is the authoritative holder of order state (an external
//! collaborator; persistence details are out of scope). It exposes creation,
//! reads, and state transitions. Transitions are atomic per record: the store
//! reads current state, validates the edge through
//! [`crate::machine::validate`], and performs a compare-and-write, so
//! concurrent duplicate requests yield exactly one winner.
//!
//! # Dyn Compatibility
//!
//! `Pin<Box<dyn Future>>` returns, so the trait can live behind
//! `Arc<dyn OrderStore>` shared by the intake path, the fulfillment listener,
//! and the reconciliation scheduler's client.

use crate::machine::TransitionError;
use crate::order::{Money, Order, OrderId, OrderStatus, WorkerId};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors from order store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderStoreError {
    /// No order with the given identifier exists. A referential integrity
    /// failure when reached from an event: logged loudly, never retried.
    #[error("Order {0} not found")]
    NotFound(OrderId),

    /// The requested transition was rejected by the state machine.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Orders must contain at least one item at creation.
    #[error("Order must contain at least one item")]
    EmptyItems,

    /// Transient remote failure (network, timeout). Left for the caller's
    /// next attempt; the scheduler retries on its next tick.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl OrderStoreError {
    /// Whether the failure is worth another attempt on a later tick.
    ///
    /// `NotFound` and `InvalidTransition` are permanent for the order in
    /// question; everything else may resolve on its own.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Transition(TransitionError::Conflict { .. }) => true,
            Self::NotFound(_)
            | Self::EmptyItems
            | Self::Transition(TransitionError::InvalidTransition { .. }) => false,
        }
    }
}

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, OrderStoreError>> + Send + 'a>>;

/// Trait for order store implementations.
pub trait OrderStore: Send + Sync {
    /// Create a new order in the `Init` state and assign its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`OrderStoreError::EmptyItems`] if `items` is empty.
    fn create(&self, customer: &str, items: Vec<String>, total: Money) -> StoreFuture<'_, Order>;

    /// Fetch an order by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`OrderStoreError::NotFound`] if no such order exists.
    fn get(&self, id: OrderId) -> StoreFuture<'_, Order>;

    /// Atomically transition an order to `target`.
    ///
    /// Reads current state, validates the edge, and compare-and-writes. Of
    /// two concurrent identical requests exactly one succeeds; the other
    /// observes [`TransitionError::Conflict`].
    ///
    /// # Errors
    ///
    /// Returns [`OrderStoreError::NotFound`] or a wrapped
    /// [`TransitionError`].
    fn apply_transition(&self, id: OrderId, target: OrderStatus) -> StoreFuture<'_, Order>;

    /// Record the worker that fulfilled an order.
    ///
    /// Valid only while the order is `Brewing`, so the identity lands under
    /// the same per-record atomicity as the transitions around it.
    ///
    /// # Errors
    ///
    /// Returns [`OrderStoreError::NotFound`], or an
    /// [`TransitionError::InvalidTransition`] if the order is not `Brewing`.
    fn assign_fulfiller(&self, id: OrderId, worker: WorkerId) -> StoreFuture<'_, Order>;
}
