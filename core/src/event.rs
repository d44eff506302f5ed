//! The work-event contract between the producing and fulfilling sides.
//!
//! A work event is a signal, not a cache: it carries the order identifier and
//! an event kind, nothing else. Consumers must re-fetch current state from the
//! order store on receipt, so the event payload can never go stale against
//! authoritative state.

use crate::event_bus::EventBusError;
use crate::order::OrderId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Topic carrying [`WorkEventKind::NewWork`] events (producer → fulfillment).
pub const NEW_WORK_TOPIC: &str = "new-work";

/// Topic carrying [`WorkEventKind::WorkCompleted`] events (fulfillment → observers).
pub const WORK_COMPLETED_TOPIC: &str = "work-completed";

/// Kind of work event.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkEventKind {
    /// An order is paid and ready for fulfillment
    NewWork,
    /// Fulfillment of an order is complete
    WorkCompleted,
}

impl WorkEventKind {
    /// The topic this kind is published on.
    #[must_use]
    pub const fn topic(&self) -> &'static str {
        match self {
            Self::NewWork => NEW_WORK_TOPIC,
            Self::WorkCompleted => WORK_COMPLETED_TOPIC,
        }
    }
}

impl fmt::Display for WorkEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NewWork => write!(f, "NewWork"),
            Self::WorkCompleted => write!(f, "WorkCompleted"),
        }
    }
}

/// A lifecycle signal for a single order.
///
/// Delivery is at-least-once and ordered only per order identifier (the
/// identifier is the routing key), so consumers must treat redelivery as a
/// no-op.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkEvent {
    /// The order this event is about
    pub order_id: OrderId,
    /// What happened
    pub kind: WorkEventKind,
}

impl WorkEvent {
    /// Creates a new work event.
    #[must_use]
    pub const fn new(order_id: OrderId, kind: WorkEventKind) -> Self {
        Self { order_id, kind }
    }

    /// The partition/routing key for this event.
    ///
    /// Events sharing a key are delivered in order relative to each other.
    #[must_use]
    pub fn key(&self) -> String {
        self.order_id.to_string()
    }

    /// Encodes the event into its wire form.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::SerializationFailed`] if encoding fails.
    pub fn encode(&self) -> Result<Vec<u8>, EventBusError> {
        bincode::serialize(self).map_err(|e| EventBusError::SerializationFailed(e.to_string()))
    }

    /// Decodes an event from its wire form.
    ///
    /// A failure here is a poison message: the consumer logs it and drops the
    /// event without retry.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::DeserializationFailed`] if the payload is
    /// malformed.
    pub fn decode(bytes: &[u8]) -> Result<Self, EventBusError> {
        bincode::deserialize(bytes).map_err(|e| EventBusError::DeserializationFailed(e.to_string()))
    }
}
