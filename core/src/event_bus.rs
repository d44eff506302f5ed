//! Event bus abstraction for cross-service lifecycle signals.
//!
//! This module provides the [`EventBus`] trait for publishing and subscribing
//! to [`WorkEvent`]s across the producer/fulfillment boundary. The bus is an
//! external collaborator; this design only depends on its contract:
//!
//! - **At-least-once delivery**: an event may be delivered more than once, so
//!   subscribers must be idempotent.
//! - **Ordered per key**: events sharing an order identifier maintain their
//!   relative order; no ordering is promised across orders.
//! - **Handler isolation**: a failed handler invocation is logged by the
//!   consumer and the event is not redelivered by this design.
//!
//! # Dyn Compatibility
//!
//! The trait uses explicit `Pin<Box<dyn Future>>` returns instead of
//! `async fn` to enable trait object usage (`Arc<dyn EventBus>`), which is how
//! the fulfillment listener and the intake path hold the bus.

use crate::event::WorkEvent;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during event bus operations.
#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    /// Failed to connect to the event bus
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to publish an event to a topic
    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// Failed to subscribe to topics
    #[error("Subscription failed for topics {topics:?}: {reason}")]
    SubscriptionFailed {
        /// The topics that failed to subscribe
        topics: Vec<String>,
        /// The reason for failure
        reason: String,
    },

    /// Failed to encode an event for the wire
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// Failed to decode an event from the wire (poison message)
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    /// Topic not found or invalid
    #[error("Invalid topic: {0}")]
    InvalidTopic(String),
}

/// Stream of events from subscriptions.
///
/// Each item is a `Result`: a decoded [`WorkEvent`], or an error such as a
/// poison payload the consumer should log and drop.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<WorkEvent, EventBusError>> + Send>>;

/// Trait for event bus implementations.
///
/// All implementations must be `Send + Sync`; the bus is shared behind an
/// `Arc` between the intake path and the fulfillment listener.
pub trait EventBus: Send + Sync {
    /// Publish an event to a topic.
    ///
    /// The event's order identifier is the routing key: events for the same
    /// order stay ordered, and the event may be delivered to subscribers more
    /// than once.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::PublishFailed`] if the publish operation
    /// fails.
    fn publish(
        &self,
        topic: &str,
        event: &WorkEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>>;

    /// Subscribe to one or more topics and receive a stream of events.
    ///
    /// The returned [`EventStream`] yields events from all subscribed topics
    /// with at-least-once semantics.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::SubscriptionFailed`] if subscription fails.
    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>>;
}
