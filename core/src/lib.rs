//! # Brewline Core
//!
//! Core domain types and traits for the Brewline order lifecycle coordinator.
//!
//! This crate holds the pure heart of the system and the contracts its I/O
//! collaborators implement:
//!
//! - **Order model**: [`order::Order`] and its linear lifecycle
//!   `Init → Paid → Brewing → Brewed → Taken`
//! - **State machine**: [`machine::validate`] — pure edge validation, no I/O
//! - **Work events**: [`event::WorkEvent`] — identifier-only signals on the
//!   `new-work` and `work-completed` topics
//! - **Traits**: [`event_bus::EventBus`] and [`store::OrderStore`], the
//!   boundaries to the message bus and the authoritative order store
//!
//! ## Architecture Principles
//!
//! - The store is the single writer of authoritative state; everyone else
//!   requests transitions through [`store::OrderStore::apply_transition`]
//! - Events carry an identifier and a kind, never order data: consumers
//!   re-fetch on receipt
//! - Delivery is at-least-once and ordered only per order identifier, so
//!   every consumer is idempotent

pub mod event;
pub mod event_bus;
pub mod machine;
pub mod order;
pub mod store;

pub use event::{NEW_WORK_TOPIC, WORK_COMPLETED_TOPIC, WorkEvent, WorkEventKind};
pub use event_bus::{EventBus, EventBusError, EventStream};
pub use machine::TransitionError;
pub use order::{Money, MoneyError, Order, OrderId, OrderStatus, WorkerId};
pub use store::{OrderStore, OrderStoreError, StoreFuture};
