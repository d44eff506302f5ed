//! Core domain types for the order lifecycle.
//!
//! An order moves through a linear lifecycle:
//! Init → Paid → Brewing → Brewed → Taken.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Unique identifier for an order.
///
/// Assigned by the order store at creation and immutable afterwards.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(u64);

impl OrderId {
    /// Creates a new `OrderId` from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the inner value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a fulfilling worker.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerId(String);

impl WorkerId {
    /// Creates a new `WorkerId`.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error constructing a [`Money`] value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// Monetary amounts must be non-negative
    #[error("Negative amount: {cents} cents")]
    Negative {
        /// The rejected amount in cents
        cents: i64,
    },
}

/// Money amount as fixed-point cents plus an ISO currency code.
///
/// Never a floating type; amounts are non-negative by construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    cents: i64,
    currency: String,
}

impl Money {
    /// Creates a new money amount.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Negative`] if `cents` is negative.
    pub fn new(cents: i64, currency: impl Into<String>) -> Result<Self, MoneyError> {
        if cents < 0 {
            return Err(MoneyError::Negative { cents });
        }
        Ok(Self {
            cents,
            currency: currency.into(),
        })
    }

    /// Zero in the given currency.
    #[must_use]
    pub fn zero(currency: impl Into<String>) -> Self {
        Self {
            cents: 0,
            currency: currency.into(),
        }
    }

    /// Returns the amount in cents.
    #[must_use]
    pub const fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the currency code.
    #[must_use]
    pub fn currency(&self) -> &str {
        &self.currency
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:02} {}",
            self.cents / 100,
            self.cents % 100,
            self.currency
        )
    }
}

/// Status of an order in its lifecycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Order created, payment pending
    Init,
    /// Payment confirmed, awaiting fulfillment
    Paid,
    /// Fulfillment in progress
    Brewing,
    /// Fulfillment complete, awaiting pickup
    Brewed,
    /// Picked up (terminal)
    Taken,
}

impl OrderStatus {
    /// Position of this status in the linear lifecycle.
    #[must_use]
    pub const fn rank(&self) -> u8 {
        match self {
            Self::Init => 0,
            Self::Paid => 1,
            Self::Brewing => 2,
            Self::Brewed => 3,
            Self::Taken => 4,
        }
    }

    /// Whether this status ends the lifecycle.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Taken)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "Init"),
            Self::Paid => write!(f, "Paid"),
            Self::Brewing => write!(f, "Brewing"),
            Self::Brewed => write!(f, "Brewed"),
            Self::Taken => write!(f, "Taken"),
        }
    }
}

/// An order record.
///
/// The order store is the single writer of authoritative state; everything
/// else observes and requests transitions through [`crate::store::OrderStore`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Order identifier, immutable after creation
    pub id: OrderId,
    /// Customer who placed the order
    pub customer: String,
    /// Ordered items, non-empty at creation
    pub items: Vec<String>,
    /// Total order value
    pub total: Money,
    /// Current lifecycle status
    pub status: OrderStatus,
    /// Worker that fulfilled the order, once known
    pub fulfilled_by: Option<WorkerId>,
    /// When the order was created
    pub created_at: DateTime<Utc>,
    /// When the order was last updated
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Whether the order is waiting to be picked up.
    #[must_use]
    pub const fn awaiting_pickup(&self) -> bool {
        matches!(self.status, OrderStatus::Brewed)
    }
}
