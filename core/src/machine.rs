//! Order state machine.
//!
//! The lifecycle is linear: Init → Paid → Brewing → Brewed → Taken.
//! Every transition must advance exactly one step; validation is pure and
//! enforced by the order store before any write.

use crate::order::OrderStatus;
use thiserror::Error;

/// A rejected state transition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The requested transition is not an edge of the lifecycle
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status
        from: OrderStatus,
        /// Requested status
        to: OrderStatus,
    },
    /// The order is already in the requested state; a concurrent writer won
    #[error("Conflict: order already {current}")]
    Conflict {
        /// The status the order already holds
        current: OrderStatus,
    },
}

/// The status an order must hold for `target` to be a valid next step.
#[must_use]
pub const fn predecessor(target: OrderStatus) -> Option<OrderStatus> {
    match target {
        OrderStatus::Init => None,
        OrderStatus::Paid => Some(OrderStatus::Init),
        OrderStatus::Brewing => Some(OrderStatus::Paid),
        OrderStatus::Brewed => Some(OrderStatus::Brewing),
        OrderStatus::Taken => Some(OrderStatus::Brewed),
    }
}

/// Validates a transition from `current` to `target`.
///
/// A duplicate request (target equals the state the order already holds)
/// reports [`TransitionError::Conflict`] so the caller can tell a lost
/// race apart from a genuinely bogus request. Everything else off the
/// lifecycle edge is [`TransitionError::InvalidTransition`].
///
/// # Errors
///
/// Returns an error unless `target` is exactly one step ahead of `current`.
pub const fn validate(current: OrderStatus, target: OrderStatus) -> Result<(), TransitionError> {
    match predecessor(target) {
        Some(required) if required.rank() == current.rank() => Ok(()),
        _ => {
            if current.rank() == target.rank() {
                Err(TransitionError::Conflict { current })
            } else {
                Err(TransitionError::InvalidTransition {
                    from: current,
                    to: target,
                })
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALL: [OrderStatus; 5] = [
        OrderStatus::Init,
        OrderStatus::Paid,
        OrderStatus::Brewing,
        OrderStatus::Brewed,
        OrderStatus::Taken,
    ];

    #[test]
    fn every_forward_step_is_valid() {
        for pair in ALL.windows(2) {
            assert_eq!(validate(pair[0], pair[1]), Ok(()));
        }
    }

    #[test]
    fn duplicate_transition_is_a_conflict() {
        for status in ALL {
            assert_eq!(
                validate(status, status),
                Err(TransitionError::Conflict { current: status })
            );
        }
    }

    #[test]
    fn skipping_a_step_is_invalid() {
        assert_eq!(
            validate(OrderStatus::Init, OrderStatus::Brewing),
            Err(TransitionError::InvalidTransition {
                from: OrderStatus::Init,
                to: OrderStatus::Brewing,
            })
        );
        assert_eq!(
            validate(OrderStatus::Paid, OrderStatus::Taken),
            Err(TransitionError::InvalidTransition {
                from: OrderStatus::Paid,
                to: OrderStatus::Taken,
            })
        );
    }

    #[test]
    fn moving_backwards_is_invalid() {
        assert_eq!(
            validate(OrderStatus::Brewed, OrderStatus::Paid),
            Err(TransitionError::InvalidTransition {
                from: OrderStatus::Brewed,
                to: OrderStatus::Paid,
            })
        );
    }

    #[test]
    fn terminal_state_accepts_nothing() {
        for target in ALL {
            assert!(validate(OrderStatus::Taken, target).is_err());
        }
    }

    fn arb_status() -> impl Strategy<Value = OrderStatus> {
        prop::sample::select(ALL.to_vec())
    }

    proptest! {
        #[test]
        fn valid_iff_exactly_one_step_ahead(current in arb_status(), target in arb_status()) {
            let ok = validate(current, target).is_ok();
            prop_assert_eq!(ok, target.rank() == current.rank() + 1);
        }

        #[test]
        fn conflict_iff_same_state(current in arb_status(), target in arb_status()) {
            let conflict = matches!(
                validate(current, target),
                Err(TransitionError::Conflict { .. })
            );
            prop_assert_eq!(conflict, current == target);
        }
    }
}
