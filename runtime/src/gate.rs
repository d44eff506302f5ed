//! The resilience gate: bulkhead and circuit breaker composed around a call.
//!
//! Every remote call the reconciliation scheduler makes goes through one
//! gate per logical call-group. The composition order is fixed:
//!
//! 1. acquire a bulkhead slot (bounded wait); a rejection here does **not**
//!    count as a breaker failure — resource contention is not a downstream
//!    fault;
//! 2. run the operation through the circuit breaker; executed outcomes feed
//!    the breaker's sliding window.
//!
//! The acquire/release and window-update steps are explicit here rather than
//! hidden behind declarative wrappers, so they stay visible and testable.

use crate::bulkhead::{Bulkhead, BulkheadConfig, BulkheadError};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};
use thiserror::Error;

/// Errors from a gated call.
#[derive(Error, Debug)]
pub enum GateError<E> {
    /// No bulkhead slot freed within the bounded wait
    #[error("Bulkhead rejected the call")]
    BulkheadRejected,
    /// The circuit is open; the dependency was not reached
    #[error("Circuit breaker is open")]
    CircuitOpen,
    /// The operation itself failed
    #[error(transparent)]
    Inner(E),
}

impl<E> GateError<E> {
    /// Whether the caller should treat this as transient and back off to the
    /// next tick rather than retrying immediately.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::BulkheadRejected | Self::CircuitOpen)
    }
}

/// A named call-group's resilience policies, composed.
#[derive(Debug, Clone)]
pub struct ResilienceGate {
    group: &'static str,
    breaker: CircuitBreaker,
    bulkhead: Bulkhead,
}

impl ResilienceGate {
    /// Create a gate for a call-group from its two policy configs.
    #[must_use]
    pub fn new(
        group: &'static str,
        breaker_config: CircuitBreakerConfig,
        bulkhead_config: BulkheadConfig,
    ) -> Self {
        Self {
            group,
            breaker: CircuitBreaker::new(breaker_config),
            bulkhead: Bulkhead::new(bulkhead_config),
        }
    }

    /// The call-group this gate protects.
    #[must_use]
    pub const fn group(&self) -> &'static str {
        self.group
    }

    /// Run an operation through bulkhead then breaker.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::BulkheadRejected`] if no slot frees in time (not
    /// recorded in the breaker window), [`GateError::CircuitOpen`] if the
    /// breaker rejects, or [`GateError::Inner`] if the operation fails.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, GateError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let _slot = match self.bulkhead.acquire().await {
            Ok(slot) => slot,
            Err(BulkheadError::Rejected { .. }) => {
                tracing::warn!(group = self.group, "Gated call rejected by bulkhead");
                return Err(GateError::BulkheadRejected);
            }
        };

        match self.breaker.call(operation).await {
            Ok(value) => Ok(value),
            Err(CircuitBreakerError::Open) => {
                tracing::warn!(group = self.group, "Gated call rejected by open circuit");
                Err(GateError::CircuitOpen)
            }
            Err(CircuitBreakerError::Inner(err)) => Err(GateError::Inner(err)),
        }
    }

    /// The breaker shared by this call-group.
    #[must_use]
    pub const fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// The bulkhead shared by this call-group.
    #[must_use]
    pub const fn bulkhead(&self) -> &Bulkhead {
        &self.bulkhead
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use crate::circuit_breaker::State;
    use std::time::Duration;

    fn gate(ceiling: usize) -> ResilienceGate {
        ResilienceGate::new(
            "order",
            CircuitBreakerConfig::builder()
                .window_size(5)
                .failure_threshold(0.5)
                .min_calls(3)
                .cool_down(Duration::from_millis(100))
                .build(),
            BulkheadConfig::builder()
                .max_concurrent(ceiling)
                .max_wait(Duration::from_millis(50))
                .build(),
        )
    }

    #[tokio::test]
    async fn success_passes_through() {
        let gate = gate(2);
        let result: Result<i32, GateError<String>> = gate.call(|| async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn bulkhead_rejection_does_not_feed_the_breaker() {
        let gate = gate(1);

        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel();

        let gate_clone = gate.clone();
        let holder = tokio::spawn(async move {
            gate_clone
                .call(|| async move {
                    let _ = started_tx.send(());
                    let _ = release_rx.await;
                    Ok::<_, String>(())
                })
                .await
        });

        started_rx.await.unwrap();

        // Exhaust the single slot repeatedly; the breaker window must not
        // accumulate failures from these rejections.
        for _ in 0..5 {
            let rejected: Result<(), GateError<String>> = gate.call(|| async { Ok(()) }).await;
            assert!(matches!(rejected, Err(GateError::BulkheadRejected)));
        }

        let _ = release_tx.send(());
        assert!(holder.await.unwrap().is_ok());

        assert_eq!(gate.breaker().state().await, State::Closed);
        assert_eq!(gate.breaker().metrics().total_failures, 0);
    }

    #[tokio::test]
    async fn open_circuit_surfaces_as_circuit_open() {
        let gate = gate(2);

        for _ in 0..3 {
            let _: Result<(), GateError<&str>> = gate.call(|| async { Err("boom") }).await;
        }
        assert_eq!(gate.breaker().state().await, State::Open);

        let result: Result<(), GateError<&str>> = gate.call(|| async { Ok(()) }).await;
        assert!(matches!(result, Err(GateError::CircuitOpen)));
        assert!(result.unwrap_err().is_rejection());
    }

    #[tokio::test]
    async fn inner_failures_are_recorded() {
        let gate = gate(2);

        let result: Result<(), GateError<&str>> = gate.call(|| async { Err("boom") }).await;
        assert!(matches!(result, Err(GateError::Inner("boom"))));
        assert_eq!(gate.breaker().metrics().total_failures, 1);
    }
}
