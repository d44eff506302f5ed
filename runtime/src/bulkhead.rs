//! Bulkhead pattern: a ceiling on concurrent in-flight calls.
//!
//! Each call-group gets a fixed number of slots. A call that cannot get a
//! slot waits up to `max_wait`; if no slot frees within that bound it fails
//! with [`BulkheadError::Rejected`] rather than queuing indefinitely. The
//! ceiling is never exceeded.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Bulkhead configuration.
#[derive(Debug, Clone)]
pub struct BulkheadConfig {
    /// Maximum number of concurrent in-flight calls
    pub max_concurrent: usize,
    /// How long a call may wait for a slot before being rejected
    pub max_wait: Duration,
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            max_wait: Duration::from_millis(500),
        }
    }
}

impl BulkheadConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub const fn builder() -> BulkheadConfigBuilder {
        BulkheadConfigBuilder {
            max_concurrent: None,
            max_wait: None,
        }
    }
}

/// Builder for [`BulkheadConfig`].
#[derive(Debug, Clone)]
pub struct BulkheadConfigBuilder {
    max_concurrent: Option<usize>,
    max_wait: Option<Duration>,
}

impl BulkheadConfigBuilder {
    /// Set the concurrency ceiling.
    #[must_use]
    pub const fn max_concurrent(mut self, ceiling: usize) -> Self {
        self.max_concurrent = Some(ceiling);
        self
    }

    /// Set the bounded wait for a slot.
    #[must_use]
    pub const fn max_wait(mut self, duration: Duration) -> Self {
        self.max_wait = Some(duration);
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> BulkheadConfig {
        let defaults = BulkheadConfig::default();
        BulkheadConfig {
            max_concurrent: self.max_concurrent.unwrap_or(defaults.max_concurrent),
            max_wait: self.max_wait.unwrap_or(defaults.max_wait),
        }
    }
}

/// Errors from bulkhead operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BulkheadError {
    /// No slot freed within the bounded wait
    #[error("Bulkhead rejected call: no slot within {max_wait:?}")]
    Rejected {
        /// The wait bound that elapsed
        max_wait: Duration,
    },
}

/// A held bulkhead slot; the slot frees when this is dropped.
#[derive(Debug)]
pub struct BulkheadSlot<'a> {
    _permit: SemaphorePermit<'a>,
}

/// Concurrency bulkhead over a [`Semaphore`].
///
/// Clone-cheap: clones share the same slots and counters.
#[derive(Debug, Clone)]
pub struct Bulkhead {
    config: Arc<BulkheadConfig>,
    slots: Arc<Semaphore>,
    // Metrics
    total_acquired: Arc<AtomicU64>,
    total_rejections: Arc<AtomicU64>,
}

impl Bulkhead {
    /// Create a new bulkhead with the given configuration.
    #[must_use]
    pub fn new(config: BulkheadConfig) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_concurrent));
        Self {
            config: Arc::new(config),
            slots,
            total_acquired: Arc::new(AtomicU64::new(0)),
            total_rejections: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Acquire a slot, waiting at most the configured `max_wait`.
    ///
    /// # Errors
    ///
    /// Returns [`BulkheadError::Rejected`] if no slot frees within the bound.
    pub async fn acquire(&self) -> Result<BulkheadSlot<'_>, BulkheadError> {
        match tokio::time::timeout(self.config.max_wait, self.slots.acquire()).await {
            Ok(Ok(permit)) => {
                self.total_acquired.fetch_add(1, Ordering::Relaxed);
                Ok(BulkheadSlot { _permit: permit })
            }
            // The semaphore is never closed while the bulkhead is alive.
            Ok(Err(_)) | Err(_) => {
                self.total_rejections.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    max_concurrent = self.config.max_concurrent,
                    max_wait_ms = self.config.max_wait.as_millis() as u64,
                    "Bulkhead rejecting call: ceiling reached"
                );
                Err(BulkheadError::Rejected {
                    max_wait: self.config.max_wait,
                })
            }
        }
    }

    /// Number of slots currently free.
    #[must_use]
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    /// Get bulkhead metrics.
    #[must_use]
    pub fn metrics(&self) -> BulkheadMetrics {
        BulkheadMetrics {
            total_acquired: self.total_acquired.load(Ordering::Relaxed),
            total_rejections: self.total_rejections.load(Ordering::Relaxed),
        }
    }
}

/// Metrics for bulkhead monitoring.
#[derive(Debug, Clone, Copy)]
pub struct BulkheadMetrics {
    /// Slots successfully acquired
    pub total_acquired: u64,
    /// Calls rejected at the ceiling
    pub total_rejections: u64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquires_up_to_ceiling() {
        let bulkhead = Bulkhead::new(BulkheadConfig::builder().max_concurrent(2).build());

        let a = bulkhead.acquire().await.unwrap();
        let _b = bulkhead.acquire().await.unwrap();
        assert_eq!(bulkhead.available(), 0);

        drop(a);
        assert_eq!(bulkhead.available(), 1);
    }

    #[tokio::test]
    async fn second_call_past_ceiling_is_rejected_after_max_wait() {
        let bulkhead = Bulkhead::new(
            BulkheadConfig::builder()
                .max_concurrent(1)
                .max_wait(Duration::from_millis(50))
                .build(),
        );

        let _held = bulkhead.acquire().await.unwrap();
        let result = bulkhead.acquire().await;

        assert_eq!(
            result.err(),
            Some(BulkheadError::Rejected {
                max_wait: Duration::from_millis(50),
            })
        );
        assert_eq!(bulkhead.metrics().total_rejections, 1);
    }

    #[tokio::test]
    async fn waiter_gets_slot_when_one_frees_in_time() {
        let bulkhead = Bulkhead::new(
            BulkheadConfig::builder()
                .max_concurrent(1)
                .max_wait(Duration::from_millis(500))
                .build(),
        );

        let held = bulkhead.acquire().await.unwrap();

        let bulkhead_clone = bulkhead.clone();
        let waiter = tokio::spawn(async move {
            let slot = bulkhead_clone.acquire().await;
            slot.is_ok()
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(held);

        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn ceiling_is_never_exceeded() {
        let bulkhead = Bulkhead::new(
            BulkheadConfig::builder()
                .max_concurrent(3)
                .max_wait(Duration::from_millis(200))
                .build(),
        );

        let in_flight = Arc::new(AtomicU64::new(0));
        let peak = Arc::new(AtomicU64::new(0));

        let mut handles = vec![];
        for _ in 0..20 {
            let bulkhead = bulkhead.clone();
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                if let Ok(_slot) = bulkhead.acquire().await {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
    }
}
