//! Circuit breaker pattern for preventing cascading failures.
//!
//! The breaker keeps a sliding window of the last N call outcomes. Once at
//! least `min_calls` outcomes are recorded and the failure ratio within the
//! window reaches `failure_threshold`, the circuit opens: calls fail
//! immediately for a cool-down period. After the cool-down, exactly one trial
//! call is allowed (half-open); its success closes the circuit with a fresh
//! window, its failure reopens it and restarts the cool-down.
//!
//! # States
//!
//! - **Closed**: Normal operation. Requests pass through. Outcomes are
//!   recorded in the window.
//! - **Open**: Failure ratio exceeded. Requests fail immediately until the
//!   cool-down elapses.
//! - **HalfOpen**: One trial request probes recovery; concurrent requests are
//!   rejected while the trial is in flight.
//!
//! # Example
//!
//! ```rust
//! use brewline_runtime::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CircuitBreakerConfig::builder()
//!     .window_size(5)
//!     .failure_threshold(0.5)
//!     .min_calls(3)
//!     .cool_down(Duration::from_secs(30))
//!     .build();
//!
//! let breaker = CircuitBreaker::new(config);
//!
//! match breaker.call(|| async {
//!     // Your fallible operation
//!     Ok::<_, String>(42)
//! }).await {
//!     Ok(result) => println!("Success: {result}"),
//!     Err(e) => println!("Failed: {e}"),
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of call outcomes kept in the sliding window
    pub window_size: usize,
    /// Failure ratio (0.0..=1.0) within the window that opens the circuit
    pub failure_threshold: f64,
    /// Minimum recorded outcomes before the ratio is evaluated
    pub min_calls: usize,
    /// Duration to stay open before allowing a half-open trial
    pub cool_down: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            failure_threshold: 0.5,
            min_calls: 5,
            cool_down: Duration::from_secs(30),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub const fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder {
            window_size: None,
            failure_threshold: None,
            min_calls: None,
            cool_down: None,
        }
    }
}

/// Builder for [`CircuitBreakerConfig`].
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfigBuilder {
    window_size: Option<usize>,
    failure_threshold: Option<f64>,
    min_calls: Option<usize>,
    cool_down: Option<Duration>,
}

impl CircuitBreakerConfigBuilder {
    /// Set the sliding window size (last N outcomes).
    #[must_use]
    pub const fn window_size(mut self, size: usize) -> Self {
        self.window_size = Some(size);
        self
    }

    /// Set the failure ratio that opens the circuit.
    #[must_use]
    pub const fn failure_threshold(mut self, ratio: f64) -> Self {
        self.failure_threshold = Some(ratio);
        self
    }

    /// Set the minimum number of recorded outcomes before evaluating.
    #[must_use]
    pub const fn min_calls(mut self, min: usize) -> Self {
        self.min_calls = Some(min);
        self
    }

    /// Set the cool-down before a half-open trial is allowed.
    #[must_use]
    pub const fn cool_down(mut self, duration: Duration) -> Self {
        self.cool_down = Some(duration);
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> CircuitBreakerConfig {
        let defaults = CircuitBreakerConfig::default();
        CircuitBreakerConfig {
            window_size: self.window_size.unwrap_or(defaults.window_size),
            failure_threshold: self.failure_threshold.unwrap_or(defaults.failure_threshold),
            min_calls: self.min_calls.unwrap_or(defaults.min_calls),
            cool_down: self.cool_down.unwrap_or(defaults.cool_down),
        }
    }
}

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Circuit is closed, requests pass through normally
    Closed,
    /// Circuit is open, requests fail immediately
    Open,
    /// Circuit is half-open, one trial request probes recovery
    HalfOpen,
}

/// Errors from circuit breaker operations.
#[derive(Error, Debug)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open, request rejected without reaching the dependency
    #[error("Circuit breaker is open")]
    Open,
    /// Operation failed
    #[error("Operation failed: {0}")]
    Inner(E),
}

/// Internal state of the circuit breaker.
#[derive(Debug)]
struct CircuitBreakerState {
    state: State,
    /// Sliding window of outcomes; `true` marks a failure.
    window: VecDeque<bool>,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

impl CircuitBreakerState {
    fn failure_ratio(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            let failures = self.window.iter().filter(|f| **f).count();
            failures as f64 / self.window.len() as f64
        }
    }
}

/// Sliding-window circuit breaker.
///
/// Clone-cheap: clones share the same window and state. One breaker serves a
/// single logical call-group (for example "order"), shared by every caller in
/// the process.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: Arc<CircuitBreakerConfig>,
    state: Arc<Mutex<CircuitBreakerState>>,
    // Metrics
    total_calls: Arc<AtomicU64>,
    total_successes: Arc<AtomicU64>,
    total_failures: Arc<AtomicU64>,
    total_rejections: Arc<AtomicU64>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given configuration.
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config: Arc::new(config),
            state: Arc::new(Mutex::new(CircuitBreakerState {
                state: State::Closed,
                window: VecDeque::new(),
                opened_at: None,
                trial_in_flight: false,
            })),
            total_calls: Arc::new(AtomicU64::new(0)),
            total_successes: Arc::new(AtomicU64::new(0)),
            total_failures: Arc::new(AtomicU64::new(0)),
            total_rejections: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Get the current state of the circuit breaker.
    pub async fn state(&self) -> State {
        let state = self.state.lock().await;
        state.state
    }

    /// Call an operation through the circuit breaker.
    ///
    /// # Errors
    ///
    /// Returns `CircuitBreakerError::Open` if the circuit is open (or a
    /// half-open trial is already in flight). Returns
    /// `CircuitBreakerError::Inner` if the operation fails; the failure is
    /// recorded in the window.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        self.total_calls.fetch_add(1, Ordering::Relaxed);

        let Some(trial) = self.try_acquire().await else {
            self.total_rejections.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("Circuit breaker is OPEN, rejecting request");
            return Err(CircuitBreakerError::Open);
        };

        match operation().await {
            Ok(result) => {
                self.record(false, trial).await;
                self.total_successes.fetch_add(1, Ordering::Relaxed);
                Ok(result)
            }
            Err(err) => {
                self.record(true, trial).await;
                self.total_failures.fetch_add(1, Ordering::Relaxed);
                Err(CircuitBreakerError::Inner(err))
            }
        }
    }

    /// Decide whether a request may proceed.
    ///
    /// Returns `Some(true)` when the request is the half-open trial,
    /// `Some(false)` for a normal closed-state request, `None` when rejected.
    async fn try_acquire(&self) -> Option<bool> {
        let mut state = self.state.lock().await;

        match state.state {
            State::Closed => Some(false),
            State::Open => {
                let elapsed = state.opened_at.map(|at| at.elapsed());
                if elapsed.is_some_and(|e| e >= self.config.cool_down) {
                    tracing::info!("Circuit breaker transitioning OPEN -> HALF_OPEN");
                    state.state = State::HalfOpen;
                    state.trial_in_flight = true;
                    Some(true)
                } else {
                    None
                }
            }
            State::HalfOpen => {
                // Exactly one trial at a time.
                if state.trial_in_flight {
                    None
                } else {
                    state.trial_in_flight = true;
                    Some(true)
                }
            }
        }
    }

    /// Record an executed outcome in the window and update state.
    async fn record(&self, failed: bool, trial: bool) {
        let mut state = self.state.lock().await;

        if trial {
            state.trial_in_flight = false;
            if failed {
                tracing::warn!("Circuit breaker transitioning HALF_OPEN -> OPEN (trial failed)");
                state.state = State::Open;
                state.opened_at = Some(Instant::now());
            } else {
                tracing::info!("Circuit breaker transitioning HALF_OPEN -> CLOSED");
                state.state = State::Closed;
                state.window.clear();
                state.opened_at = None;
            }
            return;
        }

        // A late outcome from a call that started before the circuit opened
        // still lands in the window; the state check below is what matters.
        state.window.push_back(failed);
        while state.window.len() > self.config.window_size {
            state.window.pop_front();
        }

        if state.state == State::Closed
            && state.window.len() >= self.config.min_calls
            && state.failure_ratio() >= self.config.failure_threshold
        {
            tracing::warn!(
                failure_ratio = state.failure_ratio(),
                threshold = self.config.failure_threshold,
                window = state.window.len(),
                "Circuit breaker transitioning CLOSED -> OPEN"
            );
            state.state = State::Open;
            state.opened_at = Some(Instant::now());
            state.window.clear();
        }
    }

    /// Get circuit breaker metrics.
    #[must_use]
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        CircuitBreakerMetrics {
            total_calls: self.total_calls.load(Ordering::Relaxed),
            total_successes: self.total_successes.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
            total_rejections: self.total_rejections.load(Ordering::Relaxed),
        }
    }

    /// Reset the circuit breaker to closed state with an empty window.
    ///
    /// Useful for testing or manual intervention.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        tracing::info!("Circuit breaker manually reset to CLOSED");
        state.state = State::Closed;
        state.window.clear();
        state.opened_at = None;
        state.trial_in_flight = false;
    }
}

/// Metrics for circuit breaker monitoring.
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerMetrics {
    /// Total number of calls attempted
    pub total_calls: u64,
    /// Total number of successful calls
    pub total_successes: u64,
    /// Total number of failed calls
    pub total_failures: u64,
    /// Total number of rejected calls (circuit open)
    pub total_rejections: u64,
}

impl CircuitBreakerMetrics {
    /// Calculate success rate (0.0 to 1.0).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.total_calls == 0 {
            return 1.0;
        }
        self.total_successes as f64 / self.total_calls as f64
    }
}
