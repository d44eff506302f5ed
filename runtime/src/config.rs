//! Coordinator configuration.
//!
//! Values only; how they reach the process (flags, env files, orchestration)
//! is out of scope. `from_env` reads the `BREWLINE_*` variables below and
//! falls back to defaults, warning on unparsable values.
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `BREWLINE_POLL_INTERVAL_MS` | reconciliation poll interval | 1000 |
//! | `BREWLINE_CB_WINDOW` | breaker sliding-window size | 10 |
//! | `BREWLINE_CB_THRESHOLD` | breaker failure ratio (0..=1) | 0.5 |
//! | `BREWLINE_CB_MIN_CALLS` | outcomes before the ratio is evaluated | 5 |
//! | `BREWLINE_CB_COOL_DOWN_MS` | breaker cool-down | 30000 |
//! | `BREWLINE_BH_MAX_CONCURRENT` | bulkhead ceiling | 10 |
//! | `BREWLINE_BH_MAX_WAIT_MS` | bulkhead bounded wait | 500 |

use crate::bulkhead::BulkheadConfig;
use crate::circuit_breaker::CircuitBreakerConfig;
use std::str::FromStr;
use std::time::Duration;

/// Configuration for the reconciliation side of the coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Fixed interval between reconciliation passes
    pub poll_interval: Duration,
    /// Circuit breaker policy for the "order" call-group
    pub breaker: CircuitBreakerConfig,
    /// Bulkhead policy for the "order" call-group
    pub bulkhead: BulkheadConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            breaker: CircuitBreakerConfig::default(),
            bulkhead: BulkheadConfig::default(),
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(var = name, value = %raw, "Unparsable value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

impl CoordinatorConfig {
    /// Read configuration from `BREWLINE_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let breaker_defaults = CircuitBreakerConfig::default();
        let bulkhead_defaults = BulkheadConfig::default();

        Self {
            poll_interval: Duration::from_millis(env_or(
                "BREWLINE_POLL_INTERVAL_MS",
                defaults.poll_interval.as_millis() as u64,
            )),
            breaker: CircuitBreakerConfig::builder()
                .window_size(env_or("BREWLINE_CB_WINDOW", breaker_defaults.window_size))
                .failure_threshold(env_or(
                    "BREWLINE_CB_THRESHOLD",
                    breaker_defaults.failure_threshold,
                ))
                .min_calls(env_or("BREWLINE_CB_MIN_CALLS", breaker_defaults.min_calls))
                .cool_down(Duration::from_millis(env_or(
                    "BREWLINE_CB_COOL_DOWN_MS",
                    breaker_defaults.cool_down.as_millis() as u64,
                )))
                .build(),
            bulkhead: BulkheadConfig::builder()
                .max_concurrent(env_or(
                    "BREWLINE_BH_MAX_CONCURRENT",
                    bulkhead_defaults.max_concurrent,
                ))
                .max_wait(Duration::from_millis(env_or(
                    "BREWLINE_BH_MAX_WAIT_MS",
                    bulkhead_defaults.max_wait.as_millis() as u64,
                )))
                .build(),
        }
    }

    /// Set the poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the breaker policy.
    #[must_use]
    pub fn with_breaker(mut self, breaker: CircuitBreakerConfig) -> Self {
        self.breaker = breaker;
        self
    }

    /// Set the bulkhead policy.
    #[must_use]
    pub fn with_bulkhead(mut self, bulkhead: BulkheadConfig) -> Self {
        self.bulkhead = bulkhead;
        self
    }
}
