use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorContext, PipelineError, Result, Severity};

/// Cooperative cancellation flag shared between the caller and the pipeline.
///
/// Checked before each new combination and before each retry attempt;
/// cancellation never interrupts an attempt that is already running.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Bounded exponential backoff parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryStrategy {
    /// Total attempts, including the first (>= 1)
    pub max_attempts: u32,

    /// Delay before the second attempt
    pub base_delay: Duration,

    /// Ceiling for computed delays (>= base-delay)
    pub max_delay: Duration,

    /// Multiplier applied per failed attempt
    pub backoff_factor: f64,
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            backoff_factor: 2.0,
        }
    }
}

impl RetryStrategy {
    /// Delay to sleep after failed attempt `attempt` (1-based):
    /// `min(base_delay * backoff_factor^(attempt-1), max_delay)`.
    ///
    /// Total for any input: overflow and non-finite factors clamp to
    /// `max_delay`, negative intermediate values clamp to zero.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let scaled = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        let capped = scaled.min(self.max_delay.as_secs_f64());
        if capped.is_finite() && capped > 0.0 {
            Duration::from_secs_f64(capped)
        } else if capped.is_nan() {
            self.max_delay
        } else {
            Duration::ZERO
        }
    }
}

/// Stateless policy flags controlling failure recovery.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RecoveryStrategy {
    /// Configuration handed back when a failure is downgraded to recovered
    pub fallback_config: Option<serde_json::Value>,

    /// Advance to the next combination on non-critical failure instead of
    /// aborting the run
    pub skip_non_critical: bool,

    /// Downgrade non-critical failures to a recovered outcome
    pub graceful_degradation: bool,

    /// Master switch for retrying at all
    pub enable_retry: bool,
}

/// Outcome of `RetryExecutor::handle_error`.
#[derive(Debug)]
pub enum Recovery {
    /// The failure was downgraded; the caller proceeds with the fallback
    /// configuration, if any.
    Recovered {
        fallback_config: Option<serde_json::Value>,
    },
    /// The failure stands.
    Failed(PipelineError),
}

/// Executes fallible async operations under bounded retry with backoff.
///
/// The loop is an explicit state machine over (attempt count, next delay,
/// last error): cancellation is checked at the top of every attempt, the
/// backoff sleep is the only suspension point the executor itself adds.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    strategy: RetryStrategy,
    recovery: RecoveryStrategy,
    cancel: CancelFlag,
    context: ErrorContext,
}

impl RetryExecutor {
    pub fn new(strategy: RetryStrategy, recovery: RecoveryStrategy, cancel: CancelFlag) -> Self {
        Self {
            strategy,
            recovery,
            cancel,
            context: ErrorContext::new("retry-executor"),
        }
    }

    /// Context attached to errors the executor raises itself, such as a
    /// cancellation observed between attempts.
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = context;
        self
    }

    pub fn strategy(&self) -> &RetryStrategy {
        &self.strategy
    }

    pub fn recovery(&self) -> &RecoveryStrategy {
        &self.recovery
    }

    /// Runs `operation` up to `max_attempts` times.
    ///
    /// An error is retried only when retrying is enabled, the error reports
    /// itself retryable, and its severity is below `Critical`. A critical
    /// error aborts immediately, since repeating it risks compounding the
    /// damage. On exhaustion the last error is returned annotated with the
    /// attempt count.
    pub async fn handle_with_retry<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 1;
        let max_attempts = self.strategy.max_attempts.max(1);

        loop {
            if self.cancel.is_cancelled() {
                return Err(PipelineError::build_step(
                    "cancelled",
                    Severity::High,
                    self.context.clone(),
                ));
            }

            let last_error = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("operation succeeded on attempt {attempt}");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            let retryable = self.recovery.enable_retry && last_error.is_retryable();
            if !retryable || attempt >= max_attempts {
                return Err(if attempt > 1 {
                    last_error.with_attempts(attempt)
                } else {
                    last_error
                });
            }

            let delay = self.strategy.delay_for_attempt(attempt);
            warn!(
                "attempt {attempt}/{max_attempts} failed ({last_error}), retrying in {}ms",
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Classifies a terminal error against the recovery policy.
    ///
    /// With graceful degradation enabled, anything below `Critical` is
    /// downgraded to a recovered outcome carrying the fallback configuration.
    /// Critical errors always stand.
    pub fn handle_error(&self, error: PipelineError) -> Recovery {
        if self.recovery.graceful_degradation && error.severity() != Severity::Critical {
            warn!("degrading gracefully after non-critical failure: {error}");
            Recovery::Recovered {
                fallback_config: self.recovery.fallback_config.clone(),
            }
        } else {
            Recovery::Failed(error)
        }
    }
}
