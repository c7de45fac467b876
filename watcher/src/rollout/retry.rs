//! Retry budgets: fixed-delay polling of a rollout and exponential backoff
//! for GitOps mutations.

use std::time::{Duration, SystemTime};

/// Seconds one polling attempt stands for when a task carries a timeout.
pub const SECONDS_PER_ATTEMPT: i64 = 15;
/// Attempt count used when a timeout yields a non-positive budget.
pub const MIN_TIMEOUT_ATTEMPTS: u32 = 15;
/// Default attempts when the task has no timeout.
pub const DEFAULT_POLL_ATTEMPTS: u32 = 15;
/// Default delay between polling attempts.
pub const DEFAULT_POLL_DELAY: Duration = Duration::from_secs(15);

const DEFAULT_BACKOFF_ATTEMPTS: u32 = 3;
const DEFAULT_BASE_DELAY_MS: u64 = 1000;
const MAX_DELAY_MS: u64 = 30_000;

/// Fixed-delay polling schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Total number of observations, including the first.
    pub attempts: u32,
    /// Sleep between observations.
    pub delay: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_POLL_ATTEMPTS,
            delay: DEFAULT_POLL_DELAY,
        }
    }
}

impl PollPolicy {
    /// Derives the schedule for a task.
    ///
    /// A non-zero `timeout` (seconds) maps to `ceil(timeout / 15) + 1`
    /// attempts, falling back to 15 when that is not positive. A zero
    /// timeout keeps this policy.
    #[must_use]
    pub fn for_timeout(self, timeout: i64) -> Self {
        if timeout == 0 {
            return self;
        }

        let computed = div_ceil(timeout, SECONDS_PER_ATTEMPT).saturating_add(1);
        let attempts = if computed > 0 {
            u32::try_from(computed).unwrap_or(u32::MAX)
        } else {
            MIN_TIMEOUT_ATTEMPTS
        };

        Self { attempts, ..self }
    }
}

fn div_ceil(value: i64, divisor: i64) -> i64 {
    let quotient = value / divisor;
    if value % divisor > 0 {
        quotient + 1
    } else {
        quotient
    }
}

/// Exponential backoff with jitter for GitOps mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Base delay in milliseconds.
    pub base_delay_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl BackoffConfig {
    /// Creates a config with default values: 3 attempts, 1s base delay.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_attempts: DEFAULT_BACKOFF_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
        }
    }

    /// Sets the maximum number of attempts.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub const fn with_base_delay_ms(mut self, delay_ms: u64) -> Self {
        self.base_delay_ms = delay_ms;
        self
    }

    /// Delay before retrying after the failed `attempt` (zero-based).
    #[must_use]
    pub fn calculate_backoff_delay(&self, attempt: u32) -> Duration {
        let delay_ms = self
            .base_delay_ms
            .saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX));
        let capped_delay = delay_ms.min(MAX_DELAY_MS);

        // jitter of 0-25% on top of the capped delay
        let jitter = capped_delay
            .saturating_mul(jitter_factor())
            .saturating_div(4000);
        Duration::from_millis(capped_delay.saturating_add(jitter))
    }
}

/// Pseudo-random value in `[0, 1000)`.
fn jitter_factor() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    u64::from(nanos % 1000)
}
