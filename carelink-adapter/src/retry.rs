use std::time::Duration;

use carelink_policy::RetryParams;

/// Backoff schedule for one adapter kind, derived from policy.
///
/// Exponential with deterministic attempt-indexed jitter: concurrent
/// retries spread over a window without a random number generator, and
/// replay tests reproduce schedules exactly.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    params: RetryParams,
}

impl Backoff {
    /// Build a schedule from policy parameters.
    #[must_use]
    pub fn new(params: RetryParams) -> Self {
        Self { params }
    }

    /// Retries allowed after the first attempt.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.params.max_retries
    }

    /// Delay before retry number `attempt` (zero-based), clamped to the
    /// configured maximum.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.params.base.as_secs_f64();
        // Retry counts are tiny, so the i32 cast cannot wrap.
        #[allow(clippy::cast_possible_wrap)]
        let raw = base * self.params.multiplier.powi(attempt as i32);

        let adjusted = if self.params.jitter {
            // +0% to +40% spread keyed on the attempt index.
            let factor = 1.0 + 0.1 * f64::from(attempt % 5);
            raw * factor
        } else {
            raw
        };

        Duration::from_secs_f64(adjusted.min(self.params.max.as_secs_f64()))
    }
}
