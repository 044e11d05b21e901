use std::time::Duration;

use tokio::time::Instant;

/// The per-utterance deadline budget.
///
/// Each stage takes a slice of what remains; a slice is never larger than
/// the stage's own cap, and never extends past the utterance deadline.
/// Missed slices truncate later work, they do not abort completed
/// side effects.
#[derive(Debug, Clone, Copy)]
pub struct DeadlineBudget {
    started: Instant,
    total: Duration,
}

impl DeadlineBudget {
    /// Start the clock with a total budget.
    #[must_use]
    pub fn start(total: Duration) -> Self {
        Self {
            started: Instant::now(),
            total,
        }
    }

    /// Time left, saturating at zero.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.total.saturating_sub(self.started.elapsed())
    }

    /// Whether the whole budget is spent.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// The absolute utterance deadline.
    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.started + self.total
    }

    /// An absolute deadline for a stage capped at `cap`.
    #[must_use]
    pub fn slice(&self, cap: Duration) -> Instant {
        Instant::now() + cap.min(self.remaining())
    }

    /// The utterance deadline as a std instant, for adapter jobs.
    #[must_use]
    pub fn job_deadline(&self) -> std::time::Instant {
        self.deadline().into_std()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn remaining_shrinks_with_time() {
        let budget = DeadlineBudget::start(Duration::from_millis(2_500));
        assert_eq!(budget.remaining(), Duration::from_millis(2_500));

        tokio::time::advance(Duration::from_millis(1_000)).await;
        assert_eq!(budget.remaining(), Duration::from_millis(1_500));
        assert!(!budget.expired());

        tokio::time::advance(Duration::from_millis(2_000)).await;
        assert!(budget.expired());
        assert_eq!(budget.remaining(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn slice_is_capped_by_remaining() {
        let budget = DeadlineBudget::start(Duration::from_millis(1_000));
        tokio::time::advance(Duration::from_millis(800)).await;

        // A 1500 ms stage cap cannot exceed the 200 ms left.
        let slice = budget.slice(Duration::from_millis(1_500));
        assert!(slice <= budget.deadline());
        let granted = slice - Instant::now();
        assert_eq!(granted, Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn slice_respects_stage_cap() {
        let budget = DeadlineBudget::start(Duration::from_secs(10));
        let slice = budget.slice(Duration::from_millis(1_500));
        let granted = slice - Instant::now();
        assert_eq!(granted, Duration::from_millis(1_500));
    }
}
