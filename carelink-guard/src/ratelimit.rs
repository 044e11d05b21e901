use std::time::Instant;

use dashmap::DashMap;

use carelink_core::{IntentKind, SessionId};
use carelink_policy::RateLimitParams;

/// Token bucket state for one `(session, intent kind, action)` key.
#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

/// In-process token-bucket rate limiter.
///
/// One bucket per `(session, intent kind, action)`; capacity and refill
/// rate come from the policy snapshot so limits version with policy.
#[derive(Default)]
pub struct RateLimiter {
    buckets: DashMap<String, Bucket>,
}

impl RateLimiter {
    /// Create an empty limiter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to take one token. Returns `false` when the bucket is empty.
    pub fn try_acquire(
        &self,
        session: &SessionId,
        kind: IntentKind,
        action: &str,
        params: RateLimitParams,
    ) -> bool {
        let key = format!("{session}:{kind}:{action}");
        let now = Instant::now();
        let refill_per_sec = f64::from(params.per_minute) / 60.0;

        let mut entry = self.buckets.entry(key).or_insert(Bucket {
            tokens: f64::from(params.burst),
            refilled_at: now,
        });

        let elapsed = now.duration_since(entry.refilled_at).as_secs_f64();
        entry.tokens =
            (entry.tokens + elapsed * refill_per_sec).min(f64::from(params.burst));
        entry.refilled_at = now;

        if entry.tokens >= 1.0 {
            entry.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Drop all buckets (policy reload with changed limits).
    pub fn reset(&self) {
        self.buckets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(burst: u32, per_minute: u32) -> RateLimitParams {
        RateLimitParams { burst, per_minute }
    }

    #[test]
    fn burst_then_blocked() {
        let limiter = RateLimiter::new();
        let session = SessionId::new("s-1");
        for _ in 0..3 {
            assert!(limiter.try_acquire(&session, IntentKind::SmartHome, "on", params(3, 1)));
        }
        assert!(!limiter.try_acquire(&session, IntentKind::SmartHome, "on", params(3, 1)));
    }

    #[test]
    fn buckets_are_keyed_per_action() {
        let limiter = RateLimiter::new();
        let session = SessionId::new("s-1");
        assert!(limiter.try_acquire(&session, IntentKind::SmartHome, "on", params(1, 1)));
        assert!(!limiter.try_acquire(&session, IntentKind::SmartHome, "on", params(1, 1)));
        // A different action has its own bucket.
        assert!(limiter.try_acquire(&session, IntentKind::SmartHome, "off", params(1, 1)));
    }

    #[test]
    fn buckets_are_keyed_per_session() {
        let limiter = RateLimiter::new();
        assert!(limiter.try_acquire(
            &SessionId::new("a"),
            IntentKind::Call,
            "family",
            params(1, 1)
        ));
        assert!(limiter.try_acquire(
            &SessionId::new("b"),
            IntentKind::Call,
            "family",
            params(1, 1)
        ));
    }

    #[test]
    fn reset_refills_everything() {
        let limiter = RateLimiter::new();
        let session = SessionId::new("s-1");
        assert!(limiter.try_acquire(&session, IntentKind::Chat, "chat", params(1, 1)));
        assert!(!limiter.try_acquire(&session, IntentKind::Chat, "chat", params(1, 1)));
        limiter.reset();
        assert!(limiter.try_acquire(&session, IntentKind::Chat, "chat", params(1, 1)));
    }
}
