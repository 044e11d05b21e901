use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use carelink_core::{ChatStyle, Intent};

use crate::error::IntentError;
use crate::resolver::{IntentRequest, IntentResolver};

/// A mock resolver that returns a fixed intent.
#[derive(Debug, Clone)]
pub struct MockIntentResolver {
    intent: Intent,
}

impl MockIntentResolver {
    /// Create a mock returning the given intent.
    #[must_use]
    pub fn returning(intent: Intent) -> Self {
        Self { intent }
    }
}

#[async_trait]
impl IntentResolver for MockIntentResolver {
    async fn resolve(&self, _request: &IntentRequest) -> Result<Intent, IntentError> {
        Ok(self.intent.clone())
    }
}

/// A mock resolver that always fails.
#[derive(Debug)]
pub struct FailingIntentResolver {
    error: fn(&str) -> IntentError,
    message: String,
}

impl FailingIntentResolver {
    /// Fail with an API error.
    #[must_use]
    pub fn api(message: impl Into<String>) -> Self {
        Self {
            error: |m| IntentError::Api(m.to_owned()),
            message: message.into(),
        }
    }

    /// Fail with a schema violation.
    #[must_use]
    pub fn schema(message: impl Into<String>) -> Self {
        Self {
            error: |m| IntentError::SchemaViolation(m.to_owned()),
            message: message.into(),
        }
    }

    /// Fail with a non-retryable configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self {
            error: |m| IntentError::Configuration(m.to_owned()),
            message: message.into(),
        }
    }
}

#[async_trait]
impl IntentResolver for FailingIntentResolver {
    async fn resolve(&self, _request: &IntentRequest) -> Result<Intent, IntentError> {
        Err((self.error)(&self.message))
    }
}

/// A mock resolver that sleeps before answering, for timeout tests.
#[derive(Debug)]
pub struct SlowIntentResolver {
    delay: Duration,
}

impl SlowIntentResolver {
    /// Create a resolver that takes `delay` to answer.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl IntentResolver for SlowIntentResolver {
    async fn resolve(&self, _request: &IntentRequest) -> Result<Intent, IntentError> {
        tokio::time::sleep(self.delay).await;
        Ok(Intent::Chat {
            style: ChatStyle::Neutral,
        })
    }
}

/// Counts attempts made against a mock resolver.
#[derive(Debug, Default)]
pub struct FailingLog {
    count: AtomicU32,
}

impl FailingLog {
    /// Number of attempts observed.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }
}

/// A resolver that fails the first N attempts, then succeeds.
#[derive(Debug)]
pub struct FailingThenSucceeding {
    failures_left: AtomicU32,
    intent: Intent,
    log: Arc<FailingLog>,
}

impl FailingThenSucceeding {
    /// Fail `failures` times, then return `intent`.
    #[must_use]
    pub fn new(failures: u32, intent: Intent) -> Self {
        Self {
            failures_left: AtomicU32::new(failures),
            intent,
            log: Arc::new(FailingLog::default()),
        }
    }

    /// Fail `failures` times with an attempt log attached.
    #[must_use]
    pub fn with_log(failures: u32, log: Arc<FailingLog>) -> Self {
        Self {
            failures_left: AtomicU32::new(failures),
            intent: Intent::Chat {
                style: ChatStyle::Neutral,
            },
            log,
        }
    }
}

#[async_trait]
impl IntentResolver for FailingThenSucceeding {
    async fn resolve(&self, _request: &IntentRequest) -> Result<Intent, IntentError> {
        self.log.count.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures_left.fetch_sub(1, Ordering::SeqCst);
        if remaining > 0 {
            Err(IntentError::Http("transient".into()))
        } else {
            Ok(self.intent.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> IntentRequest {
        IntentRequest {
            system_prompt_version: "v1".into(),
            user_text: "hi".into(),
            session_summary: String::new(),
            domain_vocabulary_hash: "h".into(),
        }
    }

    #[tokio::test]
    async fn mock_returns_intent() {
        let intent = Intent::Chat {
            style: ChatStyle::Cheerful,
        };
        let resolver = MockIntentResolver::returning(intent.clone());
        assert_eq!(resolver.resolve(&request()).await.unwrap(), intent);
    }

    #[tokio::test]
    async fn failing_resolver_fails() {
        let resolver = FailingIntentResolver::schema("unknown field");
        let err = resolver.resolve(&request()).await.unwrap_err();
        assert!(matches!(err, IntentError::SchemaViolation(_)));
    }

    #[tokio::test]
    async fn failing_then_succeeding_recovers() {
        let resolver = FailingThenSucceeding::new(1, Intent::Chat {
            style: ChatStyle::Neutral,
        });
        assert!(resolver.resolve(&request()).await.is_err());
        assert!(resolver.resolve(&request()).await.is_ok());
    }
}
