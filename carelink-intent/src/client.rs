use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, warn};

use carelink_core::Intent;

use crate::config::IntentClientConfig;
use crate::error::IntentError;
use crate::resolver::{IntentRequest, IntentResolver};

/// Deadline-aware retry wrapper around an [`IntentResolver`].
///
/// Runs at most three attempts (one initial plus two retries, backing off
/// 200 ms then 500 ms) and never past the orchestrator's absolute deadline.
/// Emergencies never pass through here; they bypass the intent stage
/// entirely.
#[derive(Debug, Clone)]
pub struct IntentClient {
    resolver: Arc<dyn IntentResolver>,
    config: IntentClientConfig,
}

impl IntentClient {
    /// Wrap a resolver with the retry policy from `config`.
    #[must_use]
    pub fn new(resolver: Arc<dyn IntentResolver>, config: IntentClientConfig) -> Self {
        Self { resolver, config }
    }

    /// The system prompt version sent with requests.
    #[must_use]
    pub fn prompt_version(&self) -> &str {
        &self.config.system_prompt_version
    }

    /// Resolve an intent within the absolute `deadline`.
    #[allow(clippy::cast_possible_truncation)]
    pub async fn resolve(
        &self,
        request: &IntentRequest,
        deadline: Instant,
    ) -> Result<Intent, IntentError> {
        let max_attempts = self.config.retry_backoff.len() as u32 + 1;
        let mut last_error = IntentError::Timeout(self.config.attempt_timeout.as_millis() as u64);

        for attempt in 0..max_attempts {
            let now = Instant::now();
            if now >= deadline {
                return Err(last_error);
            }
            let attempt_deadline = deadline.min(now + self.config.attempt_timeout);

            match tokio::time::timeout_at(attempt_deadline, self.resolver.resolve(request)).await {
                Ok(Ok(intent)) => {
                    debug!(attempt, "intent resolved");
                    return Ok(intent);
                }
                Ok(Err(err)) if err.is_retryable() && attempt + 1 < max_attempts => {
                    warn!(attempt, error = %err, "intent attempt failed, will retry");
                    last_error = err;
                }
                Ok(Err(err)) => return Err(err),
                Err(_elapsed) => {
                    let timed_out =
                        IntentError::Timeout(self.config.attempt_timeout.as_millis() as u64);
                    if attempt + 1 == max_attempts {
                        return Err(timed_out);
                    }
                    warn!(attempt, "intent attempt timed out, will retry");
                    last_error = timed_out;
                }
            }

            let backoff = self.config.retry_backoff[attempt as usize];
            if Instant::now() + backoff >= deadline {
                return Err(last_error);
            }
            tokio::time::sleep(backoff).await;
        }

        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::mock::{FailingLog, FailingThenSucceeding, MockIntentResolver, SlowIntentResolver};
    use carelink_core::ChatStyle;

    fn request() -> IntentRequest {
        IntentRequest {
            system_prompt_version: "v1".into(),
            user_text: "今天讲个笑话".into(),
            session_summary: String::new(),
            domain_vocabulary_hash: "abc".into(),
        }
    }

    fn config() -> IntentClientConfig {
        IntentClientConfig::new("http://unused")
            .with_attempt_timeout(Duration::from_millis(1_500))
    }

    #[tokio::test]
    async fn resolves_on_first_attempt() {
        let intent = Intent::Chat {
            style: ChatStyle::Cheerful,
        };
        let client = IntentClient::new(
            Arc::new(MockIntentResolver::returning(intent.clone())),
            config(),
        );
        let deadline = Instant::now() + Duration::from_secs(2);
        assert_eq!(client.resolve(&request(), deadline).await.unwrap(), intent);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_and_retries_then_fails() {
        let resolver = Arc::new(SlowIntentResolver::new(Duration::from_secs(60)));
        let client = IntentClient::new(resolver, config());
        let deadline = Instant::now() + Duration::from_secs(30);
        let err = client.resolve(&request(), deadline).await.unwrap_err();
        assert!(matches!(err, IntentError::Timeout(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let intent = Intent::Chat {
            style: ChatStyle::Neutral,
        };
        let resolver = Arc::new(FailingThenSucceeding::new(2, intent.clone()));
        let client = IntentClient::new(resolver, config());
        let deadline = Instant::now() + Duration::from_secs(10);
        assert_eq!(client.resolve(&request(), deadline).await.unwrap(), intent);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_retrying_at_deadline() {
        let log = Arc::new(FailingLog::default());
        let resolver = Arc::new(FailingThenSucceeding::with_log(10, log.clone()));
        let client = IntentClient::new(resolver, config());
        // Deadline admits the first attempt but not the 500 ms second backoff.
        let deadline = Instant::now() + Duration::from_millis(350);
        let err = client.resolve(&request(), deadline).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(log.attempts() <= 2, "attempts: {}", log.attempts());
    }

    #[tokio::test]
    async fn configuration_errors_do_not_retry() {
        let resolver = Arc::new(crate::mock::FailingIntentResolver::configuration("no key"));
        let client = IntentClient::new(resolver, config());
        let deadline = Instant::now() + Duration::from_secs(5);
        let err = client.resolve(&request(), deadline).await.unwrap_err();
        assert!(matches!(err, IntentError::Configuration(_)));
    }
}
