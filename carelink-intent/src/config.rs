use std::time::Duration;

/// Configuration for the HTTP intent resolver and retry wrapper.
#[derive(Debug, Clone)]
pub struct IntentClientConfig {
    /// Intent endpoint URL.
    pub endpoint: String,
    /// Optional bearer token.
    pub api_key: Option<String>,
    /// System prompt version tag sent with every request.
    pub system_prompt_version: String,
    /// Hard per-attempt deadline.
    pub attempt_timeout: Duration,
    /// Backoff before the first and second retry.
    pub retry_backoff: [Duration; 2],
}

impl IntentClientConfig {
    /// Create a config with the contract defaults: 1500 ms attempts, two
    /// retries backing off 200 ms then 500 ms.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            system_prompt_version: "v1".into(),
            attempt_timeout: Duration::from_millis(1_500),
            retry_backoff: [Duration::from_millis(200), Duration::from_millis(500)],
        }
    }

    /// Set the bearer token.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the system prompt version tag.
    #[must_use]
    pub fn with_prompt_version(mut self, version: impl Into<String>) -> Self {
        self.system_prompt_version = version.into();
        self
    }

    /// Set the per-attempt timeout.
    #[must_use]
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }
}
