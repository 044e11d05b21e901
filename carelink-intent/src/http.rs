use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use carelink_core::Intent;

use crate::config::IntentClientConfig;
use crate::error::IntentError;
use crate::resolver::{IntentRequest, IntentResolver};
use crate::schema::parse_intent;

/// HTTP-based intent resolver.
///
/// Posts the request contract as JSON; the response body must itself be a
/// schema-valid intent object. No per-request timeout is set here: the
/// retry wrapper owns deadlines, so the underlying client is built without
/// one.
#[derive(Debug)]
pub struct HttpIntentResolver {
    client: reqwest::Client,
    config: IntentClientConfig,
}

impl HttpIntentResolver {
    /// Create a new HTTP resolver from the given configuration.
    pub fn new(config: IntentClientConfig) -> Result<Self, IntentError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| IntentError::Configuration(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Create a resolver sharing an existing HTTP client.
    #[must_use]
    pub fn with_client(config: IntentClientConfig, client: reqwest::Client) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl IntentResolver for HttpIntentResolver {
    async fn resolve(&self, request: &IntentRequest) -> Result<Intent, IntentError> {
        let body = json!({
            "system_prompt_version": request.system_prompt_version,
            "user_text": request.user_text,
            "session_summary": request.session_summary,
            "domain_vocabulary_hash": request.domain_vocabulary_hash,
        });

        debug!(endpoint = %self.config.endpoint, "sending intent request");

        let mut builder = self.client.post(&self.config.endpoint).json(&body);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| IntentError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = %status, "intent endpoint returned error");
            return Err(IntentError::Api(format!("HTTP {status}: {text}")));
        }

        let raw = response
            .text()
            .await
            .map_err(|e| IntentError::Http(e.to_string()))?;
        parse_intent(&raw)
    }
}
