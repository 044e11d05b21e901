//! TTS adapter: hands response envelopes to the speech synthesizer.

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use carelink_adapter::{AdapterError, TtsAdapter};
use carelink_core::{AdapterResponse, SpeechEnvelope};

/// Configuration for the TTS service client.
#[derive(Debug, Clone)]
pub struct TtsConfig {
    /// Base URL of the synthesizer service.
    pub base_url: String,
}

impl TtsConfig {
    /// Create a configuration for the given service.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

/// HTTP client for the speech synthesizer.
pub struct TtsClient {
    config: TtsConfig,
    client: Client,
}

impl TtsClient {
    /// Create a new client.
    #[must_use]
    pub fn new(config: TtsConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("failed to build HTTP client");
        Self { config, client }
    }
}

#[async_trait]
impl TtsAdapter for TtsClient {
    #[instrument(skip(self, envelope), fields(adapter = "tts", urgency = ?envelope.urgency))]
    async fn speak(&self, envelope: &SpeechEnvelope) -> Result<AdapterResponse, AdapterError> {
        debug!(locale = %envelope.locale, "submitting speech");
        let response = self
            .client
            .post(format!("{}/v1/speak", self.config.base_url))
            .json(envelope)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AdapterError::Timeout(std::time::Duration::from_secs(10))
                } else {
                    AdapterError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AdapterError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AdapterError::Execution(format!("HTTP {status}: {text}")));
        }
        Ok(AdapterResponse::success(serde_json::json!({"spoken": true})))
    }

    async fn health_check(&self) -> Result<(), AdapterError> {
        let response = self
            .client
            .get(format!("{}/v1/health", self.config.base_url))
            .send()
            .await
            .map_err(|e| AdapterError::Connection(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AdapterError::Connection(format!(
                "HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carelink_core::Language;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn respond_once(status_line: &'static str) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let _ = stream.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-length: 2\r\nconnection: close\r\n\r\n{{}}"
            );
            let _ = stream.write_all(response.as_bytes()).await;
        });
        base_url
    }

    #[tokio::test]
    async fn speak_success() {
        let base = respond_once("200 OK").await;
        let client = TtsClient::new(TtsConfig::new(base));
        let envelope = SpeechEnvelope::urgent("已为您联系家人", Language::Zh);
        let resp = client.speak(&envelope).await.unwrap();
        assert_eq!(resp.status, carelink_core::ResponseStatus::Success);
    }

    #[tokio::test]
    async fn server_error_is_permanent() {
        let base = respond_once("500 Internal Server Error").await;
        let client = TtsClient::new(TtsConfig::new(base));
        let envelope = SpeechEnvelope::normal("hi", Language::En);
        let err = client.speak(&envelope).await.unwrap_err();
        assert!(!err.is_retryable());
    }
}
