//! Video uplink control: activates the family WebRTC stream through the
//! signaling service. Privacy hours are the video collaborator's concern;
//! this adapter only reports the restriction flag it learns from the
//! service and never blocks an emergency activation on it.

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use carelink_adapter::{AdapterError, VideoAdapter, VideoCapabilities};
use carelink_core::AdapterResponse;

/// Configuration for the signaling service client.
#[derive(Clone)]
pub struct VideoConfig {
    /// Base URL of the signaling service.
    pub base_url: String,
    /// Bearer token.
    pub token: String,
}

impl std::fmt::Debug for VideoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoConfig")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl VideoConfig {
    /// Create a configuration for the given service.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct HealthReply {
    #[serde(default)]
    privacy_restricted: bool,
}

/// HTTP client for the video signaling service.
pub struct VideoClient {
    config: VideoConfig,
    client: Client,
    privacy_restricted: RwLock<bool>,
}

impl VideoClient {
    /// Create a new client.
    #[must_use]
    pub fn new(config: VideoConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("failed to build HTTP client");
        Self {
            config,
            client,
            privacy_restricted: RwLock::new(false),
        }
    }

    async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<AdapterResponse, AdapterError> {
        let response = self
            .client
            .post(format!("{}{path}", self.config.base_url))
            .bearer_auth(&self.config.token)
            .json(&body)
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
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AdapterError::Execution(format!("HTTP {status}: {text}")));
        }
        Ok(AdapterResponse::success(
            response.json().await.unwrap_or(serde_json::Value::Null),
        ))
    }
}

#[async_trait]
impl VideoAdapter for VideoClient {
    #[instrument(skip(self), fields(adapter = "video", stream))]
    async fn activate(
        &self,
        stream: &str,
        cameras: &[String],
    ) -> Result<AdapterResponse, AdapterError> {
        debug!(stream, cameras = cameras.len(), "activating uplink");
        self.post(
            "/v1/streams",
            serde_json::json!({"stream": stream, "cameras": cameras}),
        )
        .await
    }

    async fn deactivate(&self, stream: &str) -> Result<AdapterResponse, AdapterError> {
        self.post("/v1/streams/deactivate", serde_json::json!({"stream": stream}))
            .await
    }

    fn capabilities(&self) -> VideoCapabilities {
        VideoCapabilities {
            privacy_restricted: *self.privacy_restricted.read(),
        }
    }

    async fn health_check(&self) -> Result<(), AdapterError> {
        let response = self
            .client
            .get(format!("{}/v1/health", self.config.base_url))
            .bearer_auth(&self.config.token)
            .send()
            .await
            .map_err(|e| AdapterError::Connection(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AdapterError::Connection(format!(
                "HTTP {}",
                response.status()
            )));
        }
        // The service reports privacy hours on its health endpoint.
        if let Ok(reply) = response.json::<HealthReply>().await {
            *self.privacy_restricted.write() = reply.privacy_restricted;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn respond_once(status_line: &'static str, body: &'static str) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let _ = stream.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes()).await;
        });
        base_url
    }

    #[tokio::test]
    async fn activate_success() {
        let base = respond_once("200 OK", r#"{"offer":"sdp"}"#).await;
        let client = VideoClient::new(VideoConfig::new(base, "t"));
        let resp = client
            .activate("inc-1", &["living_room".into()])
            .await
            .unwrap();
        assert_eq!(resp.status, carelink_core::ResponseStatus::Success);
    }

    #[tokio::test]
    async fn health_updates_privacy_flag() {
        let base = respond_once("200 OK", r#"{"privacy_restricted":true}"#).await;
        let client = VideoClient::new(VideoConfig::new(base, "t"));
        client.health_check().await.unwrap();
        assert!(client.capabilities().privacy_restricted);
    }
}
