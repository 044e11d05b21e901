use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use carelink_adapter::{AdapterError, SmartHomeAdapter};
use carelink_core::{AdapterResponse, DeviceId};

use crate::config::HomeAssistantConfig;
use crate::error::HomeAssistantError;

/// Smart-home adapter backed by a Home Assistant instance.
pub struct HomeAssistantAdapter {
    config: HomeAssistantConfig,
    client: Client,
}

impl HomeAssistantAdapter {
    /// Create a new adapter with a default HTTP client.
    #[must_use]
    pub fn new(config: HomeAssistantConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("failed to build HTTP client");
        Self { config, client }
    }

    /// Create an adapter sharing an existing HTTP client.
    #[must_use]
    pub fn with_client(config: HomeAssistantConfig, client: Client) -> Self {
        Self { config, client }
    }

    fn service_url(&self, action: &str) -> String {
        format!("{}/api/services/homeassistant/{action}", self.config.base_url)
    }

    async fn call_service(
        &self,
        device: &DeviceId,
        action: &str,
        params: &serde_json::Value,
    ) -> Result<serde_json::Value, HomeAssistantError> {
        let mut body = serde_json::json!({"entity_id": device.as_str()});
        if let (Some(map), Some(extra)) = (body.as_object_mut(), params.as_object()) {
            for (key, value) in extra {
                map.insert(key.clone(), value.clone());
            }
        }

        debug!(device = %device, action = %action, "calling Home Assistant service");

        let response = self
            .client
            .post(self.service_url(action))
            .bearer_auth(&self.config.token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        match status {
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                Err(HomeAssistantError::Auth)
            }
            reqwest::StatusCode::TOO_MANY_REQUESTS => Err(HomeAssistantError::RateLimited),
            status if !status.is_success() => {
                let text = response.text().await.unwrap_or_default();
                Err(HomeAssistantError::Api(format!("HTTP {status}: {text}")))
            }
            _ => Ok(response.json().await.unwrap_or(serde_json::Value::Null)),
        }
    }
}

#[async_trait]
impl SmartHomeAdapter for HomeAssistantAdapter {
    #[instrument(skip(self, params), fields(adapter = "homeassistant"))]
    async fn apply(
        &self,
        device: &DeviceId,
        action: &str,
        params: &serde_json::Value,
    ) -> Result<AdapterResponse, AdapterError> {
        let body = self.call_service(device, action, params).await?;
        Ok(AdapterResponse::success(serde_json::json!({
            "entity_id": device.as_str(),
            "action": action,
            "result": body,
        })))
    }

    async fn health_check(&self) -> Result<(), AdapterError> {
        let response = self
            .client
            .get(format!("{}/api/", self.config.base_url))
            .bearer_auth(&self.config.token)
            .send()
            .await
            .map_err(|e| AdapterError::Connection(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AdapterError::Auth("access token rejected".into()));
        }
        if !status.is_success() {
            return Err(AdapterError::Connection(format!("HTTP {status}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// Minimal one-shot HTTP server returning a canned response.
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
    async fn apply_success() {
        let base = respond_once("200 OK", "[]").await;
        let adapter = HomeAssistantAdapter::new(HomeAssistantConfig::new(base, "token"));
        let resp = adapter
            .apply(
                &DeviceId::new("living_room_light"),
                "brighten",
                &serde_json::json!({"brightness": 200}),
            )
            .await
            .unwrap();
        assert_eq!(resp.status, carelink_core::ResponseStatus::Success);
        assert_eq!(resp.body["entity_id"], "living_room_light");
    }

    #[tokio::test]
    async fn unauthorized_maps_to_auth_error() {
        let base = respond_once("401 Unauthorized", "{}").await;
        let adapter = HomeAssistantAdapter::new(HomeAssistantConfig::new(base, "bad"));
        let err = adapter
            .apply(&DeviceId::new("x"), "on", &serde_json::Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Auth(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn rate_limit_maps_to_retryable() {
        let base = respond_once("429 Too Many Requests", "{}").await;
        let adapter = HomeAssistantAdapter::new(HomeAssistantConfig::new(base, "token"));
        let err = adapter
            .apply(&DeviceId::new("x"), "on", &serde_json::Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::RateLimited));
        assert!(err.is_retryable());
    }
}
