use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use carelink_adapter::{AdapterError, CallAdapter, CallPlacement};
use carelink_core::{ContactPoint, IncidentId};

use crate::config::SipConfig;
use crate::error::SipError;

/// Request body for placing a call through the gateway.
#[derive(Debug, Serialize)]
struct PlaceCallRequest<'a> {
    to: &'a str,
    contact_id: &'a str,
    incident_id: &'a str,
    step_seq: u32,
    callback_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    caller_id: Option<&'a str>,
}

/// Gateway reply for an accepted placement.
#[derive(Debug, Deserialize)]
struct PlaceCallResponse {
    call_id: String,
}

/// Voice-call adapter backed by a SIP gateway.
///
/// Placement is idempotent on `(incident_id, step_seq)`: the gateway
/// deduplicates repeats so a replayed emergency step rings nobody twice.
pub struct SipCallAdapter {
    config: SipConfig,
    client: Client,
}

impl SipCallAdapter {
    /// Create a new adapter with a default HTTP client.
    #[must_use]
    pub fn new(config: SipConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("failed to build HTTP client");
        Self { config, client }
    }

    /// Create an adapter sharing an existing HTTP client.
    #[must_use]
    pub fn with_client(config: SipConfig, client: Client) -> Self {
        Self { config, client }
    }

    fn calls_url(&self) -> String {
        format!("{}/v1/calls", self.config.base_url)
    }
}

#[async_trait]
impl CallAdapter for SipCallAdapter {
    #[instrument(skip(self, contact), fields(adapter = "sip", incident = %incident, step_seq))]
    async fn place(
        &self,
        contact: &ContactPoint,
        incident: &IncidentId,
        step_seq: u32,
    ) -> Result<CallPlacement, AdapterError> {
        let request = PlaceCallRequest {
            to: &contact.phone,
            contact_id: contact.id.as_str(),
            incident_id: incident.as_str(),
            step_seq,
            callback_url: &self.config.callback_url,
            caller_id: self.config.caller_id.as_deref(),
        };

        debug!(contact = %contact.id, "placing call via SIP gateway");

        let response = self
            .client
            .post(self.calls_url())
            .bearer_auth(&self.config.token)
            .json(&request)
            .send()
            .await
            .map_err(SipError::from)?;

        let status = response.status();
        match status {
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                Err(SipError::Auth.into())
            }
            reqwest::StatusCode::TOO_MANY_REQUESTS => Err(SipError::RateLimited.into()),
            reqwest::StatusCode::CONFLICT => Ok(CallPlacement::Busy),
            status if status.is_success() => {
                let body: PlaceCallResponse = response
                    .json()
                    .await
                    .map_err(|e| SipError::Gateway(format!("bad placement reply: {e}")))?;
                Ok(CallPlacement::Accepted {
                    call_id: body.call_id,
                })
            }
            status => {
                let text = response.text().await.unwrap_or_default();
                Err(SipError::Gateway(format!("HTTP {status}: {text}")).into())
            }
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

    fn contact() -> ContactPoint {
        ContactPoint {
            id: carelink_core::ContactId::new("daughter"),
            name: "女儿".into(),
            role: carelink_core::Callee::Family,
            phone: "+8613800000000".into(),
            sms: None,
            email: None,
        }
    }

    #[tokio::test]
    async fn accepted_placement() {
        let base = respond_once("202 Accepted", r#"{"call_id":"call-42"}"#).await;
        let adapter = SipCallAdapter::new(SipConfig::new(base, "t", "http://me/callbacks/call"));
        let placement = adapter
            .place(&contact(), &IncidentId::new("inc-1"), 0)
            .await
            .unwrap();
        assert_eq!(
            placement,
            CallPlacement::Accepted {
                call_id: "call-42".into()
            }
        );
    }

    #[tokio::test]
    async fn busy_line_is_an_outcome_not_an_error() {
        let base = respond_once("409 Conflict", "{}").await;
        let adapter = SipCallAdapter::new(SipConfig::new(base, "t", "http://me/callbacks/call"));
        let placement = adapter
            .place(&contact(), &IncidentId::new("inc-1"), 0)
            .await
            .unwrap();
        assert_eq!(placement, CallPlacement::Busy);
    }

    #[tokio::test]
    async fn gateway_error_is_permanent() {
        let base = respond_once("500 Internal Server Error", "oops").await;
        let adapter = SipCallAdapter::new(SipConfig::new(base, "t", "http://me/callbacks/call"));
        let err = adapter
            .place(&contact(), &IncidentId::new("inc-1"), 0)
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
    }
}
