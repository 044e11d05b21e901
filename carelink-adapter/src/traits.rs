use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use carelink_core::{
    AdapterResponse, ContactPoint, DeviceId, IncidentId, NotifyChannel, SpeechEnvelope,
};

use crate::error::AdapterError;

/// Result of placing an outbound call.
///
/// `Busy` is an outcome, not an error: the ladder advances without burning
/// placement retries on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "placement", rename_all = "snake_case")]
pub enum CallPlacement {
    /// The gateway accepted the call; acks arrive via callback.
    Accepted { call_id: String },
    /// The callee's line is busy.
    Busy,
}

/// What the video collaborator reports about its current constraints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoCapabilities {
    /// Privacy hours are active; activation is logged but never blocked
    /// for emergencies.
    pub privacy_restricted: bool,
}

/// Smart-home effector (lights, locks, scenes).
#[async_trait]
pub trait SmartHomeAdapter: Send + Sync {
    /// Apply one action to one device.
    async fn apply(
        &self,
        device: &DeviceId,
        action: &str,
        params: &serde_json::Value,
    ) -> Result<AdapterResponse, AdapterError>;

    /// Verify the adapter can reach its backend.
    async fn health_check(&self) -> Result<(), AdapterError>;
}

/// Voice-call effector (SIP gateway).
#[async_trait]
pub trait CallAdapter: Send + Sync {
    /// Place a call to a ladder contact. `step_seq` makes the request
    /// idempotent on the gateway side.
    async fn place(
        &self,
        contact: &ContactPoint,
        incident: &IncidentId,
        step_seq: u32,
    ) -> Result<CallPlacement, AdapterError>;

    /// Verify the adapter can reach its gateway.
    async fn health_check(&self) -> Result<(), AdapterError>;
}

/// Notification effector (SMS, email).
#[async_trait]
pub trait NotifyAdapter: Send + Sync {
    /// Send one templated notification.
    async fn send(
        &self,
        channel: NotifyChannel,
        recipient: &str,
        template: &str,
        fields: &std::collections::HashMap<String, String>,
    ) -> Result<AdapterResponse, AdapterError>;

    /// Verify the adapter can reach its gateway.
    async fn health_check(&self) -> Result<(), AdapterError>;
}

/// TTS effector.
#[async_trait]
pub trait TtsAdapter: Send + Sync {
    /// Speak one response envelope.
    async fn speak(&self, envelope: &SpeechEnvelope) -> Result<AdapterResponse, AdapterError>;

    /// Verify the adapter can reach its synthesizer.
    async fn health_check(&self) -> Result<(), AdapterError>;
}

/// Family video uplink control.
#[async_trait]
pub trait VideoAdapter: Send + Sync {
    /// Activate the uplink for the given cameras.
    async fn activate(
        &self,
        stream: &str,
        cameras: &[String],
    ) -> Result<AdapterResponse, AdapterError>;

    /// Tear the uplink down.
    async fn deactivate(&self, stream: &str) -> Result<AdapterResponse, AdapterError>;

    /// Current collaborator constraints.
    fn capabilities(&self) -> VideoCapabilities {
        VideoCapabilities::default()
    }

    /// Verify the adapter can reach its signaling service.
    async fn health_check(&self) -> Result<(), AdapterError>;
}
