//! Recording adapters for tests and dry runs.
//!
//! One struct implements every capability trait; commands are logged
//! instead of performed. Failure injection is per adapter kind so tests can
//! exercise retry and degradation paths.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use carelink_core::{
    AdapterCommand, AdapterKind, AdapterResponse, ContactPoint, DeviceId, IncidentId,
    NotifyChannel, SpeechEnvelope,
};

use crate::error::AdapterError;
use crate::registry::AdapterRegistry;
use crate::traits::{
    CallAdapter, CallPlacement, NotifyAdapter, SmartHomeAdapter, TtsAdapter, VideoAdapter,
    VideoCapabilities,
};

/// An in-memory adapter that records every command.
#[derive(Default)]
pub struct RecordingAdapters {
    commands: Mutex<Vec<AdapterCommand>>,
    failing: Mutex<HashSet<AdapterKind>>,
    transient_failures: Mutex<HashMap<AdapterKind, u32>>,
    privacy_restricted: Mutex<bool>,
}

impl RecordingAdapters {
    /// Create a recorder that succeeds on everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry with this recorder in every slot.
    #[must_use]
    pub fn into_registry(self: Arc<Self>) -> AdapterRegistry {
        AdapterRegistry::new()
            .with_smart_home(self.clone())
            .with_call(self.clone())
            .with_notify(self.clone())
            .with_tts(self.clone())
            .with_video(self)
    }

    /// Make one adapter kind fail permanently.
    pub fn fail_kind(&self, kind: AdapterKind) {
        self.failing.lock().insert(kind);
    }

    /// Make one adapter kind fail transiently for the next `count` calls.
    pub fn fail_transiently(&self, kind: AdapterKind, count: u32) {
        self.transient_failures.lock().insert(kind, count);
    }

    /// Mark video as privacy-restricted.
    pub fn set_privacy_restricted(&self, restricted: bool) {
        *self.privacy_restricted.lock() = restricted;
    }

    /// Everything recorded so far, in execution order.
    #[must_use]
    pub fn commands(&self) -> Vec<AdapterCommand> {
        self.commands.lock().clone()
    }

    /// Recorded commands for one adapter kind.
    #[must_use]
    pub fn commands_for(&self, kind: AdapterKind) -> Vec<AdapterCommand> {
        self.commands
            .lock()
            .iter()
            .filter(|c| c.kind() == kind)
            .cloned()
            .collect()
    }

    fn check(&self, kind: AdapterKind) -> Result<(), AdapterError> {
        if self.failing.lock().contains(&kind) {
            return Err(AdapterError::Execution(format!("{kind} forced failure")));
        }
        let mut transients = self.transient_failures.lock();
        if let Some(left) = transients.get_mut(&kind) {
            if *left > 0 {
                *left -= 1;
                return Err(AdapterError::Connection(format!("{kind} transient")));
            }
        }
        Ok(())
    }

    fn record(&self, command: AdapterCommand) -> Result<AdapterResponse, AdapterError> {
        self.check(command.kind())?;
        self.commands.lock().push(command);
        Ok(AdapterResponse::success(serde_json::json!({"recorded": true})))
    }
}

#[async_trait]
impl SmartHomeAdapter for RecordingAdapters {
    async fn apply(
        &self,
        device: &DeviceId,
        action: &str,
        params: &serde_json::Value,
    ) -> Result<AdapterResponse, AdapterError> {
        self.record(AdapterCommand::SmartHome {
            device: device.clone(),
            action: action.to_owned(),
            params: params.clone(),
        })
    }

    async fn health_check(&self) -> Result<(), AdapterError> {
        self.check(AdapterKind::SmartHome)
    }
}

#[async_trait]
impl CallAdapter for RecordingAdapters {
    async fn place(
        &self,
        contact: &ContactPoint,
        incident: &IncidentId,
        step_seq: u32,
    ) -> Result<CallPlacement, AdapterError> {
        self.record(AdapterCommand::PlaceCall {
            contact: contact.clone(),
            incident: incident.clone(),
            step_seq,
        })?;
        Ok(CallPlacement::Accepted {
            call_id: format!("rec-{incident}-{step_seq}"),
        })
    }

    async fn health_check(&self) -> Result<(), AdapterError> {
        self.check(AdapterKind::Call)
    }
}

#[async_trait]
impl NotifyAdapter for RecordingAdapters {
    async fn send(
        &self,
        channel: NotifyChannel,
        recipient: &str,
        template: &str,
        fields: &HashMap<String, String>,
    ) -> Result<AdapterResponse, AdapterError> {
        self.record(AdapterCommand::Notify {
            channel,
            recipient: recipient.to_owned(),
            template: template.to_owned(),
            fields: fields.clone(),
        })
    }

    async fn health_check(&self) -> Result<(), AdapterError> {
        self.check(AdapterKind::Notify)
    }
}

#[async_trait]
impl TtsAdapter for RecordingAdapters {
    async fn speak(&self, envelope: &SpeechEnvelope) -> Result<AdapterResponse, AdapterError> {
        self.record(AdapterCommand::Speak {
            envelope: envelope.clone(),
        })
    }

    async fn health_check(&self) -> Result<(), AdapterError> {
        self.check(AdapterKind::Tts)
    }
}

#[async_trait]
impl VideoAdapter for RecordingAdapters {
    async fn activate(
        &self,
        stream: &str,
        cameras: &[String],
    ) -> Result<AdapterResponse, AdapterError> {
        self.record(AdapterCommand::ActivateVideo {
            stream: stream.to_owned(),
            cameras: cameras.to_vec(),
        })
    }

    async fn deactivate(&self, stream: &str) -> Result<AdapterResponse, AdapterError> {
        self.record(AdapterCommand::DeactivateVideo {
            stream: stream.to_owned(),
        })
    }

    fn capabilities(&self) -> VideoCapabilities {
        VideoCapabilities {
            privacy_restricted: *self.privacy_restricted.lock(),
        }
    }

    async fn health_check(&self) -> Result<(), AdapterError> {
        self.check(AdapterKind::Video)
    }
}
