use std::sync::Arc;

use carelink_core::{AdapterCommand, AdapterKind, AdapterResponse};

use crate::error::AdapterError;
use crate::traits::{CallAdapter, NotifyAdapter, SmartHomeAdapter, TtsAdapter, VideoAdapter};

/// Registry of the five adapter capabilities.
///
/// Every slot is optional so a degraded deployment (say, no video service)
/// still runs; executing a command against an empty slot yields
/// [`AdapterError::NotRegistered`].
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    smart_home: Option<Arc<dyn SmartHomeAdapter>>,
    call: Option<Arc<dyn CallAdapter>>,
    notify: Option<Arc<dyn NotifyAdapter>>,
    tts: Option<Arc<dyn TtsAdapter>>,
    video: Option<Arc<dyn VideoAdapter>>,
}

impl AdapterRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the smart-home adapter.
    #[must_use]
    pub fn with_smart_home(mut self, adapter: Arc<dyn SmartHomeAdapter>) -> Self {
        self.smart_home = Some(adapter);
        self
    }

    /// Register the call adapter.
    #[must_use]
    pub fn with_call(mut self, adapter: Arc<dyn CallAdapter>) -> Self {
        self.call = Some(adapter);
        self
    }

    /// Register the notification adapter.
    #[must_use]
    pub fn with_notify(mut self, adapter: Arc<dyn NotifyAdapter>) -> Self {
        self.notify = Some(adapter);
        self
    }

    /// Register the TTS adapter.
    #[must_use]
    pub fn with_tts(mut self, adapter: Arc<dyn TtsAdapter>) -> Self {
        self.tts = Some(adapter);
        self
    }

    /// Register the video adapter.
    #[must_use]
    pub fn with_video(mut self, adapter: Arc<dyn VideoAdapter>) -> Self {
        self.video = Some(adapter);
        self
    }

    /// The call adapter, when registered.
    #[must_use]
    pub fn call(&self) -> Option<&Arc<dyn CallAdapter>> {
        self.call.as_ref()
    }

    /// The video adapter, when registered.
    #[must_use]
    pub fn video(&self) -> Option<&Arc<dyn VideoAdapter>> {
        self.video.as_ref()
    }

    /// Execute one command against its adapter.
    ///
    /// Scene batches are decomposed by the executor before reaching here;
    /// call placement responses encode `accepted`/`busy` in the body.
    pub async fn execute(
        &self,
        command: &AdapterCommand,
    ) -> Result<AdapterResponse, AdapterError> {
        match command {
            AdapterCommand::SmartHome {
                device,
                action,
                params,
            } => {
                let adapter = self
                    .smart_home
                    .as_ref()
                    .ok_or(AdapterError::NotRegistered(AdapterKind::SmartHome))?;
                adapter.apply(device, action, params).await
            }

            AdapterCommand::ApplyScene { name, .. } => Err(AdapterError::InvalidPayload(format!(
                "scene {name:?} must be dispatched through the executor"
            ))),

            AdapterCommand::PlaceCall {
                contact,
                incident,
                step_seq,
            } => {
                let adapter = self
                    .call
                    .as_ref()
                    .ok_or(AdapterError::NotRegistered(AdapterKind::Call))?;
                let placement = adapter.place(contact, incident, *step_seq).await?;
                Ok(AdapterResponse::success(serde_json::to_value(placement)
                    .map_err(|e| AdapterError::InvalidPayload(e.to_string()))?))
            }

            AdapterCommand::Notify {
                channel,
                recipient,
                template,
                fields,
            } => {
                let adapter = self
                    .notify
                    .as_ref()
                    .ok_or(AdapterError::NotRegistered(AdapterKind::Notify))?;
                adapter.send(*channel, recipient, template, fields).await
            }

            AdapterCommand::Speak { envelope } => {
                let adapter = self
                    .tts
                    .as_ref()
                    .ok_or(AdapterError::NotRegistered(AdapterKind::Tts))?;
                adapter.speak(envelope).await
            }

            AdapterCommand::ActivateVideo { stream, cameras } => {
                let adapter = self
                    .video
                    .as_ref()
                    .ok_or(AdapterError::NotRegistered(AdapterKind::Video))?;
                adapter.activate(stream, cameras).await
            }

            AdapterCommand::DeactivateVideo { stream } => {
                let adapter = self
                    .video
                    .as_ref()
                    .ok_or(AdapterError::NotRegistered(AdapterKind::Video))?;
                adapter.deactivate(stream).await
            }
        }
    }

    /// Probe every registered adapter. Returns one entry per registered
    /// kind; unregistered kinds are skipped.
    pub async fn health_check_all(&self) -> Vec<(AdapterKind, Result<(), AdapterError>)> {
        let mut results = Vec::new();
        if let Some(a) = &self.smart_home {
            results.push((AdapterKind::SmartHome, a.health_check().await));
        }
        if let Some(a) = &self.call {
            results.push((AdapterKind::Call, a.health_check().await));
        }
        if let Some(a) = &self.notify {
            results.push((AdapterKind::Notify, a.health_check().await));
        }
        if let Some(a) = &self.tts {
            results.push((AdapterKind::Tts, a.health_check().await));
        }
        if let Some(a) = &self.video {
            results.push((AdapterKind::Video, a.health_check().await));
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::RecordingAdapters;
    use carelink_core::DeviceId;

    #[tokio::test]
    async fn empty_registry_rejects_commands() {
        let registry = AdapterRegistry::new();
        let cmd = AdapterCommand::SmartHome {
            device: DeviceId::new("light"),
            action: "on".into(),
            params: serde_json::Value::Null,
        };
        let err = registry.execute(&cmd).await.unwrap_err();
        assert!(matches!(err, AdapterError::NotRegistered(AdapterKind::SmartHome)));
    }

    #[tokio::test]
    async fn recording_registry_executes() {
        let recording = Arc::new(RecordingAdapters::new());
        let registry = recording.clone().into_registry();
        let cmd = AdapterCommand::SmartHome {
            device: DeviceId::new("light"),
            action: "on".into(),
            params: serde_json::Value::Null,
        };
        let resp = registry.execute(&cmd).await.unwrap();
        assert_eq!(resp.status, carelink_core::ResponseStatus::Success);
        assert_eq!(recording.commands().len(), 1);
    }

    #[tokio::test]
    async fn health_skips_unregistered_kinds() {
        let recording = Arc::new(RecordingAdapters::new());
        let registry = AdapterRegistry::new().with_tts(recording);
        let results = registry.health_check_all().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, AdapterKind::Tts);
        assert!(results[0].1.is_ok());
    }
}
