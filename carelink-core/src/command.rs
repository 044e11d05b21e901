use std::collections::HashMap;
use std::fmt;

use std::time::Instant;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::envelope::SpeechEnvelope;
use crate::intent::Callee;
use crate::types::{ContactId, DeviceId, IncidentId, JobId, SessionId};

/// Which bounded-concurrency lane a command executes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    SmartHome,
    Call,
    Notify,
    Tts,
    Video,
}

impl AdapterKind {
    /// All kinds, for registry iteration and health probes.
    pub const ALL: [Self; 5] = [
        Self::SmartHome,
        Self::Call,
        Self::Notify,
        Self::Tts,
        Self::Video,
    ];

    /// Return the snake_case tag for this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SmartHome => "smart_home",
            Self::Call => "call",
            Self::Notify => "notify",
            Self::Tts => "tts",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyChannel {
    Sms,
    Email,
}

/// A contact on the escalation ladder, resolved from policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactPoint {
    /// Stable contact identifier.
    pub id: ContactId,
    /// Display name, in the household's language.
    pub name: String,
    /// Ladder role this contact fills.
    pub role: Callee,
    /// E.164 phone number for voice calls.
    pub phone: String,
    /// SMS number, when different from `phone`.
    pub sms: Option<String>,
    /// Email address for the email channel.
    pub email: Option<String>,
}

impl ContactPoint {
    /// The number notifications should text, falling back to the voice line.
    #[must_use]
    pub fn sms_number(&self) -> &str {
        self.sms.as_deref().unwrap_or(&self.phone)
    }
}

/// One device step inside a scene batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneStep {
    pub device: DeviceId,
    pub action: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// A typed side-effect request for one adapter.
///
/// Commands are the only shape that crosses into the dispatch layer; every
/// variant names its adapter kind via [`AdapterCommand::kind`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum AdapterCommand {
    /// Apply one action to one whitelisted device.
    SmartHome {
        device: DeviceId,
        action: String,
        #[serde(default)]
        params: serde_json::Value,
    },

    /// Apply a named scene as a best-effort batch.
    ApplyScene {
        name: String,
        steps: Vec<SceneStep>,
    },

    /// Place an escalation call to a ladder contact.
    PlaceCall {
        contact: ContactPoint,
        incident: IncidentId,
        step_seq: u32,
    },

    /// Send one notification over one channel.
    Notify {
        channel: NotifyChannel,
        recipient: String,
        template: String,
        #[serde(default)]
        fields: HashMap<String, String>,
    },

    /// Speak a response envelope.
    Speak { envelope: SpeechEnvelope },

    /// Activate the family video uplink.
    ActivateVideo {
        stream: String,
        cameras: Vec<String>,
    },

    /// Tear the uplink down.
    DeactivateVideo { stream: String },
}

impl AdapterCommand {
    /// The lane this command executes on.
    #[must_use]
    pub fn kind(&self) -> AdapterKind {
        match self {
            Self::SmartHome { .. } | Self::ApplyScene { .. } => AdapterKind::SmartHome,
            Self::PlaceCall { .. } => AdapterKind::Call,
            Self::Notify { .. } => AdapterKind::Notify,
            Self::Speak { .. } => AdapterKind::Tts,
            Self::ActivateVideo { .. } | Self::DeactivateVideo { .. } => AdapterKind::Video,
        }
    }

    /// The device this command holds an in-flight lock on, if any.
    #[must_use]
    pub fn device(&self) -> Option<&DeviceId> {
        match self {
            Self::SmartHome { device, .. } => Some(device),
            _ => None,
        }
    }
}

/// Scheduling priority for adapter jobs. Emergency jobs are never dropped
/// and bypass the per-lane queue bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPriority {
    Normal,
    Emergency,
}

/// One side-effect request flowing through the dispatch layer.
///
/// Jobs are in-process only (the deadline is a monotonic [`Instant`]), so
/// unlike commands they do not serialize.
#[derive(Debug, Clone)]
pub struct AdapterJob {
    /// Unique job identifier.
    pub id: JobId,
    /// Session on whose behalf the job runs.
    pub session: SessionId,
    /// The typed command to execute.
    pub command: AdapterCommand,
    /// Scheduling priority.
    pub priority: JobPriority,
    /// Absolute deadline inherited from the orchestrator.
    pub deadline: Instant,
    /// Idempotency key for emergency steps (`incident_id:step_seq`);
    /// replaying a key causes no additional side effects.
    pub idempotency_key: Option<String>,
}

impl AdapterJob {
    /// Create a normal-priority job with a fresh UUID-v4 id.
    #[must_use]
    pub fn new(session: impl Into<SessionId>, command: AdapterCommand, deadline: Instant) -> Self {
        Self {
            id: JobId::new(Uuid::new_v4().to_string()),
            session: session.into(),
            command,
            priority: JobPriority::Normal,
            deadline,
            idempotency_key: None,
        }
    }

    /// Mark the job as emergency priority with its idempotency key.
    #[must_use]
    pub fn emergency(mut self, incident: &IncidentId, step_seq: u32) -> Self {
        self.priority = JobPriority::Emergency;
        self.idempotency_key = Some(format!("{incident}:{step_seq}"));
        self
    }
}
