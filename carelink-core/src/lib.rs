pub mod classification;
pub mod command;
pub mod envelope;
pub mod error;
pub mod event;
pub mod fingerprint;
pub mod intent;
pub mod types;
pub mod utterance;
pub mod verdict;

pub use classification::{Classification, ClassificationKind, RejectReason};
pub use command::{
    AdapterCommand, AdapterJob, AdapterKind, ContactPoint, JobPriority, NotifyChannel, SceneStep,
};
pub use envelope::{
    AdapterFailure, AdapterResponse, AdapterResult, JobOutcome, PipelineOutcome, ResponseEnvelope,
    ResponseStatus, SpeechEnvelope, Urgency,
};
pub use error::CarelinkError;
pub use event::{Event, GuardStage, IncidentEvent, IncidentEventKind, IntentSource, Topic};
pub use fingerprint::payload_hash;
pub use intent::{Callee, ChatStyle, Intent, IntentKind, MoveSpeed};
pub use types::{
    ContactId, DeviceId, EmergencyCategory, EmotionReading, IncidentId, JobId, Language,
    SessionId, Severity, UtteranceId, ZoneId,
};
pub use utterance::Utterance;
pub use verdict::{Constraint, DenyReason, GuardDecision, GuardVerdict};
