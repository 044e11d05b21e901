use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classification::RejectReason;
use crate::command::AdapterKind;
use crate::types::{EmergencyCategory, IncidentId, JobId, Language, Severity, UtteranceId};
use crate::verdict::DenyReason;

/// Speech delivery urgency for the TTS collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Normal,
    Calming,
    Urgent,
}

/// What the TTS collaborator is asked to say.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechEnvelope {
    /// Text to synthesize.
    pub text: String,
    /// Locale to speak in.
    pub locale: Language,
    /// Delivery urgency.
    pub urgency: Urgency,
    /// Whether barge-in may cut this response short.
    pub allow_interrupt: bool,
}

impl SpeechEnvelope {
    /// A normal-urgency, interruptible response.
    #[must_use]
    pub fn normal(text: impl Into<String>, locale: Language) -> Self {
        Self {
            text: text.into(),
            locale,
            urgency: Urgency::Normal,
            allow_interrupt: true,
        }
    }

    /// A calm emergency acknowledgement that must not be interrupted.
    #[must_use]
    pub fn urgent(text: impl Into<String>, locale: Language) -> Self {
        Self {
            text: text.into(),
            locale,
            urgency: Urgency::Urgent,
            allow_interrupt: false,
        }
    }

    /// A calming tone, used for denials and reassurance.
    #[must_use]
    pub fn calming(text: impl Into<String>, locale: Language) -> Self {
        Self {
            text: text.into(),
            locale,
            urgency: Urgency::Calming,
            allow_interrupt: true,
        }
    }
}

/// Response from one adapter execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterResponse {
    /// Status of the execution.
    pub status: ResponseStatus,
    /// Adapter-specific response body.
    pub body: serde_json::Value,
}

impl AdapterResponse {
    /// Create a successful adapter response.
    #[must_use]
    pub fn success(body: serde_json::Value) -> Self {
        Self {
            status: ResponseStatus::Success,
            body,
        }
    }

    /// Create a partial response (scene batches that met the success ratio
    /// with individual device failures).
    #[must_use]
    pub fn partial(body: serde_json::Value) -> Self {
        Self {
            status: ResponseStatus::Partial,
            body,
        }
    }

    /// Create a failed adapter response.
    #[must_use]
    pub fn failure(body: serde_json::Value) -> Self {
        Self {
            status: ResponseStatus::Failure,
            body,
        }
    }
}

/// Status of an adapter execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Success,
    Failure,
    Partial,
}

/// Error detail when a job fails terminally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterFailure {
    /// Short error code (e.g. `TIMEOUT`, `CONNECTION`).
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Whether the underlying error class is transient.
    pub retryable: bool,
    /// Number of attempts made.
    pub attempts: u32,
}

/// Terminal outcome of one adapter job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    /// The adapter executed the command.
    Completed { response: AdapterResponse },
    /// The job failed after all retries.
    Failed { error: AdapterFailure },
    /// The lane's queue bound was hit; the caller should try again.
    Busy,
    /// The idempotency key was already executed; no side effect repeated.
    Duplicate,
}

impl JobOutcome {
    /// Whether the job had its intended effect.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        matches!(
            self,
            Self::Completed {
                response: AdapterResponse {
                    status: ResponseStatus::Success | ResponseStatus::Partial,
                    ..
                }
            } | Self::Duplicate
        )
    }
}

/// A job's terminal outcome, as published on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterResult {
    pub job: JobId,
    pub kind: AdapterKind,
    pub outcome: JobOutcome,
}

/// Structured outcome of one utterance through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PipelineOutcome {
    /// Emergency accepted; fan-out proceeds independently. `incident` is
    /// absent when a quench window suppressed re-opening.
    EmergencyAccepted {
        incident: Option<IncidentId>,
        category: EmergencyCategory,
        severity: Severity,
    },
    /// Adapter jobs ran; individual results attached.
    Executed { results: Vec<AdapterResult> },
    /// A high-risk action awaits a confirming utterance.
    ConfirmPending { expires_at: DateTime<Utc> },
    /// A guard denied the request.
    Denied { reason: DenyReason },
    /// The rules engine rejected the utterance outright.
    Rejected { reason: RejectReason },
    /// Conversational reply with no side effect.
    ChatReply,
    /// An adapter lane was saturated.
    AdapterBusy { kind: AdapterKind },
    /// The intent stage failed; a conservative fallback was spoken.
    IntentFailed { reason: String },
    /// The system is quiescing and accepts no new utterances.
    Draining,
}

/// What the pipeline hands back for one utterance: speech plus a structured
/// outcome for the bus and the family client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// The utterance this responds to.
    pub utterance: UtteranceId,
    /// What to say.
    pub speech: SpeechEnvelope,
    /// What actually happened.
    pub outcome: PipelineOutcome,
}
