use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Language, SessionId, UtteranceId};

/// One final decoded user sentence, as delivered by the ASR edge.
///
/// Utterances are read-only once created; ids are unique and monotonic
/// within a session (the ASR collaborator guarantees ordering).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    /// Unique, per-session-monotonic utterance identifier.
    pub id: UtteranceId,

    /// Session this utterance belongs to.
    pub session: SessionId,

    /// Final recognized text.
    pub text: String,

    /// Recognized language.
    pub language: Language,

    /// ASR confidence in `[0, 1]`.
    pub asr_conf: f32,

    /// Arrival timestamp at the pipeline edge.
    pub t_arrival: DateTime<Utc>,

    /// Optional speaker profile reference from voiceprint matching.
    pub speaker_profile: Option<String>,
}

impl Utterance {
    /// Create a new utterance arriving now.
    #[must_use]
    pub fn new(
        id: impl Into<UtteranceId>,
        session: impl Into<SessionId>,
        text: impl Into<String>,
        language: Language,
        asr_conf: f32,
    ) -> Self {
        Self {
            id: id.into(),
            session: session.into(),
            text: text.into(),
            language,
            asr_conf: asr_conf.clamp(0.0, 1.0),
            t_arrival: Utc::now(),
            speaker_profile: None,
        }
    }

    /// Attach a speaker profile reference.
    #[must_use]
    pub fn with_speaker_profile(mut self, profile: impl Into<String>) -> Self {
        self.speaker_profile = Some(profile.into());
        self
    }
}
