use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use carelink_core::{IncidentId, SessionId, UtteranceId};

/// Which pipeline stage produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStage {
    PreGuard,
    Rules,
    Intent,
    PostGuard,
    Dispatch,
    Confirm,
    Emergency,
    Incident,
    Policy,
}

impl AuditStage {
    /// Return the snake_case stage tag.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PreGuard => "pre_guard",
            Self::Rules => "rules",
            Self::Intent => "intent",
            Self::PostGuard => "post_guard",
            Self::Dispatch => "dispatch",
            Self::Confirm => "confirm",
            Self::Emergency => "emergency",
            Self::Incident => "incident",
            Self::Policy => "policy",
        }
    }
}

impl fmt::Display for AuditStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One appended decision record.
///
/// `seq` is globally monotonic; `incident_seq` is strictly increasing with
/// no gaps within one incident, which lets the escalation history be
/// reconstructed offline in exact order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Unique record identifier (UUID v7, time-ordered).
    pub id: String,
    /// Global sequence number assigned by the sink.
    pub seq: u64,
    /// Per-incident sequence number, when the record belongs to one.
    pub incident_seq: Option<u64>,
    /// Session the decision belongs to.
    pub session: SessionId,
    /// Utterance under processing, if any.
    pub utterance: Option<UtteranceId>,
    /// Incident the record belongs to, if any.
    pub incident: Option<IncidentId>,
    /// Pipeline stage.
    pub stage: AuditStage,
    /// Short outcome code (e.g. `allow`, `deny`, `intent_timeout`).
    pub outcome: String,
    /// Structured stage-specific details.
    pub details: serde_json::Value,
    /// `SHA-256` of the stage payload, when one applies.
    pub payload_hash: Option<String>,
    /// Stage duration, when measured.
    pub duration_ms: Option<u64>,
    /// When the record was created.
    pub recorded_at: DateTime<Utc>,
}

/// A record before the sink assigns its id and sequence numbers.
#[derive(Debug, Clone)]
pub struct AuditDraft {
    pub session: SessionId,
    pub utterance: Option<UtteranceId>,
    pub incident: Option<IncidentId>,
    pub stage: AuditStage,
    pub outcome: String,
    pub details: serde_json::Value,
    pub payload_hash: Option<String>,
    pub duration_ms: Option<u64>,
}

impl AuditDraft {
    /// Start a draft for a stage and outcome.
    #[must_use]
    pub fn new(session: impl Into<SessionId>, stage: AuditStage, outcome: impl Into<String>) -> Self {
        Self {
            session: session.into(),
            utterance: None,
            incident: None,
            stage,
            outcome: outcome.into(),
            details: serde_json::Value::Null,
            payload_hash: None,
            duration_ms: None,
        }
    }

    /// Attach the utterance under processing.
    #[must_use]
    pub fn with_utterance(mut self, utterance: impl Into<UtteranceId>) -> Self {
        self.utterance = Some(utterance.into());
        self
    }

    /// Attach the incident this record belongs to.
    #[must_use]
    pub fn with_incident(mut self, incident: impl Into<IncidentId>) -> Self {
        self.incident = Some(incident.into());
        self
    }

    /// Attach structured details.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    /// Attach a payload hash.
    #[must_use]
    pub fn with_payload_hash(mut self, hash: impl Into<String>) -> Self {
        self.payload_hash = Some(hash.into());
        self
    }

    /// Attach a measured stage duration.
    #[must_use]
    pub fn with_duration_ms(mut self, ms: u64) -> Self {
        self.duration_ms = Some(ms);
        self
    }
}

/// Query filters for audit reads.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AuditQuery {
    pub session: Option<SessionId>,
    pub incident: Option<IncidentId>,
    pub stage: Option<AuditStage>,
    pub outcome: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Maximum records returned (default 100, capped at 1000).
    pub limit: Option<usize>,
}

impl AuditQuery {
    /// The effective limit, clamped to `1..=1000`.
    #[must_use]
    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(100).clamp(1, 1000)
    }

    /// Whether a record passes every filter.
    #[must_use]
    pub fn matches(&self, record: &AuditRecord) -> bool {
        if let Some(session) = &self.session {
            if &record.session != session {
                return false;
            }
        }
        if let Some(incident) = &self.incident {
            if record.incident.as_ref() != Some(incident) {
                return false;
            }
        }
        if let Some(stage) = self.stage {
            if record.stage != stage {
                return false;
            }
        }
        if let Some(outcome) = &self.outcome {
            if &record.outcome != outcome {
                return false;
            }
        }
        if let Some(from) = self.from {
            if record.recorded_at < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if record.recorded_at > to {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(stage: AuditStage, outcome: &str) -> AuditRecord {
        AuditRecord {
            id: "r-1".into(),
            seq: 1,
            incident_seq: None,
            session: SessionId::new("s-1"),
            utterance: Some(UtteranceId::new("u-1")),
            incident: None,
            stage,
            outcome: outcome.into(),
            details: serde_json::Value::Null,
            payload_hash: None,
            duration_ms: Some(3),
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn query_filters_stage_and_outcome() {
        let query = AuditQuery {
            stage: Some(AuditStage::PostGuard),
            outcome: Some("deny".into()),
            ..AuditQuery::default()
        };
        assert!(query.matches(&record(AuditStage::PostGuard, "deny")));
        assert!(!query.matches(&record(AuditStage::PostGuard, "allow")));
        assert!(!query.matches(&record(AuditStage::Rules, "deny")));
    }

    #[test]
    fn effective_limit_is_clamped() {
        assert_eq!(AuditQuery::default().effective_limit(), 100);
        let q = AuditQuery {
            limit: Some(9999),
            ..AuditQuery::default()
        };
        assert_eq!(q.effective_limit(), 1000);
    }

    #[test]
    fn record_serde_roundtrip() {
        let r = record(AuditStage::Emergency, "opened");
        let json = serde_json::to_string(&r).unwrap();
        let back: AuditRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn draft_builder() {
        let draft = AuditDraft::new("s-1", AuditStage::Intent, "intent_timeout")
            .with_utterance("u-9")
            .with_duration_ms(1500);
        assert_eq!(draft.outcome, "intent_timeout");
        assert_eq!(draft.utterance.as_ref().unwrap().as_str(), "u-9");
    }
}
