use std::fmt;

use serde::{Deserialize, Serialize};

use crate::classification::Classification;
use crate::envelope::AdapterResult;
use crate::intent::Intent;
use crate::types::{ContactId, EmergencyCategory, IncidentId, SessionId, Severity, UtteranceId};
use crate::utterance::Utterance;
use crate::verdict::GuardVerdict;

/// Typed bus topics. Delivery is at-least-once within the process; ordering
/// is preserved per `(topic, incident)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    AudioUtterance,
    GuardVerdict,
    IntentResolved,
    AdapterResult,
    IncidentEvent,
    AuditRecord,
}

impl Topic {
    /// Return the dotted topic name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AudioUtterance => "audio.utterance",
            Self::GuardVerdict => "guard.verdict",
            Self::IntentResolved => "intent.resolved",
            Self::AdapterResult => "adapter.result",
            Self::IncidentEvent => "incident.event",
            Self::AuditRecord => "audit.record",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which guard produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardStage {
    Pre,
    Post,
}

/// Where a typed intent came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentSource {
    DirectRule,
    Llm,
}

/// Lifecycle event for one incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentEvent {
    pub incident: IncidentId,
    pub session: SessionId,
    pub kind: IncidentEventKind,
}

/// What happened to the incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum IncidentEventKind {
    Opened {
        category: EmergencyCategory,
        severity: Severity,
    },
    CallingRung {
        rung: usize,
        contact: ContactId,
    },
    ContactReached {
        contact: ContactId,
    },
    RungFailed {
        rung: usize,
        contact: ContactId,
    },
    Resolved,
    Exhausted,
}

/// One event on the internal bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Utterance(Utterance),
    Classified {
        utterance: UtteranceId,
        classification: Classification,
    },
    Guard {
        utterance: UtteranceId,
        stage: GuardStage,
        verdict: GuardVerdict,
    },
    Intent {
        utterance: UtteranceId,
        source: IntentSource,
        intent: Intent,
    },
    Adapter(AdapterResult),
    Incident(IncidentEvent),
    Audit {
        record_id: String,
    },
}

impl Event {
    /// The topic this event is delivered on.
    #[must_use]
    pub fn topic(&self) -> Topic {
        match self {
            Self::Utterance(_) | Self::Classified { .. } => Topic::AudioUtterance,
            Self::Guard { .. } => Topic::GuardVerdict,
            Self::Intent { .. } => Topic::IntentResolved,
            Self::Adapter(_) => Topic::AdapterResult,
            Self::Incident(_) => Topic::IncidentEvent,
            Self::Audit { .. } => Topic::AuditRecord,
        }
    }

    /// The incident this event belongs to, when any.
    #[must_use]
    pub fn incident(&self) -> Option<&IncidentId> {
        match self {
            Self::Incident(ev) => Some(&ev.incident),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Language;

    #[test]
    fn topic_names_are_dotted() {
        assert_eq!(Topic::AudioUtterance.as_str(), "audio.utterance");
        assert_eq!(Topic::IncidentEvent.to_string(), "incident.event");
    }

    #[test]
    fn event_topic_mapping() {
        let utt = Utterance::new("u-1", "s-1", "hello", Language::En, 0.9);
        assert_eq!(Event::Utterance(utt).topic(), Topic::AudioUtterance);

        let ev = Event::Incident(IncidentEvent {
            incident: IncidentId::new("inc-1"),
            session: SessionId::new("s-1"),
            kind: IncidentEventKind::Resolved,
        });
        assert_eq!(ev.topic(), Topic::IncidentEvent);
        assert_eq!(ev.incident().unwrap().as_str(), "inc-1");
    }

    #[test]
    fn incident_event_serde() {
        let ev = IncidentEvent {
            incident: IncidentId::new("inc-2"),
            session: SessionId::new("s-9"),
            kind: IncidentEventKind::CallingRung {
                rung: 1,
                contact: ContactId::new("caregiver"),
            },
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains("calling_rung"));
        let back: IncidentEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ev);
    }
}
