use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use carelink_core::{ContactId, IncidentId};

/// How a callee responded to an escalation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AckStatus {
    /// The callee answered and stayed on the line.
    Answered,
    /// The callee pressed a DTMF key acknowledging the alert.
    Dtmf { key: String },
    /// A human operator acknowledged with a token.
    OperatorToken { token: String },
    /// The callee actively declined.
    Declined,
    /// The call rang out.
    NoAnswer,
}

impl AckStatus {
    /// Whether this counts as a human acknowledgement.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        matches!(
            self,
            Self::Answered | Self::Dtmf { .. } | Self::OperatorToken { .. }
        )
    }
}

/// One callee acknowledgement, delivered by the SIP gateway callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallAck {
    pub incident: IncidentId,
    pub contact: ContactId,
    #[serde(flatten)]
    pub status: AckStatus,
}

/// Routes incoming acks to the ladder task waiting on their incident.
#[derive(Default)]
pub struct AckRouter {
    channels: DashMap<IncidentId, mpsc::UnboundedSender<CallAck>>,
}

impl AckRouter {
    /// Create an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an incident and receive its ack stream.
    #[must_use]
    pub fn register(&self, incident: &IncidentId) -> mpsc::UnboundedReceiver<CallAck> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.channels.insert(incident.clone(), tx);
        rx
    }

    /// Drop an incident's channel once terminal.
    pub fn unregister(&self, incident: &IncidentId) {
        self.channels.remove(incident);
    }

    /// Deliver one ack. Returns `false` when no ladder is waiting on the
    /// incident (already terminal, or unknown).
    pub fn deliver(&self, ack: CallAck) -> bool {
        match self.channels.get(&ack.incident) {
            Some(tx) => {
                debug!(incident = %ack.incident, contact = %ack.contact, "ack delivered");
                tx.send(ack).is_ok()
            }
            None => {
                debug!(incident = %ack.incident, "ack for unknown or closed incident");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ack(incident: &str, status: AckStatus) -> CallAck {
        CallAck {
            incident: IncidentId::new(incident),
            contact: ContactId::new("daughter"),
            status,
        }
    }

    #[test]
    fn positive_statuses() {
        assert!(AckStatus::Answered.is_positive());
        assert!(AckStatus::Dtmf { key: "1".into() }.is_positive());
        assert!(
            AckStatus::OperatorToken {
                token: "op-9".into()
            }
            .is_positive()
        );
        assert!(!AckStatus::Declined.is_positive());
        assert!(!AckStatus::NoAnswer.is_positive());
    }

    #[tokio::test]
    async fn delivers_to_registered_incident() {
        let router = AckRouter::new();
        let incident = IncidentId::new("inc-1");
        let mut rx = router.register(&incident);

        assert!(router.deliver(ack("inc-1", AckStatus::Answered)));
        let received = rx.recv().await.unwrap();
        assert_eq!(received.status, AckStatus::Answered);
    }

    #[tokio::test]
    async fn unknown_incident_is_reported() {
        let router = AckRouter::new();
        assert!(!router.deliver(ack("inc-x", AckStatus::Answered)));
    }

    #[tokio::test]
    async fn unregister_closes_routing() {
        let router = AckRouter::new();
        let incident = IncidentId::new("inc-1");
        let _rx = router.register(&incident);
        router.unregister(&incident);
        assert!(!router.deliver(ack("inc-1", AckStatus::Answered)));
    }

    #[test]
    fn ack_wire_format_flattens_status() {
        let a = ack("inc-1", AckStatus::Dtmf { key: "1".into() });
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["status"], "dtmf");
        assert_eq!(json["key"], "1");
    }
}
