use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use carelink_core::{ContactId, EmergencyCategory, IncidentId, SessionId, Severity};

use crate::error::EmergencyError;

/// Where an incident is in its lifecycle.
///
/// The rung index never regresses: `Failed(i)` can only advance to
/// `Calling(i+1)`, and the terminal states accept no further transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum IncidentState {
    /// Just opened; fan-out starting.
    Open,
    /// Placing a call to ladder rung `rung`.
    Calling { rung: usize },
    /// Call placed; waiting for the callee to acknowledge.
    Waiting { rung: usize },
    /// The callee acknowledged.
    Reached { rung: usize },
    /// This rung failed (placement failure, decline, or ring timeout).
    Failed { rung: usize },
    /// A human acknowledged; the incident is closed.
    Resolved,
    /// Every rung failed. Video and notifications stay active.
    Exhausted,
}

impl IncidentState {
    /// The ladder rung this state refers to, when any.
    #[must_use]
    pub fn rung(&self) -> Option<usize> {
        match self {
            Self::Calling { rung }
            | Self::Waiting { rung }
            | Self::Reached { rung }
            | Self::Failed { rung } => Some(*rung),
            Self::Open | Self::Resolved | Self::Exhausted => None,
        }
    }

    /// Whether no further transitions are accepted.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Exhausted)
    }

    fn allows(self, next: Self) -> bool {
        match (self, next) {
            (Self::Open, Self::Calling { rung: 0 }) => true,
            (Self::Calling { rung: a }, Self::Waiting { rung: b } | Self::Failed { rung: b }) => {
                a == b
            }
            (Self::Waiting { rung: a }, Self::Reached { rung: b } | Self::Failed { rung: b }) => {
                a == b
            }
            (Self::Failed { rung: a }, Self::Calling { rung: b }) => b == a + 1,
            (Self::Reached { .. }, Self::Resolved) => true,
            (Self::Calling { .. } | Self::Failed { .. }, Self::Exhausted) => true,
            _ => false,
        }
    }
}

/// One live emergency with its escalation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    /// Unique incident identifier.
    pub id: IncidentId,
    /// Session the emergency belongs to.
    pub session: SessionId,
    /// Emergency category.
    pub category: EmergencyCategory,
    /// Severity 1..=4.
    pub severity: Severity,
    /// When the incident was opened.
    pub opened_at: DateTime<Utc>,
    /// Current state.
    pub state: IncidentState,
    /// Contacts we attempted, in ladder order.
    pub contacts_attempted: Vec<ContactId>,
    /// Contacts that acknowledged.
    pub contacts_reached: Vec<ContactId>,
    /// When the incident reached a terminal state.
    pub closed_at: Option<DateTime<Utc>>,
}

impl Incident {
    /// Open a new incident with a fresh id.
    #[must_use]
    pub fn open(session: SessionId, category: EmergencyCategory, severity: Severity) -> Self {
        Self {
            id: IncidentId::new(format!("inc-{}", Uuid::new_v4())),
            session,
            category,
            severity,
            opened_at: Utc::now(),
            state: IncidentState::Open,
            contacts_attempted: Vec::new(),
            contacts_reached: Vec::new(),
            closed_at: None,
        }
    }

    /// Advance the state machine, rejecting illegal transitions.
    pub fn advance(&mut self, next: IncidentState) -> Result<(), EmergencyError> {
        if !self.state.allows(next) {
            return Err(EmergencyError::IllegalTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        if next.is_terminal() {
            self.closed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Record a placement attempt against a contact.
    pub fn record_attempt(&mut self, contact: ContactId) {
        self.contacts_attempted.push(contact);
    }

    /// Record an acknowledgement from a contact.
    pub fn record_reached(&mut self, contact: ContactId) {
        self.contacts_reached.push(contact);
    }
}
