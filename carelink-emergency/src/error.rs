use thiserror::Error;

use crate::incident::IncidentState;

/// Errors raised by the emergency dispatcher.
#[derive(Debug, Error)]
pub enum EmergencyError {
    /// A state transition that the escalation machine forbids.
    #[error("illegal incident transition {from:?} -> {to:?}")]
    IllegalTransition {
        from: IncidentState,
        to: IncidentState,
    },

    /// The escalation ladder in policy is empty.
    #[error("policy has no escalation ladder")]
    NoLadder,
}
