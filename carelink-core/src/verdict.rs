use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of a pre- or post-guard check.
///
/// `Deny` always means no adapter dispatch. `Elevate` additionally opens an
/// elevation incident so a caregiver is notified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardVerdict {
    /// The decision.
    pub decision: GuardDecision,

    /// Why the guard decided this way (empty for a plain `Allow`).
    pub reasons: Vec<DenyReason>,

    /// Policy constraints the input ran into.
    pub constraints_violated: Vec<Constraint>,
}

impl GuardVerdict {
    /// A plain allow with no annotations.
    #[must_use]
    pub fn allow() -> Self {
        Self {
            decision: GuardDecision::Allow,
            reasons: Vec::new(),
            constraints_violated: Vec::new(),
        }
    }

    /// Allow, but require a second confirming utterance.
    #[must_use]
    pub fn allow_with_confirm(reason: DenyReason, constraint: Constraint) -> Self {
        Self {
            decision: GuardDecision::AllowWithConfirm,
            reasons: vec![reason],
            constraints_violated: vec![constraint],
        }
    }

    /// Deny with one reason.
    #[must_use]
    pub fn deny(reason: DenyReason, constraint: Constraint) -> Self {
        Self {
            decision: GuardDecision::Deny,
            reasons: vec![reason],
            constraints_violated: vec![constraint],
        }
    }

    /// Escalate to caregiver notification.
    #[must_use]
    pub fn elevate(reason: DenyReason) -> Self {
        Self {
            decision: GuardDecision::Elevate,
            reasons: vec![reason],
            constraints_violated: vec![Constraint::EmotionalState],
        }
    }

    /// Whether dispatch may proceed (possibly after confirmation).
    #[must_use]
    pub fn permits_dispatch(&self) -> bool {
        matches!(
            self.decision,
            GuardDecision::Allow | GuardDecision::AllowWithConfirm
        )
    }
}

/// The four guard decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardDecision {
    Allow,
    AllowWithConfirm,
    Deny,
    Elevate,
}

/// Machine-readable reason codes surfaced to the user and the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    BannedPhrase,
    InjectionPattern,
    TextTooLong,
    DeviceNotWhitelisted,
    ActionNotAllowed,
    HighRiskAction,
    GeofenceViolation,
    RateLimited,
    ElevatedStress,
    ContactUnknown,
    TargetUnknown,
}

impl DenyReason {
    /// Return the snake_case reason code.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BannedPhrase => "banned_phrase",
            Self::InjectionPattern => "injection_pattern",
            Self::TextTooLong => "text_too_long",
            Self::DeviceNotWhitelisted => "device_not_whitelisted",
            Self::ActionNotAllowed => "action_not_allowed",
            Self::HighRiskAction => "high_risk_action",
            Self::GeofenceViolation => "geofence_violation",
            Self::RateLimited => "rate_limited",
            Self::ElevatedStress => "elevated_stress",
            Self::ContactUnknown => "contact_unknown",
            Self::TargetUnknown => "target_unknown",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which policy constraint a guard check ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    TextPolicy,
    DeviceWhitelist,
    AllowedActions,
    RiskLevel,
    Geofence,
    RateLimit,
    EmotionalState,
    ContactLadder,
    MotionTargets,
}
