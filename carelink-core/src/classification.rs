use serde::{Deserialize, Serialize};

use crate::intent::Intent;
use crate::types::{EmergencyCategory, Severity};
use crate::verdict::DenyReason;

/// Output of the rules engine for one utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// The routing decision.
    pub kind: ClassificationKind,

    /// Names of the rules that fired, in evaluation order.
    pub matched_rules: Vec<String>,

    /// Confidence carried forward from ASR (direct tiers are themselves
    /// deterministic, so this is the only uncertainty in the decision).
    pub confidence: f32,

    /// Whether the utterance opens or refreshes the attention window
    /// (wakeword tier).
    pub refresh_attention: bool,
}

impl Classification {
    /// Build a classification with no matched rules.
    #[must_use]
    pub fn new(kind: ClassificationKind, confidence: f32) -> Self {
        Self {
            kind,
            matched_rules: Vec::new(),
            confidence,
            refresh_attention: false,
        }
    }

    /// Record a fired rule name.
    #[must_use]
    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.matched_rules.push(rule.into());
        self
    }

    /// Mark the attention window as opened or refreshed.
    #[must_use]
    pub fn with_attention(mut self) -> Self {
        self.refresh_attention = true;
        self
    }
}

/// The routing decision for one utterance. Emergency always wins; within a
/// non-emergency tier the first (longest, most specific) match wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassificationKind {
    /// Bypass everything and open an incident.
    Emergency {
        category: EmergencyCategory,
        severity: Severity,
    },
    /// A rule tier resolved a full typed intent; skip the LLM.
    DirectIntent { intent: Intent },
    /// No tier matched; hand the text to the intent client.
    RouteToLlm,
    /// Drop the utterance without dispatch.
    Reject { reason: RejectReason },
}

/// Why an utterance was rejected before any dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// ASR confidence below the policy threshold.
    LowConfidence,
    /// The pre-guard denied the raw text.
    Policy { deny: DenyReason },
}
