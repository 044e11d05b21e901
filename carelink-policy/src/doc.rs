//! On-disk policy document shapes.
//!
//! The policy file is a versioned YAML document. Parsing is strict
//! (`deny_unknown_fields` everywhere) so a typo in a field name fails the
//! load instead of silently disabling a rule. Semantic validation happens
//! when the document is compiled into a [`PolicySnapshot`](crate::PolicySnapshot).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use carelink_core::{Callee, Language};

/// The root policy document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyDoc {
    /// Monotonic policy version; bumped on every edit.
    pub version: u32,

    /// Wakeword phrases that open the attention window.
    #[serde(default)]
    pub wakewords: Vec<PatternDoc>,

    /// Attention window duration in seconds.
    #[serde(default = "default_attention_window_secs")]
    pub attention_window_secs: u64,

    /// SOS keyword sets, grouped by language and category.
    pub sos_sets: Vec<SosSetDoc>,

    /// Device fences: every device the system may ever touch.
    pub devices: BTreeMap<String, DeviceDoc>,

    /// Action phrase patterns for the smart-home direct tier.
    #[serde(default)]
    pub actions: BTreeMap<String, ActionDoc>,

    /// Assist-move verbs and targets.
    #[serde(default)]
    pub motion: MotionDoc,

    /// Call-family verbs.
    #[serde(default)]
    pub calling: CallingDoc,

    /// Emergency contacts, referenced by the ladder.
    pub contacts: Vec<ContactDoc>,

    /// The escalation ladder, in calling order.
    pub ladder: Vec<LadderRungDoc>,

    /// Geofence zones and zone constraints.
    #[serde(default)]
    pub geo: GeoDoc,

    /// Pre/post guard settings.
    #[serde(default)]
    pub guard: GuardDoc,

    /// Confirmation window settings.
    #[serde(default)]
    pub confirm: ConfirmDoc,

    /// Emergency fan-out settings.
    #[serde(default)]
    pub emergency: EmergencyDoc,

    /// Retry and backoff settings, versioned with the rest of policy.
    #[serde(default)]
    pub retries: RetriesDoc,

    /// Per-adapter concurrency caps.
    #[serde(default)]
    pub concurrency: ConcurrencyDoc,

    /// Stage deadline budgets.
    #[serde(default)]
    pub deadlines: DeadlinesDoc,
}

/// One language-tagged phrase pattern (a regular expression).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternDoc {
    pub language: Language,
    pub pattern: String,
}

/// One SOS keyword set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SosSetDoc {
    pub language: Language,
    /// One of: medical, fall, sos, security, distress.
    pub category: String,
    /// Severity 1..=4 assigned to matches from this set.
    pub severity: u8,
    /// Literal keywords; any substring hit fires the emergency tier.
    pub phrases: Vec<String>,
}

/// One whitelisted device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceDoc {
    /// Room the device lives in.
    pub room: String,
    /// Risk level 1..=4; at or above the confirm threshold the post-guard
    /// requires a second utterance.
    pub risk_level: u8,
    /// Actions policy allows on this device.
    pub allowed_actions: Vec<String>,
    /// Spoken-name patterns per language.
    #[serde(default)]
    pub aliases: Vec<PatternDoc>,
}

/// Phrase patterns for one smart-home action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionDoc {
    pub patterns: Vec<PatternDoc>,
}

/// Assist-move configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MotionDoc {
    /// Motion verb patterns ("take me", "扶我").
    #[serde(default)]
    pub verbs: Vec<PatternDoc>,
    /// Known targets and their spoken-name patterns.
    #[serde(default)]
    pub targets: BTreeMap<String, ActionDoc>,
}

/// Call-family tier configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CallingDoc {
    /// Call verb patterns ("call", "打给").
    #[serde(default)]
    pub verbs: Vec<PatternDoc>,
}

/// One emergency contact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContactDoc {
    pub id: String,
    pub name: String,
    pub role: Callee,
    pub phone: String,
    #[serde(default)]
    pub sms: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Spoken-name patterns for the call-family tier.
    #[serde(default)]
    pub aliases: Vec<PatternDoc>,
}

/// One rung on the escalation ladder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LadderRungDoc {
    /// Contact id; must exist in `contacts`.
    pub contact: String,
    /// How long to wait for this rung to pick up.
    #[serde(default = "default_ring_timeout_secs")]
    pub ring_timeout_secs: u64,
}

/// Geofence configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeoDoc {
    #[serde(default)]
    pub zones: Vec<ZoneDoc>,
    /// Zone constraints: actions denied while the user is in listed zones.
    #[serde(default)]
    pub constraints: Vec<GeoConstraintDoc>,
}

/// One geofence zone as a closed polygon of `[x, y]` points.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZoneDoc {
    pub id: String,
    pub polygon: Vec<[f64; 2]>,
}

/// One zone constraint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeoConstraintDoc {
    /// Smart-home action the constraint applies to (e.g. `unlock`).
    pub action: String,
    /// Zones in which the action is denied.
    pub denied_zones: Vec<String>,
}

/// Pre/post guard settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct GuardDoc {
    /// Literal phrases rejected regardless of intent.
    pub banned_phrases: Vec<String>,
    /// Known prompt-injection patterns (regular expressions).
    pub injection_patterns: Vec<String>,
    /// Hard cap on utterance length in characters.
    pub max_text_chars: usize,
    /// ASR confidence below which utterances are rejected.
    pub reject_confidence: f32,
    /// Stress score above which sensitive intents require confirmation.
    pub stress_threshold: f32,
    /// Stress score above which sensitive intents escalate to a caregiver.
    pub stress_elevate_threshold: f32,
    /// Device risk level at or above which a confirmation round is forced.
    pub risk_confirm_threshold: u8,
    /// Token-bucket limits per intent kind.
    pub rate_limits: BTreeMap<String, RateLimitDoc>,
}

impl Default for GuardDoc {
    fn default() -> Self {
        Self {
            banned_phrases: Vec::new(),
            injection_patterns: Vec::new(),
            max_text_chars: 400,
            reject_confidence: 0.3,
            stress_threshold: 0.7,
            stress_elevate_threshold: 0.9,
            risk_confirm_threshold: 3,
            rate_limits: BTreeMap::new(),
        }
    }
}

/// Token-bucket parameters for one intent kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitDoc {
    /// Bucket capacity.
    pub burst: u32,
    /// Refill rate per minute.
    pub per_minute: u32,
}

/// Confirmation window settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ConfirmDoc {
    /// Window duration in seconds.
    pub window_secs: u64,
    /// Confirming phrase patterns per language.
    pub phrases: Vec<PatternDoc>,
}

impl Default for ConfirmDoc {
    fn default() -> Self {
        Self {
            window_secs: 30,
            phrases: Vec::new(),
        }
    }
}

/// Emergency fan-out settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct EmergencyDoc {
    /// Window during which a resolved or exhausted incident suppresses
    /// re-opening for the same cause.
    pub quench_window_secs: u64,
    /// Devices and actions applied as the emergency scene.
    pub scene: Vec<SceneStepDoc>,
    /// Fraction of scene devices that must succeed for the scene to count
    /// as applied.
    pub scene_min_success_ratio: f64,
    /// Accept budget from classification to first outbound attempt.
    pub accept_budget_ms: u64,
    /// Cameras activated on the family uplink.
    pub cameras: Vec<String>,
}

impl Default for EmergencyDoc {
    fn default() -> Self {
        Self {
            quench_window_secs: 300,
            scene: Vec::new(),
            scene_min_success_ratio: 0.5,
            accept_budget_ms: 100,
            cameras: Vec::new(),
        }
    }
}

/// One emergency-scene step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SceneStepDoc {
    pub device: String,
    pub action: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Retry and backoff settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RetriesDoc {
    /// Per-adapter-kind retry parameters, keyed by kind tag.
    pub adapters: BTreeMap<String, RetryDoc>,
    /// Call-placement retries inside the escalation ladder.
    pub call_placement: CallPlacementRetryDoc,
}

impl Default for RetriesDoc {
    fn default() -> Self {
        Self {
            adapters: BTreeMap::new(),
            call_placement: CallPlacementRetryDoc::default(),
        }
    }
}

/// Exponential-backoff parameters for one adapter kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RetryDoc {
    pub max_retries: u32,
    pub base_ms: u64,
    pub max_ms: u64,
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryDoc {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_ms: 200,
            max_ms: 2_000,
            multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Retry parameters for call placement on the ladder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CallPlacementRetryDoc {
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl Default for CallPlacementRetryDoc {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_ms: 500,
        }
    }
}

/// Per-adapter concurrency caps and the shared queue bound.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ConcurrencyDoc {
    pub smart_home: usize,
    pub call: usize,
    pub notify: usize,
    pub tts: usize,
    pub video: usize,
    /// Waiting jobs allowed per lane before `AdapterBusy`.
    pub queue_bound: usize,
}

impl Default for ConcurrencyDoc {
    fn default() -> Self {
        Self {
            smart_home: 8,
            call: 1,
            notify: 16,
            tts: 1,
            video: 1,
            queue_bound: 32,
        }
    }
}

/// Stage deadline budgets in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DeadlinesDoc {
    pub utterance_ms: u64,
    pub emergency_accept_ms: u64,
    pub llm_ms: u64,
    pub rules_ms: u64,
}

impl Default for DeadlinesDoc {
    fn default() -> Self {
        Self {
            utterance_ms: 2_500,
            emergency_accept_ms: 100,
            llm_ms: 1_500,
            rules_ms: 30,
        }
    }
}

fn default_attention_window_secs() -> u64 {
    120
}

fn default_ring_timeout_secs() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_fields_are_rejected() {
        let yaml = r"
version: 1
sos_sets: []
devices: {}
contacts: []
ladder: []
no_such_field: true
";
        let err = serde_yaml_ng::from_str::<PolicyDoc>(yaml).unwrap_err();
        assert!(err.to_string().contains("no_such_field"));
    }

    #[test]
    fn defaults_fill_optional_sections() {
        let yaml = r"
version: 1
sos_sets: []
devices: {}
contacts: []
ladder: []
";
        let doc: PolicyDoc = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(doc.attention_window_secs, 120);
        assert_eq!(doc.guard.max_text_chars, 400);
        assert!((doc.guard.reject_confidence - 0.3).abs() < f32::EPSILON);
        assert_eq!(doc.confirm.window_secs, 30);
        assert_eq!(doc.emergency.quench_window_secs, 300);
        assert_eq!(doc.concurrency.smart_home, 8);
        assert_eq!(doc.deadlines.utterance_ms, 2_500);
    }

    #[test]
    fn retry_defaults() {
        let doc = RetryDoc::default();
        assert_eq!(doc.max_retries, 2);
        assert!(doc.jitter);
        let call = CallPlacementRetryDoc::default();
        assert_eq!(call.backoff_ms, 500);
    }
}
