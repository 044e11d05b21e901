//! The compiled, immutable policy snapshot.
//!
//! A snapshot is built from a [`PolicyDoc`] in one validating pass: every
//! regex is compiled, every cross-reference resolved, every threshold
//! range-checked. Components share the snapshot behind an `Arc` for the
//! duration of an utterance, so a reload can never tear state mid-pipeline.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

use regex::Regex;

use carelink_core::{
    Callee, ContactId, ContactPoint, DeviceId, EmergencyCategory, IntentKind, Language, SceneStep,
    Severity, ZoneId, payload_hash,
};

use crate::doc::{PatternDoc, PolicyDoc, RetryDoc};
use crate::error::PolicyError;
use crate::geo::{Point, Zone};

/// A compiled phrase pattern with the rule name it reports when it fires.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub name: String,
    pub language: Language,
    pub regex: Regex,
}

impl CompiledPattern {
    fn compile(name: String, doc: &PatternDoc) -> Result<Self, PolicyError> {
        let regex = Regex::new(&doc.pattern).map_err(|e| PolicyError::InvalidRegex {
            context: name.clone(),
            error: e.to_string(),
        })?;
        Ok(Self {
            name,
            language: doc.language,
            regex,
        })
    }
}

/// One SOS keyword set, pre-sorted into tier-evaluation order.
#[derive(Debug, Clone)]
pub struct SosSet {
    pub language: Language,
    pub category: EmergencyCategory,
    pub severity: Severity,
    pub phrases: Vec<String>,
}

/// One whitelisted device with its compiled aliases.
#[derive(Debug, Clone)]
pub struct DeviceFence {
    pub id: DeviceId,
    pub room: String,
    pub risk_level: u8,
    pub allowed_actions: Vec<String>,
    pub aliases: Vec<CompiledPattern>,
}

impl DeviceFence {
    /// Whether policy allows this action on this device.
    #[must_use]
    pub fn allows(&self, action: &str) -> bool {
        self.allowed_actions.iter().any(|a| a == action)
    }
}

/// One rung on the compiled escalation ladder.
#[derive(Debug, Clone)]
pub struct LadderRung {
    pub contact: ContactPoint,
    pub ring_timeout: Duration,
}

/// Guard thresholds and compiled text checks.
#[derive(Debug, Clone)]
pub struct GuardPolicy {
    pub banned_phrases: Vec<String>,
    pub injection_patterns: Vec<CompiledPattern>,
    pub max_text_chars: usize,
    pub reject_confidence: f32,
    pub stress_threshold: f32,
    pub stress_elevate_threshold: f32,
    pub risk_confirm_threshold: u8,
    pub rate_limits: HashMap<IntentKind, RateLimitParams>,
}

/// Token-bucket parameters for one intent kind.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitParams {
    pub burst: u32,
    pub per_minute: u32,
}

/// Confirmation window settings with compiled confirm phrases.
#[derive(Debug, Clone)]
pub struct ConfirmPolicy {
    pub window: Duration,
    pub phrases: Vec<CompiledPattern>,
}

impl ConfirmPolicy {
    /// Whether the text is a confirming phrase in the given language.
    #[must_use]
    pub fn matches(&self, text: &str, language: Language) -> bool {
        self.phrases
            .iter()
            .any(|p| p.language == language && p.regex.is_match(text))
    }
}

/// Emergency fan-out settings.
#[derive(Debug, Clone)]
pub struct EmergencyPolicy {
    pub quench_window: Duration,
    pub scene: Vec<SceneStep>,
    pub scene_min_success_ratio: f64,
    pub accept_budget: Duration,
    pub cameras: Vec<String>,
}

/// Backoff parameters consumed by the dispatch layer.
#[derive(Debug, Clone, Copy)]
pub struct RetryParams {
    pub max_retries: u32,
    pub base: Duration,
    pub max: Duration,
    pub multiplier: f64,
    pub jitter: bool,
}

impl From<&RetryDoc> for RetryParams {
    fn from(doc: &RetryDoc) -> Self {
        Self {
            max_retries: doc.max_retries,
            base: Duration::from_millis(doc.base_ms),
            max: Duration::from_millis(doc.max_ms),
            multiplier: doc.multiplier,
            jitter: doc.jitter,
        }
    }
}

/// Per-adapter concurrency caps.
#[derive(Debug, Clone, Copy)]
pub struct ConcurrencyCaps {
    pub smart_home: usize,
    pub call: usize,
    pub notify: usize,
    pub tts: usize,
    pub video: usize,
    pub queue_bound: usize,
}

/// Stage deadline budgets.
#[derive(Debug, Clone, Copy)]
pub struct Deadlines {
    pub utterance: Duration,
    pub emergency_accept: Duration,
    pub llm: Duration,
    pub rules: Duration,
}

/// The immutable policy snapshot shared read-only for its epoch.
#[derive(Debug, Clone)]
pub struct PolicySnapshot {
    pub version: u32,
    pub wakewords: Vec<CompiledPattern>,
    pub attention_window: Duration,
    pub sos: Vec<SosSet>,
    pub devices: BTreeMap<DeviceId, DeviceFence>,
    pub actions: BTreeMap<String, Vec<CompiledPattern>>,
    pub motion_verbs: Vec<CompiledPattern>,
    pub motion_targets: BTreeMap<String, Vec<CompiledPattern>>,
    pub call_verbs: Vec<CompiledPattern>,
    pub contact_aliases: Vec<(ContactId, CompiledPattern)>,
    pub contacts: BTreeMap<ContactId, ContactPoint>,
    pub ladder: Vec<LadderRung>,
    pub zones: Vec<Zone>,
    pub geo_constraints: BTreeMap<String, Vec<ZoneId>>,
    pub guard: GuardPolicy,
    pub confirm: ConfirmPolicy,
    pub emergency: EmergencyPolicy,
    pub adapter_retries: HashMap<String, RetryParams>,
    pub call_placement_retries: u32,
    pub call_placement_backoff: Duration,
    pub concurrency: ConcurrencyCaps,
    pub deadlines: Deadlines,
    /// Fingerprint over the device/action/target vocabulary; sent with every
    /// LLM request so replays can reproduce classifications.
    pub vocabulary_hash: String,
}

impl PolicySnapshot {
    /// Read, parse, and compile a policy file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let raw = std::fs::read_to_string(path)?;
        let doc: PolicyDoc =
            serde_yaml_ng::from_str(&raw).map_err(|e| PolicyError::Parse(e.to_string()))?;
        Self::from_doc(&doc)
    }

    /// Compile a parsed document into a snapshot, validating everything.
    pub fn from_doc(doc: &PolicyDoc) -> Result<Self, PolicyError> {
        let wakewords = doc
            .wakewords
            .iter()
            .enumerate()
            .map(|(i, p)| CompiledPattern::compile(format!("wakeword.{i}"), p))
            .collect::<Result<Vec<_>, _>>()?;

        let sos = compile_sos(doc)?;
        let devices = compile_devices(doc)?;
        let actions = compile_patterns_map(&doc.actions, "action")?;
        let motion_targets = compile_patterns_map(&doc.motion.targets, "motion.target")?;

        let motion_verbs = doc
            .motion
            .verbs
            .iter()
            .enumerate()
            .map(|(i, p)| CompiledPattern::compile(format!("motion.verb.{i}"), p))
            .collect::<Result<Vec<_>, _>>()?;

        let call_verbs = doc
            .calling
            .verbs
            .iter()
            .enumerate()
            .map(|(i, p)| CompiledPattern::compile(format!("call.verb.{i}"), p))
            .collect::<Result<Vec<_>, _>>()?;

        let (contacts, contact_aliases) = compile_contacts(doc)?;
        let ladder = compile_ladder(doc, &contacts)?;
        let (zones, geo_constraints) = compile_geo(doc)?;
        let guard = compile_guard(doc)?;

        let confirm = ConfirmPolicy {
            window: Duration::from_secs(doc.confirm.window_secs),
            phrases: doc
                .confirm
                .phrases
                .iter()
                .enumerate()
                .map(|(i, p)| CompiledPattern::compile(format!("confirm.{i}"), p))
                .collect::<Result<Vec<_>, _>>()?,
        };

        let emergency = compile_emergency(doc, &devices)?;

        let mut adapter_retries: HashMap<String, RetryParams> = doc
            .retries
            .adapters
            .iter()
            .map(|(kind, retry)| (kind.clone(), RetryParams::from(retry)))
            .collect();
        // Call placement has its own contract: constant backoff, no jitter,
        // bounded by the ladder's placement retry count.
        adapter_retries.entry("call".into()).or_insert(RetryParams {
            max_retries: doc.retries.call_placement.max_retries,
            base: Duration::from_millis(doc.retries.call_placement.backoff_ms),
            max: Duration::from_millis(doc.retries.call_placement.backoff_ms),
            multiplier: 1.0,
            jitter: false,
        });

        let vocabulary_hash = vocabulary_hash(doc);

        Ok(Self {
            version: doc.version,
            wakewords,
            attention_window: Duration::from_secs(doc.attention_window_secs),
            sos,
            devices,
            actions,
            motion_verbs,
            motion_targets,
            call_verbs,
            contact_aliases,
            contacts,
            ladder,
            zones,
            geo_constraints,
            guard,
            confirm,
            emergency,
            adapter_retries,
            call_placement_retries: doc.retries.call_placement.max_retries,
            call_placement_backoff: Duration::from_millis(doc.retries.call_placement.backoff_ms),
            concurrency: ConcurrencyCaps {
                smart_home: doc.concurrency.smart_home,
                call: doc.concurrency.call,
                notify: doc.concurrency.notify,
                tts: doc.concurrency.tts,
                video: doc.concurrency.video,
                queue_bound: doc.concurrency.queue_bound,
            },
            deadlines: Deadlines {
                utterance: Duration::from_millis(doc.deadlines.utterance_ms),
                emergency_accept: Duration::from_millis(doc.deadlines.emergency_accept_ms),
                llm: Duration::from_millis(doc.deadlines.llm_ms),
                rules: Duration::from_millis(doc.deadlines.rules_ms),
            },
            vocabulary_hash,
        })
    }

    /// Look up a device fence.
    #[must_use]
    pub fn device(&self, id: &DeviceId) -> Option<&DeviceFence> {
        self.devices.get(id)
    }

    /// Zones in which the given action is denied.
    #[must_use]
    pub fn denied_zones(&self, action: &str) -> &[ZoneId] {
        self.geo_constraints
            .get(action)
            .map_or(&[], Vec::as_slice)
    }

    /// The retry parameters for one adapter kind tag, or the default.
    #[must_use]
    pub fn retry_params(&self, kind: &str) -> RetryParams {
        self.adapter_retries
            .get(kind)
            .copied()
            .unwrap_or_else(|| RetryParams::from(&RetryDoc::default()))
    }

    /// First ladder contact filling the given role.
    #[must_use]
    pub fn contact_for_role(&self, role: Callee) -> Option<&ContactPoint> {
        self.ladder
            .iter()
            .map(|r| &r.contact)
            .find(|c| c.role == role)
    }
}

fn compile_sos(doc: &PolicyDoc) -> Result<Vec<SosSet>, PolicyError> {
    let mut sets = Vec::with_capacity(doc.sos_sets.len());
    for set in &doc.sos_sets {
        let category = match set.category.as_str() {
            "medical" => EmergencyCategory::Medical,
            "fall" => EmergencyCategory::Fall,
            "sos" => EmergencyCategory::Sos,
            "security" => EmergencyCategory::Security,
            "distress" => EmergencyCategory::Distress,
            other => return Err(PolicyError::UnknownCategory(other.to_owned())),
        };
        let severity =
            Severity::new(set.severity).ok_or(PolicyError::InvalidSeverity(set.severity))?;
        sets.push(SosSet {
            language: set.language,
            category,
            severity,
            phrases: set.phrases.clone(),
        });
    }
    // Tier order: category priority first, then severity descending.
    sets.sort_by_key(|s| {
        let rank = EmergencyCategory::MATCH_ORDER
            .iter()
            .position(|c| *c == s.category)
            .unwrap_or(usize::MAX);
        (rank, std::cmp::Reverse(s.severity))
    });
    Ok(sets)
}

fn compile_devices(doc: &PolicyDoc) -> Result<BTreeMap<DeviceId, DeviceFence>, PolicyError> {
    let mut devices = BTreeMap::new();
    for (id, dev) in &doc.devices {
        if !(1..=4).contains(&dev.risk_level) {
            return Err(PolicyError::InvalidRiskLevel {
                device: id.clone(),
                level: dev.risk_level,
            });
        }
        let aliases = dev
            .aliases
            .iter()
            .enumerate()
            .map(|(i, p)| CompiledPattern::compile(format!("device.{id}.{i}"), p))
            .collect::<Result<Vec<_>, _>>()?;
        devices.insert(
            DeviceId::new(id.clone()),
            DeviceFence {
                id: DeviceId::new(id.clone()),
                room: dev.room.clone(),
                risk_level: dev.risk_level,
                allowed_actions: dev.allowed_actions.clone(),
                aliases,
            },
        );
    }
    Ok(devices)
}

fn compile_patterns_map(
    map: &BTreeMap<String, crate::doc::ActionDoc>,
    prefix: &str,
) -> Result<BTreeMap<String, Vec<CompiledPattern>>, PolicyError> {
    map.iter()
        .map(|(name, action)| {
            let patterns = action
                .patterns
                .iter()
                .enumerate()
                .map(|(i, p)| CompiledPattern::compile(format!("{prefix}.{name}.{i}"), p))
                .collect::<Result<Vec<_>, _>>()?;
            Ok((name.clone(), patterns))
        })
        .collect()
}

#[allow(clippy::type_complexity)]
fn compile_contacts(
    doc: &PolicyDoc,
) -> Result<
    (
        BTreeMap<ContactId, ContactPoint>,
        Vec<(ContactId, CompiledPattern)>,
    ),
    PolicyError,
> {
    let mut contacts = BTreeMap::new();
    let mut aliases = Vec::new();
    for c in &doc.contacts {
        let id = ContactId::new(c.id.clone());
        for (i, p) in c.aliases.iter().enumerate() {
            aliases.push((
                id.clone(),
                CompiledPattern::compile(format!("contact.{}.{i}", c.id), p)?,
            ));
        }
        contacts.insert(
            id.clone(),
            ContactPoint {
                id,
                name: c.name.clone(),
                role: c.role,
                phone: c.phone.clone(),
                sms: c.sms.clone(),
                email: c.email.clone(),
            },
        );
    }
    Ok((contacts, aliases))
}

fn compile_ladder(
    doc: &PolicyDoc,
    contacts: &BTreeMap<ContactId, ContactPoint>,
) -> Result<Vec<LadderRung>, PolicyError> {
    if doc.ladder.is_empty() {
        return Err(PolicyError::EmptyLadder);
    }
    doc.ladder
        .iter()
        .map(|rung| {
            let contact = contacts
                .get(&ContactId::new(rung.contact.clone()))
                .cloned()
                .ok_or_else(|| PolicyError::UnknownContact(rung.contact.clone()))?;
            Ok(LadderRung {
                contact,
                ring_timeout: Duration::from_secs(rung.ring_timeout_secs),
            })
        })
        .collect()
}

#[allow(clippy::type_complexity)]
fn compile_geo(
    doc: &PolicyDoc,
) -> Result<(Vec<Zone>, BTreeMap<String, Vec<ZoneId>>), PolicyError> {
    let mut zones = Vec::with_capacity(doc.geo.zones.len());
    for z in &doc.geo.zones {
        if z.polygon.len() < 3 {
            return Err(PolicyError::DegeneratePolygon(z.id.clone()));
        }
        zones.push(Zone {
            id: ZoneId::new(z.id.clone()),
            polygon: z.polygon.iter().map(|[x, y]| Point::new(*x, *y)).collect(),
        });
    }

    let mut constraints = BTreeMap::new();
    for c in &doc.geo.constraints {
        let mut denied = Vec::with_capacity(c.denied_zones.len());
        for zone in &c.denied_zones {
            if !zones.iter().any(|z| z.id.as_str() == zone) {
                return Err(PolicyError::UnknownZone {
                    action: c.action.clone(),
                    zone: zone.clone(),
                });
            }
            denied.push(ZoneId::new(zone.clone()));
        }
        constraints.insert(c.action.clone(), denied);
    }
    Ok((zones, constraints))
}

fn compile_guard(doc: &PolicyDoc) -> Result<GuardPolicy, PolicyError> {
    for (name, value) in [
        ("reject_confidence", doc.guard.reject_confidence),
        ("stress_threshold", doc.guard.stress_threshold),
        (
            "stress_elevate_threshold",
            doc.guard.stress_elevate_threshold,
        ),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(PolicyError::InvalidThreshold { name, value });
        }
    }

    let injection_patterns = doc
        .guard
        .injection_patterns
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let pattern = PatternDoc {
                language: Language::En,
                pattern: p.clone(),
            };
            CompiledPattern::compile(format!("guard.injection.{i}"), &pattern)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut rate_limits = HashMap::new();
    for (kind_tag, limit) in &doc.guard.rate_limits {
        if limit.burst == 0 {
            return Err(PolicyError::InvalidRateLimit(kind_tag.clone()));
        }
        let kind = match kind_tag.as_str() {
            "smart_home" => IntentKind::SmartHome,
            "assist_move" => IntentKind::AssistMove,
            "call" => IntentKind::Call,
            "chat" => IntentKind::Chat,
            other => return Err(PolicyError::UnknownCategory(other.to_owned())),
        };
        rate_limits.insert(
            kind,
            RateLimitParams {
                burst: limit.burst,
                per_minute: limit.per_minute,
            },
        );
    }

    Ok(GuardPolicy {
        banned_phrases: doc.guard.banned_phrases.clone(),
        injection_patterns,
        max_text_chars: doc.guard.max_text_chars,
        reject_confidence: doc.guard.reject_confidence,
        stress_threshold: doc.guard.stress_threshold,
        stress_elevate_threshold: doc.guard.stress_elevate_threshold,
        risk_confirm_threshold: doc.guard.risk_confirm_threshold,
        rate_limits,
    })
}

fn compile_emergency(
    doc: &PolicyDoc,
    devices: &BTreeMap<DeviceId, DeviceFence>,
) -> Result<EmergencyPolicy, PolicyError> {
    let ratio = doc.emergency.scene_min_success_ratio;
    if !(0.0..=1.0).contains(&ratio) {
        return Err(PolicyError::InvalidRatio(ratio));
    }
    let mut scene = Vec::with_capacity(doc.emergency.scene.len());
    for step in &doc.emergency.scene {
        let device = DeviceId::new(step.device.clone());
        if !devices.contains_key(&device) {
            return Err(PolicyError::UnknownSceneDevice(step.device.clone()));
        }
        scene.push(SceneStep {
            device,
            action: step.action.clone(),
            params: step.params.clone(),
        });
    }
    Ok(EmergencyPolicy {
        quench_window: Duration::from_secs(doc.emergency.quench_window_secs),
        scene,
        scene_min_success_ratio: ratio,
        accept_budget: Duration::from_millis(doc.emergency.accept_budget_ms),
        cameras: doc.emergency.cameras.clone(),
    })
}

fn vocabulary_hash(doc: &PolicyDoc) -> String {
    let vocab = serde_json::json!({
        "devices": doc.devices.keys().collect::<Vec<_>>(),
        "actions": doc.actions.keys().collect::<Vec<_>>(),
        "rooms": doc.devices.values().map(|d| &d.room).collect::<Vec<_>>(),
        "targets": doc.motion.targets.keys().collect::<Vec<_>>(),
    });
    payload_hash(&vocab)
}
