//! The tiered rules engine.
//!
//! A pure function over (utterance, policy snapshot, session view): no I/O,
//! no clocks, no randomness. Tiers are evaluated in a fixed order and the
//! emergency tier short-circuits everything else. Within a tier the longest
//! match wins; an ambiguous smart-home match demotes to the LLM stage
//! instead of guessing a device.

use tracing::debug;

use carelink_core::{
    Classification, ClassificationKind, DeviceId, Intent, MoveSpeed, RejectReason, Utterance,
};
use carelink_policy::{CompiledPattern, DeviceFence, PolicySnapshot};
use carelink_session::SessionView;

/// Classify one utterance. Deterministic: the same inputs always produce
/// the same classification.
#[must_use]
pub fn classify(
    utterance: &Utterance,
    policy: &PolicySnapshot,
    _session: &SessionView,
) -> Classification {
    let text = utterance.text.as_str();

    // Tier 1: emergency. Any hit wins outright, ordered by category
    // priority then severity (the snapshot pre-sorts its sets). Sets of
    // every language are consulted so mixed-language utterances still fire.
    for set in &policy.sos {
        if let Some(phrase) = set.phrases.iter().find(|p| text.contains(p.as_str())) {
            debug!(category = %set.category, phrase = %phrase, "emergency tier hit");
            return Classification::new(
                ClassificationKind::Emergency {
                    category: set.category,
                    severity: set.severity,
                },
                utterance.asr_conf,
            )
            .with_rule(format!("sos.{}.{}", set.category, set.language));
        }
    }

    // Tier 2: wakeword. Annotates the classification (the orchestrator
    // refreshes the attention window) and keeps evaluating, so a combined
    // "wakeword + command" utterance still reaches the command tiers.
    let wakeword = match_longest(&policy.wakewords, text);

    // Tier 3: smart-home direct.
    if let Some(classification) = smart_home_tier(utterance, policy) {
        return annotate(classification, wakeword);
    }

    // Tier 4: assist-move direct.
    if let Some(classification) = assist_move_tier(utterance, policy) {
        return annotate(classification, wakeword);
    }

    // Tier 5: call-family direct.
    if let Some(classification) = call_tier(utterance, policy) {
        return annotate(classification, wakeword);
    }

    // A bare wakeword with nothing else is a greeting, not LLM work.
    if let Some((rule, len)) = &wakeword {
        if text.chars().count().saturating_sub(*len) < 2 {
            return Classification::new(
                ClassificationKind::DirectIntent {
                    intent: Intent::Chat {
                        style: carelink_core::ChatStyle::Cheerful,
                    },
                },
                utterance.asr_conf,
            )
            .with_rule(rule.clone())
            .with_attention();
        }
    }

    // Tier 6: fallback.
    let fallback = if utterance.asr_conf < policy.guard.reject_confidence {
        Classification::new(
            ClassificationKind::Reject {
                reason: RejectReason::LowConfidence,
            },
            utterance.asr_conf,
        )
        .with_rule("fallback.low_confidence")
    } else {
        Classification::new(ClassificationKind::RouteToLlm, utterance.asr_conf)
            .with_rule("fallback.route_to_llm")
    };
    annotate(fallback, wakeword)
}

/// Candidate produced by the smart-home tier before tie-breaking.
struct DeviceCandidate<'a> {
    fence: &'a DeviceFence,
    action: String,
    /// Length of the device-alias match, in chars.
    device_len: usize,
    /// Length of the action match, in chars.
    action_len: usize,
    rule: String,
}

fn smart_home_tier(utterance: &Utterance, policy: &PolicySnapshot) -> Option<Classification> {
    let text = utterance.text.as_str();
    let mut candidates: Vec<DeviceCandidate<'_>> = Vec::new();

    for fence in policy.devices.values() {
        let Some((_, device_len)) = match_longest(&fence.aliases, text) else {
            continue;
        };
        // Resolve the action among those policy allows on this device.
        let mut best_action: Option<(String, usize)> = None;
        for action in &fence.allowed_actions {
            let Some(patterns) = policy.actions.get(action) else {
                continue;
            };
            if let Some((_, len)) = match_longest(patterns, text) {
                if best_action.as_ref().is_none_or(|(_, best)| len > *best) {
                    best_action = Some((action.clone(), len));
                }
            }
        }
        let Some((action, action_len)) = best_action else {
            continue;
        };
        candidates.push(DeviceCandidate {
            rule: format!("smart_home.{}.{}", fence.id, action),
            fence,
            action,
            device_len,
            action_len,
        });
    }

    if candidates.is_empty() {
        return None;
    }

    // Longest device match wins; equal lengths tie-break on the action
    // match (device+action beats device alone in specificity).
    candidates.sort_by(|a, b| {
        (b.device_len, b.action_len).cmp(&(a.device_len, a.action_len))
    });
    let top = &candidates[0];
    let ambiguous = candidates.iter().skip(1).any(|c| {
        c.fence.id != top.fence.id
            && (c.device_len, c.action_len) == (top.device_len, top.action_len)
    });
    if ambiguous {
        debug!(device = %top.fence.id, "ambiguous device match, demoting to LLM");
        return Some(
            Classification::new(ClassificationKind::RouteToLlm, utterance.asr_conf)
                .with_rule("smart_home.ambiguous"),
        );
    }

    Some(
        Classification::new(
            ClassificationKind::DirectIntent {
                intent: Intent::SmartHome {
                    device: DeviceId::new(top.fence.id.as_str()),
                    action: top.action.clone(),
                    room: Some(top.fence.room.clone()),
                    confirm: false,
                },
            },
            utterance.asr_conf,
        )
        .with_rule(top.rule.clone()),
    )
}

fn assist_move_tier(utterance: &Utterance, policy: &PolicySnapshot) -> Option<Classification> {
    let text = utterance.text.as_str();
    match_longest(&policy.motion_verbs, text)?;

    let mut best: Option<(&str, usize)> = None;
    for (target, patterns) in &policy.motion_targets {
        if let Some((_, len)) = match_longest(patterns, text) {
            if best.is_none_or(|(_, b)| len > b) {
                best = Some((target, len));
            }
        }
    }
    let (target, _) = best?;

    Some(
        Classification::new(
            ClassificationKind::DirectIntent {
                intent: Intent::AssistMove {
                    target: target.to_owned(),
                    speed: MoveSpeed::Normal,
                    confirm: false,
                },
            },
            utterance.asr_conf,
        )
        .with_rule(format!("assist_move.{target}")),
    )
}

fn call_tier(utterance: &Utterance, policy: &PolicySnapshot) -> Option<Classification> {
    let text = utterance.text.as_str();
    match_longest(&policy.call_verbs, text)?;

    let mut best: Option<(&carelink_core::ContactId, usize)> = None;
    for (contact, pattern) in &policy.contact_aliases {
        if let Some(m) = pattern.regex.find(text) {
            let len = m.as_str().chars().count();
            if best.is_none_or(|(_, b)| len > b) {
                best = Some((contact, len));
            }
        }
    }
    let (contact_id, _) = best?;
    let contact = policy.contacts.get(contact_id)?;

    Some(
        Classification::new(
            ClassificationKind::DirectIntent {
                intent: Intent::Call {
                    callee: contact.role,
                    reason: None,
                    confirm: false,
                },
            },
            utterance.asr_conf,
        )
        .with_rule(format!("call.{contact_id}")),
    )
}

/// Longest regex match across a pattern list, as (rule name, match chars).
fn match_longest(patterns: &[CompiledPattern], text: &str) -> Option<(String, usize)> {
    patterns
        .iter()
        .filter_map(|p| {
            p.regex
                .find(text)
                .map(|m| (p.name.clone(), m.as_str().chars().count()))
        })
        .max_by_key(|(_, len)| *len)
}

fn annotate(classification: Classification, wakeword: Option<(String, usize)>) -> Classification {
    match wakeword {
        Some((rule, _)) => classification.with_rule(rule).with_attention(),
        None => classification,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carelink_core::{Callee, EmergencyCategory, Language, SessionId};
    use carelink_policy::testing::sample_snapshot;
    use carelink_session::SessionContext;

    fn view() -> SessionView {
        SessionContext::new(SessionId::new("s-1")).view(chrono::Utc::now())
    }

    fn utt(text: &str, language: Language, conf: f32) -> Utterance {
        Utterance::new("u-1", "s-1", text, language, conf)
    }

    #[test]
    fn emergency_beats_everything() {
        let policy = sample_snapshot();
        let c = classify(&utt("救命 我不舒服", Language::Zh, 0.92), &policy, &view());
        match c.kind {
            ClassificationKind::Emergency { category, severity } => {
                assert_eq!(category, EmergencyCategory::Medical);
                assert_eq!(severity.level(), 4);
            }
            other => panic!("expected Emergency, got {other:?}"),
        }
        assert_eq!(c.matched_rules, vec!["sos.medical.zh"]);
    }

    #[test]
    fn emergency_keyword_inside_long_sentence() {
        let policy = sample_snapshot();
        let text = "我刚才在阳台浇花的时候突然觉得很不舒服你能不能帮帮我";
        let c = classify(&utt(text, Language::Zh, 0.88), &policy, &view());
        assert!(matches!(c.kind, ClassificationKind::Emergency { .. }));
    }

    #[test]
    fn mixed_language_emergency_still_fires() {
        let policy = sample_snapshot();
        // English keywords inside an utterance tagged zh.
        let c = classify(
            &utt("刚才 i fell 在厨房", Language::Zh, 0.8),
            &policy,
            &view(),
        );
        match c.kind {
            ClassificationKind::Emergency { category, .. } => {
                assert_eq!(category, EmergencyCategory::Fall);
            }
            other => panic!("expected Emergency, got {other:?}"),
        }
    }

    #[test]
    fn emergency_ignores_low_confidence() {
        let policy = sample_snapshot();
        let c = classify(&utt("救命", Language::Zh, 0.1), &policy, &view());
        assert!(matches!(c.kind, ClassificationKind::Emergency { .. }));
    }

    #[test]
    fn smart_home_direct_brighten() {
        let policy = sample_snapshot();
        let c = classify(&utt("把客厅的灯调亮一点", Language::Zh, 0.95), &policy, &view());
        match c.kind {
            ClassificationKind::DirectIntent {
                intent: Intent::SmartHome { device, action, room, confirm },
            } => {
                assert_eq!(device.as_str(), "living_room_light");
                assert_eq!(action, "brighten");
                assert_eq!(room.as_deref(), Some("living_room"));
                assert!(!confirm);
            }
            other => panic!("expected SmartHome, got {other:?}"),
        }
    }

    #[test]
    fn ambiguous_device_demotes_to_llm() {
        let policy = sample_snapshot();
        // "灯" alone matches neither alias ("客厅的?灯" / "卧室的?灯" need the
        // room word), so this routes to the LLM rather than guessing.
        let c = classify(&utt("开灯", Language::Zh, 0.9), &policy, &view());
        assert!(matches!(c.kind, ClassificationKind::RouteToLlm));
    }

    #[test]
    fn unlock_door_resolves_high_risk_device() {
        let policy = sample_snapshot();
        let c = classify(&utt("打开大门", Language::Zh, 0.9), &policy, &view());
        match c.kind {
            ClassificationKind::DirectIntent {
                intent: Intent::SmartHome { device, action, .. },
            } => {
                assert_eq!(device.as_str(), "front_door_lock");
                assert_eq!(action, "unlock");
            }
            other => panic!("expected SmartHome unlock, got {other:?}"),
        }
    }

    #[test]
    fn assist_move_direct() {
        let policy = sample_snapshot();
        let c = classify(&utt("扶我去卧室", Language::Zh, 0.9), &policy, &view());
        match c.kind {
            ClassificationKind::DirectIntent {
                intent: Intent::AssistMove { target, speed, .. },
            } => {
                assert_eq!(target, "bedroom");
                assert_eq!(speed, MoveSpeed::Normal);
            }
            other => panic!("expected AssistMove, got {other:?}"),
        }
    }

    #[test]
    fn call_family_direct() {
        let policy = sample_snapshot();
        let c = classify(&utt("打电话给女儿", Language::Zh, 0.9), &policy, &view());
        match c.kind {
            ClassificationKind::DirectIntent {
                intent: Intent::Call { callee, confirm, .. },
            } => {
                assert_eq!(callee, Callee::Family);
                assert!(!confirm);
            }
            other => panic!("expected Call, got {other:?}"),
        }
        assert_eq!(c.matched_rules, vec!["call.daughter"]);
    }

    #[test]
    fn wakeword_refreshes_attention_and_continues() {
        let policy = sample_snapshot();
        let c = classify(
            &utt("小陪 把客厅的灯调亮一点", Language::Zh, 0.95),
            &policy,
            &view(),
        );
        assert!(c.refresh_attention);
        assert!(matches!(
            c.kind,
            ClassificationKind::DirectIntent {
                intent: Intent::SmartHome { .. }
            }
        ));
    }

    #[test]
    fn bare_wakeword_is_greeting() {
        let policy = sample_snapshot();
        let c = classify(&utt("小陪", Language::Zh, 0.95), &policy, &view());
        assert!(c.refresh_attention);
        assert!(matches!(
            c.kind,
            ClassificationKind::DirectIntent {
                intent: Intent::Chat { .. }
            }
        ));
    }

    #[test]
    fn low_confidence_rejected() {
        let policy = sample_snapshot();
        let c = classify(&utt("呜呜呜啊", Language::Zh, 0.2), &policy, &view());
        assert!(matches!(
            c.kind,
            ClassificationKind::Reject {
                reason: RejectReason::LowConfidence
            }
        ));
    }

    #[test]
    fn unmatched_text_routes_to_llm() {
        let policy = sample_snapshot();
        let c = classify(&utt("今天讲个笑话", Language::Zh, 0.9), &policy, &view());
        assert!(matches!(c.kind, ClassificationKind::RouteToLlm));
    }

    #[test]
    fn classification_is_deterministic() {
        let policy = sample_snapshot();
        let u = utt("把客厅的灯调亮一点", Language::Zh, 0.95);
        let a = classify(&u, &policy, &view());
        let b = classify(&u, &policy, &view());
        assert_eq!(a, b);
    }
}
