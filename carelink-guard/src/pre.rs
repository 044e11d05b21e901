use tracing::debug;

use carelink_core::{Constraint, DenyReason, GuardVerdict, Utterance};
use carelink_policy::PolicySnapshot;

/// Text-level guard, run before any classification or LLM call.
///
/// Rejects inputs policy forbids regardless of intent: over-long text,
/// banned phrases, and known prompt-injection patterns. Pure over its
/// inputs.
#[must_use]
pub fn pre_guard(utterance: &Utterance, policy: &PolicySnapshot) -> GuardVerdict {
    let text = utterance.text.as_str();

    if text.chars().count() > policy.guard.max_text_chars {
        debug!(utterance = %utterance.id, "pre-guard: text over length cap");
        return GuardVerdict::deny(DenyReason::TextTooLong, Constraint::TextPolicy);
    }

    let lowered = text.to_lowercase();
    if let Some(phrase) = policy
        .guard
        .banned_phrases
        .iter()
        .find(|p| lowered.contains(&p.to_lowercase()))
    {
        debug!(utterance = %utterance.id, phrase = %phrase, "pre-guard: banned phrase");
        return GuardVerdict::deny(DenyReason::BannedPhrase, Constraint::TextPolicy);
    }

    if let Some(pattern) = policy
        .guard
        .injection_patterns
        .iter()
        .find(|p| p.regex.is_match(text))
    {
        debug!(utterance = %utterance.id, rule = %pattern.name, "pre-guard: injection pattern");
        return GuardVerdict::deny(DenyReason::InjectionPattern, Constraint::TextPolicy);
    }

    GuardVerdict::allow()
}
