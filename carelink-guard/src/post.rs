use tracing::debug;

use carelink_core::{Constraint, DenyReason, GuardVerdict, Intent, IntentKind};
use carelink_policy::PolicySnapshot;
use carelink_session::SessionView;

use crate::ratelimit::RateLimiter;

/// Intent-level guard, run after the LLM (or a direct rule tier) and before
/// any adapter dispatch.
///
/// Enforces policy independent of the LLM's good behavior: device and
/// action whitelists, per-device risk confirmation, geofence constraints,
/// rate limits, and emotional elevation. Hard denies are checked before
/// confirmation requirements so a forbidden action can never be "confirmed
/// through".
#[must_use]
pub fn post_guard(
    intent: &Intent,
    session: &SessionView,
    policy: &PolicySnapshot,
    limiter: &RateLimiter,
) -> GuardVerdict {
    match intent {
        Intent::SmartHome { device, action, .. } => {
            let Some(fence) = policy.device(device) else {
                return GuardVerdict::deny(
                    DenyReason::DeviceNotWhitelisted,
                    Constraint::DeviceWhitelist,
                );
            };
            if !fence.allows(action) {
                return GuardVerdict::deny(DenyReason::ActionNotAllowed, Constraint::AllowedActions);
            }
            if let Some(zone) = &session.last_zone {
                if policy.denied_zones(action).contains(zone) {
                    debug!(device = %device, action = %action, zone = %zone, "geofence violation");
                    return GuardVerdict::deny(
                        DenyReason::GeofenceViolation,
                        Constraint::Geofence,
                    );
                }
            }
            if let Some(verdict) = check_rate(intent, session, policy, limiter, action) {
                return verdict;
            }
            if fence.risk_level >= policy.guard.risk_confirm_threshold || intent.needs_confirm() {
                return GuardVerdict::allow_with_confirm(
                    DenyReason::HighRiskAction,
                    Constraint::RiskLevel,
                );
            }
            GuardVerdict::allow()
        }

        Intent::AssistMove { target, .. } => {
            if !policy.motion_targets.contains_key(target) {
                return GuardVerdict::deny(DenyReason::TargetUnknown, Constraint::MotionTargets);
            }
            if let Some(verdict) = check_rate(intent, session, policy, limiter, target) {
                return verdict;
            }
            // Motion while the user reads as highly stressed goes to a
            // caregiver instead; moderately stressed asks for confirmation.
            if session.stress > policy.guard.stress_elevate_threshold {
                return GuardVerdict::elevate(DenyReason::ElevatedStress);
            }
            if session.stress > policy.guard.stress_threshold || intent.needs_confirm() {
                return GuardVerdict::allow_with_confirm(
                    DenyReason::ElevatedStress,
                    Constraint::EmotionalState,
                );
            }
            GuardVerdict::allow()
        }

        Intent::Call { callee, .. } => {
            if policy.contact_for_role(*callee).is_none() {
                return GuardVerdict::deny(DenyReason::ContactUnknown, Constraint::ContactLadder);
            }
            if let Some(verdict) = check_rate(intent, session, policy, limiter, callee.as_str()) {
                return verdict;
            }
            GuardVerdict::allow()
        }

        Intent::Chat { .. } => GuardVerdict::allow(),
    }
}

fn check_rate(
    intent: &Intent,
    session: &SessionView,
    policy: &PolicySnapshot,
    limiter: &RateLimiter,
    action: &str,
) -> Option<GuardVerdict> {
    let kind: IntentKind = intent.kind();
    let params = policy.guard.rate_limits.get(&kind)?;
    if limiter.try_acquire(&session.session, kind, action, *params) {
        None
    } else {
        debug!(session = %session.session, kind = %kind, action = %action, "rate limited");
        Some(GuardVerdict::deny(
            DenyReason::RateLimited,
            Constraint::RateLimit,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carelink_core::{
        Callee, ChatStyle, DeviceId, EmotionReading, GuardDecision, MoveSpeed, SessionId, ZoneId,
    };
    use carelink_policy::testing::sample_snapshot;
    use carelink_session::SessionContext;

    fn view() -> SessionView {
        SessionContext::new(SessionId::new("s-1")).view(chrono::Utc::now())
    }

    fn view_in_zone(zone: &str) -> SessionView {
        let mut ctx = SessionContext::new(SessionId::new("s-1"));
        ctx.set_zone(ZoneId::new(zone));
        ctx.view(chrono::Utc::now())
    }

    fn view_with_stress(stress: f32) -> SessionView {
        let mut ctx = SessionContext::new(SessionId::new("s-1"));
        ctx.set_emotion(EmotionReading::new(stress));
        ctx.view(chrono::Utc::now())
    }

    fn smart_home(device: &str, action: &str) -> Intent {
        Intent::SmartHome {
            device: DeviceId::new(device),
            action: action.into(),
            room: None,
            confirm: false,
        }
    }

    #[test]
    fn whitelisted_low_risk_action_allowed() {
        let policy = sample_snapshot();
        let limiter = RateLimiter::new();
        let v = post_guard(
            &smart_home("living_room_light", "brighten"),
            &view(),
            &policy,
            &limiter,
        );
        assert_eq!(v.decision, GuardDecision::Allow);
    }

    #[test]
    fn unknown_device_denied() {
        let policy = sample_snapshot();
        let v = post_guard(
            &smart_home("garage_door", "open"),
            &view(),
            &policy,
            &RateLimiter::new(),
        );
        assert_eq!(v.reasons, vec![DenyReason::DeviceNotWhitelisted]);
    }

    #[test]
    fn disallowed_action_denied() {
        let policy = sample_snapshot();
        let v = post_guard(
            &smart_home("living_room_light", "unlock"),
            &view(),
            &policy,
            &RateLimiter::new(),
        );
        assert_eq!(v.reasons, vec![DenyReason::ActionNotAllowed]);
    }

    #[test]
    fn high_risk_device_requires_confirmation() {
        let policy = sample_snapshot();
        let v = post_guard(
            &smart_home("front_door_lock", "unlock"),
            &view_in_zone("entrance"),
            &policy,
            &RateLimiter::new(),
        );
        assert_eq!(v.decision, GuardDecision::AllowWithConfirm);
        assert_eq!(v.constraints_violated, vec![Constraint::RiskLevel]);
    }

    #[test]
    fn unlock_denied_outside_safe_zones() {
        let policy = sample_snapshot();
        let v = post_guard(
            &smart_home("front_door_lock", "unlock"),
            &view_in_zone("outside_safe_zones"),
            &policy,
            &RateLimiter::new(),
        );
        assert_eq!(v.decision, GuardDecision::Deny);
        assert_eq!(v.reasons, vec![DenyReason::GeofenceViolation]);
    }

    #[test]
    fn geofence_deny_beats_confirmation() {
        // A high-risk device in a denied zone must deny, not ask to confirm.
        let policy = sample_snapshot();
        let v = post_guard(
            &smart_home("front_door_lock", "unlock"),
            &view_in_zone("outside_safe_zones"),
            &policy,
            &RateLimiter::new(),
        );
        assert_ne!(v.decision, GuardDecision::AllowWithConfirm);
    }

    #[test]
    fn rate_limit_exhaustion_denies() {
        let policy = sample_snapshot();
        let limiter = RateLimiter::new();
        let intent = smart_home("living_room_light", "on");
        let burst = policy.guard.rate_limits[&IntentKind::SmartHome].burst;
        for _ in 0..burst {
            assert!(post_guard(&intent, &view(), &policy, &limiter).permits_dispatch());
        }
        let v = post_guard(&intent, &view(), &policy, &limiter);
        assert_eq!(v.reasons, vec![DenyReason::RateLimited]);
    }

    #[test]
    fn stressed_motion_requires_confirmation() {
        let policy = sample_snapshot();
        let intent = Intent::AssistMove {
            target: "balcony".into(),
            speed: MoveSpeed::Normal,
            confirm: false,
        };
        let v = post_guard(&intent, &view_with_stress(0.8), &policy, &RateLimiter::new());
        assert_eq!(v.decision, GuardDecision::AllowWithConfirm);
    }

    #[test]
    fn extreme_stress_elevates() {
        let policy = sample_snapshot();
        let intent = Intent::AssistMove {
            target: "balcony".into(),
            speed: MoveSpeed::Normal,
            confirm: false,
        };
        let v = post_guard(&intent, &view_with_stress(0.95), &policy, &RateLimiter::new());
        assert_eq!(v.decision, GuardDecision::Elevate);
    }

    #[test]
    fn unknown_motion_target_denied() {
        let policy = sample_snapshot();
        let intent = Intent::AssistMove {
            target: "rooftop".into(),
            speed: MoveSpeed::Fast,
            confirm: false,
        };
        let v = post_guard(&intent, &view(), &policy, &RateLimiter::new());
        assert_eq!(v.reasons, vec![DenyReason::TargetUnknown]);
    }

    #[test]
    fn call_with_ladder_role_allowed() {
        let policy = sample_snapshot();
        let intent = Intent::Call {
            callee: Callee::Family,
            reason: None,
            confirm: true,
        };
        let v = post_guard(&intent, &view(), &policy, &RateLimiter::new());
        assert_eq!(v.decision, GuardDecision::Allow);
    }

    #[test]
    fn chat_always_allowed() {
        let policy = sample_snapshot();
        let intent = Intent::Chat {
            style: ChatStyle::Calming,
        };
        assert_eq!(
            post_guard(&intent, &view(), &policy, &RateLimiter::new()).decision,
            GuardDecision::Allow
        );
    }

    #[test]
    fn same_inputs_same_verdict() {
        let policy = sample_snapshot();
        let intent = smart_home("living_room_light", "dim");
        // Fresh limiters so rate state does not differ between runs.
        let a = post_guard(&intent, &view(), &policy, &RateLimiter::new());
        let b = post_guard(&intent, &view(), &policy, &RateLimiter::new());
        assert_eq!(a, b);
    }
}
