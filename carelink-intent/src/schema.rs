//! Strict parsing of the closed intent schema.
//!
//! The LLM contract is strict JSON: a single bare object, no trailing
//! tokens, no markdown fences, no unknown fields, all variant-required
//! fields present and within their enumerations. Anything else is a
//! [`IntentError::SchemaViolation`] and the caller falls back; an intent is
//! never fabricated from a malformed reply.

use serde::Deserialize;

use carelink_core::{Callee, ChatStyle, DeviceId, Intent, MoveSpeed};

use crate::error::IntentError;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SmartHomeWire {
    #[allow(dead_code)]
    intent: String,
    device: String,
    action: String,
    room: String,
    confirm: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AssistMoveWire {
    #[allow(dead_code)]
    intent: String,
    target: String,
    speed: MoveSpeed,
    confirm: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CallWire {
    #[allow(dead_code)]
    intent: String,
    callee: Callee,
    reason: String,
    confirm: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChatWire {
    #[allow(dead_code)]
    intent: String,
    style: ChatStyle,
}

/// Parse a raw endpoint reply into a typed [`Intent`].
pub fn parse_intent(raw: &str) -> Result<Intent, IntentError> {
    // `from_str` already rejects trailing tokens after the value.
    let value: serde_json::Value = serde_json::from_str(raw.trim())
        .map_err(|e| IntentError::SchemaViolation(format!("not strict JSON: {e}")))?;

    let tag = value
        .get("intent")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| IntentError::SchemaViolation("missing \"intent\" tag".into()))?;

    match tag {
        "smart.home" => {
            let wire: SmartHomeWire = from_value(value)?;
            Ok(Intent::SmartHome {
                device: DeviceId::new(wire.device),
                action: wire.action,
                room: Some(wire.room),
                confirm: wire.confirm,
            })
        }
        "assist.move" => {
            let wire: AssistMoveWire = from_value(value)?;
            Ok(Intent::AssistMove {
                target: wire.target,
                speed: wire.speed,
                confirm: wire.confirm,
            })
        }
        "call.emergency" => {
            let wire: CallWire = from_value(value)?;
            if !wire.confirm {
                return Err(IntentError::SchemaViolation(
                    "call.emergency requires confirm: true".into(),
                ));
            }
            Ok(Intent::Call {
                callee: wire.callee,
                reason: Some(wire.reason),
                confirm: wire.confirm,
            })
        }
        "chat" => {
            let wire: ChatWire = from_value(value)?;
            Ok(Intent::Chat { style: wire.style })
        }
        other => Err(IntentError::SchemaViolation(format!(
            "unknown intent kind {other:?}"
        ))),
    }
}

fn from_value<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T, IntentError> {
    serde_json::from_value(value).map_err(|e| IntentError::SchemaViolation(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smart_home_parses() {
        let raw = r#"{"intent":"smart.home","device":"living_room_light","action":"brighten","room":"living_room","confirm":false}"#;
        let intent = parse_intent(raw).unwrap();
        match intent {
            Intent::SmartHome { device, action, .. } => {
                assert_eq!(device.as_str(), "living_room_light");
                assert_eq!(action, "brighten");
            }
            other => panic!("expected SmartHome, got {other:?}"),
        }
    }

    #[test]
    fn unknown_field_rejected() {
        let raw = r#"{"intent":"chat","style":"neutral","mood":"upbeat"}"#;
        let err = parse_intent(raw).unwrap_err();
        assert!(matches!(err, IntentError::SchemaViolation(_)));
    }

    #[test]
    fn missing_required_field_rejected() {
        let raw = r#"{"intent":"smart.home","device":"living_room_light","action":"on","confirm":false}"#;
        assert!(parse_intent(raw).is_err());
    }

    #[test]
    fn trailing_tokens_rejected() {
        let raw = r#"{"intent":"chat","style":"neutral"} extra"#;
        assert!(parse_intent(raw).is_err());
    }

    #[test]
    fn markdown_fences_rejected() {
        let raw = "```json\n{\"intent\":\"chat\",\"style\":\"neutral\"}\n```";
        assert!(parse_intent(raw).is_err());
    }

    #[test]
    fn out_of_enum_value_rejected() {
        let raw = r#"{"intent":"assist.move","target":"bedroom","speed":"warp","confirm":false}"#;
        assert!(parse_intent(raw).is_err());
    }

    #[test]
    fn call_emergency_requires_confirm_true() {
        let raw =
            r#"{"intent":"call.emergency","callee":"family","reason":"lonely","confirm":false}"#;
        let err = parse_intent(raw).unwrap_err();
        assert!(err.to_string().contains("confirm"));

        let raw =
            r#"{"intent":"call.emergency","callee":"family","reason":"lonely","confirm":true}"#;
        assert!(parse_intent(raw).is_ok());
    }

    #[test]
    fn unknown_intent_kind_rejected() {
        let raw = r#"{"intent":"robot.dance","tempo":"fast"}"#;
        assert!(parse_intent(raw).is_err());
    }
}
