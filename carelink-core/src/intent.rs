use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::DeviceId;

/// A typed, schema-valid action request.
///
/// This is a closed sum: the wire schema accepted from the LLM stage and the
/// variants produced by the direct rule tiers are the same four shapes. No
/// free-form dictionaries cross component boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "intent")]
pub enum Intent {
    /// Operate one whitelisted smart-home device.
    #[serde(rename = "smart.home")]
    SmartHome {
        device: DeviceId,
        action: String,
        room: Option<String>,
        #[serde(default)]
        confirm: bool,
    },

    /// Ask the quadruped to move to a known target.
    #[serde(rename = "assist.move")]
    AssistMove {
        target: String,
        speed: MoveSpeed,
        #[serde(default)]
        confirm: bool,
    },

    /// Place a call to a contact role on the escalation ladder.
    #[serde(rename = "call.emergency")]
    Call {
        callee: Callee,
        reason: Option<String>,
        #[serde(default)]
        confirm: bool,
    },

    /// Conversational reply with no side effect.
    #[serde(rename = "chat")]
    Chat { style: ChatStyle },
}

impl Intent {
    /// The coarse intent kind, used for rate-limit bucketing and audit.
    #[must_use]
    pub fn kind(&self) -> IntentKind {
        match self {
            Self::SmartHome { .. } => IntentKind::SmartHome,
            Self::AssistMove { .. } => IntentKind::AssistMove,
            Self::Call { .. } => IntentKind::Call,
            Self::Chat { .. } => IntentKind::Chat,
        }
    }

    /// Whether the request itself asked for a confirmation round.
    #[must_use]
    pub fn needs_confirm(&self) -> bool {
        match self {
            Self::SmartHome { confirm, .. }
            | Self::AssistMove { confirm, .. }
            | Self::Call { confirm, .. } => *confirm,
            Self::Chat { .. } => false,
        }
    }
}

/// Coarse discriminator over [`Intent`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    SmartHome,
    AssistMove,
    Call,
    Chat,
}

impl IntentKind {
    /// Return the snake_case tag for this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SmartHome => "smart_home",
            Self::AssistMove => "assist_move",
            Self::Call => "call",
            Self::Chat => "chat",
        }
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Motion speed for assisted movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveSpeed {
    Slow,
    Normal,
    Fast,
}

/// Who to call; maps onto contact-ladder roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Callee {
    Family,
    Caregiver,
    Doctor,
    Services,
}

impl Callee {
    /// Return the snake_case tag for this callee role.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Family => "family",
            Self::Caregiver => "caregiver",
            Self::Doctor => "doctor",
            Self::Services => "services",
        }
    }
}

impl fmt::Display for Callee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conversational style for chat replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatStyle {
    Neutral,
    Cheerful,
    Calming,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smart_home_wire_tag() {
        let intent = Intent::SmartHome {
            device: DeviceId::new("living_room_light"),
            action: "brighten".into(),
            room: Some("living_room".into()),
            confirm: false,
        };
        let json = serde_json::to_value(&intent).unwrap();
        assert_eq!(json["intent"], "smart.home");
        assert_eq!(json["device"], "living_room_light");
    }

    #[test]
    fn call_wire_roundtrip() {
        let json = r#"{"intent":"call.emergency","callee":"family","reason":null,"confirm":true}"#;
        let intent: Intent = serde_json::from_str(json).unwrap();
        assert_eq!(intent.kind(), IntentKind::Call);
        assert!(intent.needs_confirm());
    }

    #[test]
    fn chat_never_needs_confirm() {
        let intent = Intent::Chat {
            style: ChatStyle::Calming,
        };
        assert!(!intent.needs_confirm());
        assert_eq!(intent.kind().as_str(), "chat");
    }

    #[test]
    fn confirm_defaults_to_false() {
        let json = r#"{"intent":"assist.move","target":"bedroom","speed":"slow"}"#;
        let intent: Intent = serde_json::from_str(json).unwrap();
        assert!(!intent.needs_confirm());
    }
}
