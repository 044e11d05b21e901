use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! newtype_string {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance from a string value.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Return the inner string as a str slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;

            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

newtype_string!(SessionId, "Identifies one user's rolling conversation session.");
newtype_string!(UtteranceId, "Identifies a single decoded utterance within a session.");
newtype_string!(IncidentId, "Identifies a live emergency incident.");
newtype_string!(DeviceId, "Identifies a smart-home device in the policy whitelist.");
newtype_string!(ZoneId, "Identifies a geofence zone.");
newtype_string!(ContactId, "Identifies a contact on the escalation ladder.");
newtype_string!(JobId, "Identifies a single adapter job.");

/// Language of an utterance or a spoken response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Mandarin Chinese.
    Zh,
    /// English.
    En,
    /// Cantonese.
    Yue,
}

impl Language {
    /// Return the lowercase wire tag for this language.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Zh => "zh",
            Self::En => "en",
            Self::Yue => "yue",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emergency severity on the 1 (lowest) to 4 (highest) scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Severity(u8);

impl Severity {
    /// Highest severity handled by the ladder.
    pub const MAX: Self = Self(4);

    /// Create a severity, returning `None` when outside `1..=4`.
    #[must_use]
    pub fn new(level: u8) -> Option<Self> {
        (1..=4).contains(&level).then_some(Self(level))
    }

    /// The numeric severity level.
    #[must_use]
    pub fn level(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Category of an emergency, ordered by matching priority: medical
/// conditions outrank falls, falls outrank generic SOS calls, and so on.
/// `Elevation` is reserved for guard-originated caregiver escalations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyCategory {
    Medical,
    Fall,
    Sos,
    Security,
    Distress,
    Elevation,
}

impl EmergencyCategory {
    /// All keyword-matchable categories in tier-evaluation order.
    pub const MATCH_ORDER: [Self; 5] = [
        Self::Medical,
        Self::Fall,
        Self::Sos,
        Self::Security,
        Self::Distress,
    ];

    /// Return the snake_case wire tag for this category.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Medical => "medical",
            Self::Fall => "fall",
            Self::Sos => "sos",
            Self::Security => "security",
            Self::Distress => "distress",
            Self::Elevation => "elevation",
        }
    }
}

impl fmt::Display for EmergencyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One emotion reading supplied by the affect collaborator.
///
/// `stress` is a normalized score in `[0, 1]`; the session context applies
/// time decay so a stale reading loses influence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionReading {
    /// Normalized stress score in `[0, 1]`.
    pub stress: f32,
    /// Free-form label from the affect model (e.g. `"anxious"`).
    pub label: Option<String>,
    /// When the reading was taken.
    pub taken_at: DateTime<Utc>,
}

impl EmotionReading {
    /// Create a reading taken now.
    #[must_use]
    pub fn new(stress: f32) -> Self {
        Self {
            stress: stress.clamp(0.0, 1.0),
            label: None,
            taken_at: Utc::now(),
        }
    }

    /// Attach the affect model's label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newtype_from_str() {
        let session = SessionId::from("user-7");
        assert_eq!(session.as_str(), "user-7");
        assert_eq!(&*session, "user-7");
    }

    #[test]
    fn newtype_serde_roundtrip() {
        let id = IncidentId::new("inc-42");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"inc-42\"");
        let back: IncidentId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn severity_bounds() {
        assert!(Severity::new(0).is_none());
        assert!(Severity::new(5).is_none());
        assert_eq!(Severity::new(4), Some(Severity::MAX));
        assert!(Severity::new(1).unwrap() < Severity::MAX);
    }

    #[test]
    fn language_wire_tags() {
        let json = serde_json::to_string(&Language::Yue).unwrap();
        assert_eq!(json, "\"yue\"");
        let back: Language = serde_json::from_str("\"zh\"").unwrap();
        assert_eq!(back, Language::Zh);
    }

    #[test]
    fn category_match_order_starts_with_medical() {
        assert_eq!(EmergencyCategory::MATCH_ORDER[0], EmergencyCategory::Medical);
        assert_eq!(
            EmergencyCategory::MATCH_ORDER.last(),
            Some(&EmergencyCategory::Distress)
        );
    }

    #[test]
    fn emotion_reading_clamps_stress() {
        assert!((EmotionReading::new(1.7).stress - 1.0).abs() < f32::EPSILON);
        assert!(EmotionReading::new(-0.2).stress.abs() < f32::EPSILON);
    }
}
