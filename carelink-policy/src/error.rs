use thiserror::Error;

/// Errors raised while loading or compiling a policy document.
///
/// All of these are load-time failures: a running system never sees a
/// half-valid snapshot.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read policy file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse policy document: {0}")]
    Parse(String),

    #[error("invalid regex in {context}: {error}")]
    InvalidRegex { context: String, error: String },

    #[error("sos set has unknown category {0:?}")]
    UnknownCategory(String),

    #[error("severity {0} outside 1..=4")]
    InvalidSeverity(u8),

    #[error("device {device} has risk level {level} outside 1..=4")]
    InvalidRiskLevel { device: String, level: u8 },

    #[error("ladder references unknown contact {0:?}")]
    UnknownContact(String),

    #[error("escalation ladder is empty")]
    EmptyLadder,

    #[error("zone {0} has fewer than 3 polygon points")]
    DegeneratePolygon(String),

    #[error("geo constraint for {action:?} references unknown zone {zone:?}")]
    UnknownZone { action: String, zone: String },

    #[error("emergency scene references unknown device {0:?}")]
    UnknownSceneDevice(String),

    #[error("scene_min_success_ratio {0} outside 0.0..=1.0")]
    InvalidRatio(f64),

    #[error("threshold {name} = {value} outside 0.0..=1.0")]
    InvalidThreshold { name: &'static str, value: f32 },

    #[error("rate limit for {0:?} must have a non-zero burst")]
    InvalidRateLimit(String),
}
