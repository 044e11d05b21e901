use thiserror::Error;

/// Top-level error type for the Carelink system.
#[derive(Debug, Error)]
pub enum CarelinkError {
    #[error("policy error: {0}")]
    Policy(String),

    #[error("rules error: {0}")]
    Rules(String),

    #[error("guard error: {0}")]
    Guard(String),

    #[error("intent error: {0}")]
    Intent(String),

    #[error("adapter error: {0}")]
    Adapter(String),

    #[error("emergency error: {0}")]
    Emergency(String),

    #[error("audit error: {0}")]
    Audit(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{0}")]
    Other(String),
}
