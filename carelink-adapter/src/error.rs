use std::time::Duration;

use thiserror::Error;

use carelink_core::AdapterKind;

/// Errors that can occur during adapter operations.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// No adapter of the requested kind is registered.
    #[error("no {0} adapter registered")]
    NotRegistered(AdapterKind),

    /// The adapter failed to execute the command (permanent).
    #[error("execution failed: {0}")]
    Execution(String),

    /// The adapter did not respond within the allowed duration.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// A network or transport-level error occurred.
    #[error("connection error: {0}")]
    Connection(String),

    /// The adapter was given invalid configuration (permanent).
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The remote service rejected the request due to rate limiting.
    #[error("rate limited")]
    RateLimited,

    /// The command payload could not be understood (permanent).
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Authentication was rejected (permanent).
    #[error("authentication failed: {0}")]
    Auth(String),
}

impl AdapterError {
    /// Returns `true` for transient error classes worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Connection(_) | Self::RateLimited
        )
    }

    /// Short error code used in failures and the audit log.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotRegistered(_) => "NOT_REGISTERED",
            Self::Execution(_) => "EXECUTION_FAILED",
            Self::Timeout(_) => "TIMEOUT",
            Self::Connection(_) => "CONNECTION",
            Self::Configuration(_) => "CONFIGURATION",
            Self::RateLimited => "RATE_LIMITED",
            Self::InvalidPayload(_) => "INVALID_PAYLOAD",
            Self::Auth(_) => "AUTH",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classes() {
        assert!(AdapterError::Timeout(Duration::from_secs(2)).is_retryable());
        assert!(AdapterError::Connection("reset".into()).is_retryable());
        assert!(AdapterError::RateLimited.is_retryable());
    }

    #[test]
    fn permanent_classes() {
        assert!(!AdapterError::Execution("boom".into()).is_retryable());
        assert!(!AdapterError::Auth("bad token".into()).is_retryable());
        assert!(!AdapterError::InvalidPayload("missing device".into()).is_retryable());
        assert!(!AdapterError::NotRegistered(AdapterKind::Video).is_retryable());
    }

    #[test]
    fn error_display() {
        let err = AdapterError::NotRegistered(AdapterKind::Call);
        assert_eq!(err.to_string(), "no call adapter registered");
    }
}
