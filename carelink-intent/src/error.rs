use thiserror::Error;

/// Errors that can occur while resolving an intent from the LLM endpoint.
#[derive(Debug, Error)]
pub enum IntentError {
    /// HTTP request failed at the transport level.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The attempt missed its deadline.
    #[error("intent request timed out after {0}ms")]
    Timeout(u64),

    /// The endpoint answered with a non-success status.
    #[error("intent API error: {0}")]
    Api(String),

    /// The reply was not a schema-valid intent.
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    /// Bad client configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl IntentError {
    /// Whether a bounded retry may help.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Configuration(_))
    }

    /// Short code recorded in the audit log.
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Http(_) => "intent_transport",
            Self::Timeout(_) => "intent_timeout",
            Self::Api(_) => "intent_api_error",
            Self::SchemaViolation(_) => "intent_schema_violation",
            Self::Configuration(_) => "intent_misconfigured",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classes() {
        assert!(IntentError::Timeout(1500).is_retryable());
        assert!(IntentError::SchemaViolation("trailing tokens".into()).is_retryable());
        assert!(!IntentError::Configuration("no endpoint".into()).is_retryable());
    }

    #[test]
    fn reason_codes() {
        assert_eq!(IntentError::Timeout(1500).reason_code(), "intent_timeout");
        assert_eq!(
            IntentError::SchemaViolation("x".into()).reason_code(),
            "intent_schema_violation"
        );
    }
}
