use carelink_adapter::AdapterError;
use thiserror::Error;

/// Errors specific to the notification adapter.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// An HTTP-level transport error occurred.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The SMS gateway returned an error response.
    #[error("SMS gateway error: {0}")]
    Gateway(String),

    /// SMTP delivery failed.
    #[error("SMTP error: {0}")]
    Smtp(String),

    /// The requested channel is not configured.
    #[error("channel {0} not configured")]
    ChannelUnconfigured(&'static str),

    /// HTTP 429 from the gateway.
    #[error("rate limited by notification gateway")]
    RateLimited,

    /// The recipient address could not be parsed.
    #[error("bad recipient: {0}")]
    BadRecipient(String),
}

impl From<NotifyError> for AdapterError {
    fn from(err: NotifyError) -> Self {
        match err {
            NotifyError::Http(e) if e.is_timeout() => {
                AdapterError::Timeout(std::time::Duration::from_secs(0))
            }
            NotifyError::Http(e) => AdapterError::Connection(e.to_string()),
            NotifyError::Gateway(msg) => AdapterError::Execution(msg),
            // SMTP failures (greylisting, connection churn) retry.
            NotifyError::Smtp(msg) => AdapterError::Connection(msg),
            NotifyError::ChannelUnconfigured(channel) => {
                AdapterError::Configuration(format!("{channel} channel not configured"))
            }
            NotifyError::RateLimited => AdapterError::RateLimited,
            NotifyError::BadRecipient(msg) => AdapterError::InvalidPayload(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smtp_errors_retry() {
        let err: AdapterError = NotifyError::Smtp("451 greylisted".into()).into();
        assert!(err.is_retryable());
    }

    #[test]
    fn unconfigured_channel_is_permanent() {
        let err: AdapterError = NotifyError::ChannelUnconfigured("sms").into();
        assert!(!err.is_retryable());
    }

    #[test]
    fn bad_recipient_is_permanent() {
        let err: AdapterError = NotifyError::BadRecipient("not-an-address".into()).into();
        assert!(!err.is_retryable());
    }
}
