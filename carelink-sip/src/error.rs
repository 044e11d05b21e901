use carelink_adapter::AdapterError;
use thiserror::Error;

/// Errors specific to the SIP gateway adapter.
#[derive(Debug, Error)]
pub enum SipError {
    /// An HTTP-level transport error occurred.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway returned an error response.
    #[error("SIP gateway error: {0}")]
    Gateway(String),

    /// Authentication was rejected.
    #[error("SIP gateway rejected the token")]
    Auth,

    /// HTTP 429 from the gateway.
    #[error("rate limited by SIP gateway")]
    RateLimited,
}

impl From<SipError> for AdapterError {
    fn from(err: SipError) -> Self {
        match err {
            SipError::Http(e) if e.is_timeout() => {
                AdapterError::Timeout(std::time::Duration::from_secs(0))
            }
            SipError::Http(e) => AdapterError::Connection(e.to_string()),
            SipError::Gateway(msg) => AdapterError::Execution(msg),
            SipError::Auth => AdapterError::Auth("gateway token rejected".into()),
            SipError::RateLimited => AdapterError::RateLimited,
        }
    }
}
