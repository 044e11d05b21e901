use carelink_adapter::AdapterError;
use thiserror::Error;

/// Errors specific to the Home-Assistant adapter.
///
/// Internal errors; converted into [`AdapterError`] at the trait boundary.
#[derive(Debug, Error)]
pub enum HomeAssistantError {
    /// An HTTP-level transport error occurred.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Home Assistant returned an error response.
    #[error("Home Assistant API error: {0}")]
    Api(String),

    /// Authentication was rejected.
    #[error("Home Assistant rejected the access token")]
    Auth,

    /// HTTP 429 from the instance.
    #[error("rate limited by Home Assistant")]
    RateLimited,
}

impl From<HomeAssistantError> for AdapterError {
    fn from(err: HomeAssistantError) -> Self {
        match err {
            HomeAssistantError::Http(e) if e.is_timeout() => {
                AdapterError::Timeout(std::time::Duration::from_secs(0))
            }
            HomeAssistantError::Http(e) => AdapterError::Connection(e.to_string()),
            HomeAssistantError::Api(msg) => AdapterError::Execution(msg),
            HomeAssistantError::Auth => AdapterError::Auth("access token rejected".into()),
            HomeAssistantError::RateLimited => AdapterError::RateLimited,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_is_retryable() {
        let err: AdapterError = HomeAssistantError::RateLimited.into();
        assert!(err.is_retryable());
    }

    #[test]
    fn auth_failure_is_permanent() {
        let err: AdapterError = HomeAssistantError::Auth.into();
        assert!(!err.is_retryable());
    }

    #[test]
    fn api_error_is_permanent() {
        let err: AdapterError = HomeAssistantError::Api("unknown service".into()).into();
        assert!(!err.is_retryable());
    }
}
