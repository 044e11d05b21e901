/// Configuration for the SIP gateway adapter.
#[derive(Clone)]
pub struct SipConfig {
    /// Base URL of the gateway's HTTP API.
    pub base_url: String,

    /// Bearer token for the gateway.
    pub token: String,

    /// Public URL of this daemon's call-status callback endpoint, given to
    /// the gateway with every placed call.
    pub callback_url: String,

    /// Caller id presented to callees.
    pub caller_id: Option<String>,
}

impl std::fmt::Debug for SipConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SipConfig")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .field("callback_url", &self.callback_url)
            .field("caller_id", &self.caller_id)
            .finish()
    }
}

impl SipConfig {
    /// Create a configuration for the given gateway.
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        callback_url: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            callback_url: callback_url.into(),
            caller_id: None,
        }
    }

    /// Set the presented caller id.
    #[must_use]
    pub fn with_caller_id(mut self, caller_id: impl Into<String>) -> Self {
        self.caller_id = Some(caller_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_token() {
        let config = SipConfig::new("http://gw", "secret-token", "http://me/callbacks/call");
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("secret-token"));
    }
}
