/// Configuration for the Home-Assistant adapter.
#[derive(Clone)]
pub struct HomeAssistantConfig {
    /// Base URL of the Home Assistant instance.
    pub base_url: String,

    /// Long-lived access token.
    pub token: String,
}

impl std::fmt::Debug for HomeAssistantConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HomeAssistantConfig")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl HomeAssistantConfig {
    /// Create a configuration for the given instance and token.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
        }
    }
}
