/// SMS gateway settings.
#[derive(Clone)]
pub struct SmsGatewayConfig {
    /// Base URL of the SMS gateway HTTP API.
    pub base_url: String,
    /// Bearer token.
    pub token: String,
    /// Sender id or number.
    pub from: String,
}

impl std::fmt::Debug for SmsGatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmsGatewayConfig")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .field("from", &self.from)
            .finish()
    }
}

/// SMTP settings for the email channel.
#[derive(Clone)]
pub struct SmtpConfig {
    /// SMTP server hostname.
    pub host: String,
    /// Submission port. Defaults to 587.
    pub port: u16,
    /// Optional credentials.
    pub username: Option<String>,
    pub password: Option<String>,
    /// From address on outgoing mail.
    pub from: String,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("from", &self.from)
            .finish()
    }
}

impl SmtpConfig {
    /// Create SMTP settings for the given server and from address.
    pub fn new(host: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 587,
            username: None,
            password: None,
            from: from.into(),
        }
    }

    /// Set credentials.
    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}

/// Full notification adapter configuration. Each channel is optional; an
/// unconfigured channel fails with a permanent configuration error.
#[derive(Debug, Clone, Default)]
pub struct NotifyConfig {
    pub sms: Option<SmsGatewayConfig>,
    pub smtp: Option<SmtpConfig>,
}

impl NotifyConfig {
    /// Configuration with both channels disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable the SMS channel.
    #[must_use]
    pub fn with_sms(mut self, sms: SmsGatewayConfig) -> Self {
        self.sms = Some(sms);
        self
    }

    /// Enable the email channel.
    #[must_use]
    pub fn with_smtp(mut self, smtp: SmtpConfig) -> Self {
        self.smtp = Some(smtp);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_secrets() {
        let config = NotifyConfig::new()
            .with_sms(SmsGatewayConfig {
                base_url: "http://sms".into(),
                token: "sms-secret".into(),
                from: "Carelink".into(),
            })
            .with_smtp(SmtpConfig::new("smtp.example.com", "noreply@example.com")
                .with_credentials("user", "mail-secret"));
        let debug = format!("{config:?}");
        assert!(!debug.contains("sms-secret"));
        assert!(!debug.contains("mail-secret"));
    }
}
