//! Daemon configuration file (`carelink.toml`).
//!
//! Endpoint URLs and credentials for the adapter backends, the policy file
//! path, and the bind address. A handful of environment variables override
//! the file so containerized deployments can inject secrets without
//! touching it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading the daemon configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// The daemon configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DaemonConfig {
    /// Address the control surface listens on.
    pub bind: String,

    /// Path to the policy YAML file.
    pub policy_path: PathBuf,

    /// Directory for audit segments; in-memory audit when unset.
    pub audit_dir: Option<PathBuf>,

    /// Run every adapter in recording mode (no external I/O).
    pub dry_run: bool,

    /// Exit with code 3 when any adapter probe fails at startup.
    pub strict_startup: bool,

    /// LLM intent endpoint settings.
    pub llm: LlmSection,

    /// Smart-home backend (Home Assistant).
    pub homeassistant: Option<HomeAssistantSection>,

    /// SIP gateway for escalation calls.
    pub sip: Option<SipSection>,

    /// SMS gateway.
    pub sms: Option<SmsSection>,

    /// SMTP for the email channel.
    pub smtp: Option<SmtpSection>,

    /// Speech synthesizer service.
    pub tts: Option<TtsSection>,

    /// Video signaling service.
    pub video: Option<VideoSection>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8600".into(),
            policy_path: PathBuf::from("policy.yaml"),
            audit_dir: None,
            dry_run: false,
            strict_startup: false,
            llm: LlmSection::default(),
            homeassistant: None,
            sip: None,
            sms: None,
            smtp: None,
            tts: None,
            video: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LlmSection {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub system_prompt_version: String,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:9000/v1/intent".into(),
            api_key: None,
            system_prompt_version: "v1".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HomeAssistantSection {
    pub base_url: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SipSection {
    pub base_url: String,
    pub token: String,
    pub callback_url: String,
    #[serde(default)]
    pub caller_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SmsSection {
    pub base_url: String,
    pub token: String,
    pub from: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SmtpSection {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TtsSection {
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VideoSection {
    pub base_url: String,
    pub token: String,
}

fn default_smtp_port() -> u16 {
    587
}

impl DaemonConfig {
    /// Load the config file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&raw)?;
        config.apply_env();
        Ok(config)
    }

    /// Environment overrides (`CARELINK_*`).
    fn apply_env(&mut self) {
        if let Ok(bind) = std::env::var("CARELINK_BIND") {
            self.bind = bind;
        }
        if let Ok(path) = std::env::var("CARELINK_POLICY_PATH") {
            self.policy_path = PathBuf::from(path);
        }
        if let Ok(endpoint) = std::env::var("CARELINK_LLM_ENDPOINT") {
            self.llm.endpoint = endpoint;
        }
        if let Ok(key) = std::env::var("CARELINK_LLM_API_KEY") {
            self.llm.api_key = Some(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_parses_with_defaults() {
        let config: DaemonConfig = toml::from_str("policy_path = \"p.yaml\"").unwrap();
        assert_eq!(config.bind, "127.0.0.1:8600");
        assert!(!config.dry_run);
        assert!(config.homeassistant.is_none());
    }

    #[test]
    fn full_config_parses() {
        let raw = r#"
bind = "0.0.0.0:8600"
policy_path = "/etc/carelink/policy.yaml"
audit_dir = "/var/lib/carelink/audit"
dry_run = false
strict_startup = true

[llm]
endpoint = "http://intent.local/v1/intent"
system_prompt_version = "v3"

[homeassistant]
base_url = "http://ha.local:8123"
token = "hatoken"

[sip]
base_url = "http://sip.local"
token = "siptoken"
callback_url = "http://carelink.local:8600/v1/callbacks/call"

[sms]
base_url = "http://sms.local"
token = "smstoken"
from = "Carelink"

[smtp]
host = "smtp.local"
from = "carelink@example.com"

[tts]
base_url = "http://tts.local"

[video]
base_url = "http://video.local"
token = "vtoken"
"#;
        let config: DaemonConfig = toml::from_str(raw).unwrap();
        assert!(config.strict_startup);
        assert_eq!(config.smtp.unwrap().port, 587);
        assert_eq!(config.llm.system_prompt_version, "v3");
    }

    #[test]
    fn unknown_fields_rejected() {
        let err = toml::from_str::<DaemonConfig>("nope = true").unwrap_err();
        assert!(err.to_string().contains("nope"));
    }
}
