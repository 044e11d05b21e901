use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use carelink_adapter::{AdapterRegistry, JobExecutor, RecordingAdapters};
use carelink_audit::{AuditSink, AuditStore, FileAuditStore, MemoryAuditStore};
use carelink_bus::EventBus;
use carelink_core::AdapterKind;
use carelink_emergency::EmergencyDispatcher;
use carelink_guard::RateLimiter;
use carelink_homeassistant::{HomeAssistantAdapter, HomeAssistantConfig};
use carelink_intent::{HttpIntentResolver, IntentClient, IntentClientConfig};
use carelink_notify::{NotifyConfig, NotifyGateway, SmsGatewayConfig, SmtpConfig};
use carelink_orchestrator::Orchestrator;
use carelink_policy::{PolicyError, PolicyStore};
use carelink_session::SessionManager;
use carelink_sip::{SipCallAdapter, SipConfig};
use carelink_tts::{TtsClient, TtsConfig};
use carelink_video::{VideoClient, VideoConfig};

use crate::config::DaemonConfig;

/// Errors wiring the daemon together.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("audit store error: {0}")]
    Audit(#[from] carelink_audit::AuditError),

    #[error("adapter configuration error: {0}")]
    Adapter(#[from] carelink_adapter::AdapterError),

    #[error("intent client error: {0}")]
    Intent(#[from] carelink_intent::IntentError),
}

/// The assembled daemon.
pub struct App {
    pub orchestrator: Arc<Orchestrator>,
    pub audit_store: Arc<dyn AuditStore>,
    /// Adapter kinds whose startup probe failed (degraded mode).
    pub degraded: Vec<AdapterKind>,
}

/// Build every component from the configuration and probe the adapters.
///
/// Unreachable adapters are reported in [`App::degraded`] rather than
/// failing the build; the caller decides whether that is fatal (strict
/// startup) or just logged.
pub async fn build_app(config: &DaemonConfig) -> Result<App, BuildError> {
    let policy = Arc::new(PolicyStore::open(&config.policy_path)?);

    let audit_store: Arc<dyn AuditStore> = match &config.audit_dir {
        Some(dir) => Arc::new(FileAuditStore::open(dir)?),
        None => Arc::new(MemoryAuditStore::new()),
    };
    let audit = Arc::new(AuditSink::new(Arc::clone(&audit_store)));

    let registry = if config.dry_run {
        info!("dry-run mode: recording adapters, no external I/O");
        Arc::new(RecordingAdapters::new()).into_registry()
    } else {
        build_registry(config)?
    };

    let degraded: Vec<AdapterKind> = registry
        .health_check_all()
        .await
        .into_iter()
        .filter_map(|(kind, result)| match result {
            Ok(()) => None,
            Err(err) => {
                warn!(kind = %kind, error = %err, "adapter unreachable at startup");
                Some(kind)
            }
        })
        .collect();

    let executor = Arc::new(JobExecutor::new(registry, &policy.current()));
    let bus = EventBus::new();
    let emergency = EmergencyDispatcher::new(
        Arc::clone(&executor),
        Arc::clone(&policy),
        Arc::clone(&audit),
        bus.clone(),
    );

    let mut intent_config = IntentClientConfig::new(&config.llm.endpoint)
        .with_prompt_version(&config.llm.system_prompt_version);
    if let Some(key) = &config.llm.api_key {
        intent_config = intent_config.with_api_key(key);
    }
    let resolver = Arc::new(HttpIntentResolver::new(intent_config.clone())?);
    let intent = IntentClient::new(resolver, intent_config);

    let orchestrator = Arc::new(Orchestrator::new(
        policy,
        Arc::new(SessionManager::new()),
        Arc::new(RateLimiter::new()),
        intent,
        executor,
        emergency,
        audit,
        bus,
    ));

    Ok(App {
        orchestrator,
        audit_store,
        degraded,
    })
}

fn build_registry(config: &DaemonConfig) -> Result<AdapterRegistry, BuildError> {
    let mut registry = AdapterRegistry::new();

    if let Some(ha) = &config.homeassistant {
        registry = registry.with_smart_home(Arc::new(HomeAssistantAdapter::new(
            HomeAssistantConfig::new(&ha.base_url, &ha.token),
        )));
    }

    if let Some(sip) = &config.sip {
        let mut sip_config = SipConfig::new(&sip.base_url, &sip.token, &sip.callback_url);
        if let Some(caller_id) = &sip.caller_id {
            sip_config = sip_config.with_caller_id(caller_id);
        }
        registry = registry.with_call(Arc::new(SipCallAdapter::new(sip_config)));
    }

    let mut notify_config = NotifyConfig::new();
    if let Some(sms) = &config.sms {
        notify_config = notify_config.with_sms(SmsGatewayConfig {
            base_url: sms.base_url.clone(),
            token: sms.token.clone(),
            from: sms.from.clone(),
        });
    }
    if let Some(smtp) = &config.smtp {
        let mut smtp_config = SmtpConfig::new(&smtp.host, &smtp.from);
        smtp_config.port = smtp.port;
        if let (Some(user), Some(pass)) = (&smtp.username, &smtp.password) {
            smtp_config = smtp_config.with_credentials(user, pass);
        }
        notify_config = notify_config.with_smtp(smtp_config);
    }
    if notify_config.sms.is_some() || notify_config.smtp.is_some() {
        registry = registry.with_notify(Arc::new(NotifyGateway::new(notify_config)?));
    }

    if let Some(tts) = &config.tts {
        registry = registry.with_tts(Arc::new(TtsClient::new(TtsConfig::new(&tts.base_url))));
    }

    if let Some(video) = &config.video {
        registry = registry.with_video(Arc::new(VideoClient::new(VideoConfig::new(
            &video.base_url,
            &video.token,
        ))));
    }

    Ok(registry)
}
