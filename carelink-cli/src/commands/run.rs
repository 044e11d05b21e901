use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use tokio::sync::Notify;
use tracing::{error, info, warn};

use carelink_server::{AppState, BuildError, DaemonConfig, build_app, router};

/// Exit code for an invalid policy or configuration.
const EXIT_POLICY_INVALID: u8 = 2;
/// Exit code for unreachable adapters under strict startup.
const EXIT_ADAPTER_UNREACHABLE: u8 = 3;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the daemon configuration file.
    #[arg(long, env = "CARELINK_CONFIG", default_value = "carelink.toml")]
    config: PathBuf,

    /// Use recording adapters instead of real backends.
    #[arg(long)]
    dry_run: bool,

    /// Exit with code 3 when any adapter probe fails at startup.
    #[arg(long)]
    strict_startup: bool,
}

pub async fn run(args: RunArgs) -> ExitCode {
    let mut config = match DaemonConfig::load(&args.config) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, path = %args.config.display(), "invalid configuration");
            return ExitCode::from(EXIT_POLICY_INVALID);
        }
    };
    if args.dry_run {
        config.dry_run = true;
    }
    if args.strict_startup {
        config.strict_startup = true;
    }

    let app = match build_app(&config).await {
        Ok(app) => app,
        Err(err @ BuildError::Adapter(_)) => {
            error!(error = %err, "adapter startup failed");
            return ExitCode::from(EXIT_ADAPTER_UNREACHABLE);
        }
        Err(err) => {
            error!(error = %err, "startup failed");
            return ExitCode::from(EXIT_POLICY_INVALID);
        }
    };

    if !app.degraded.is_empty() {
        if config.strict_startup {
            error!(degraded = ?app.degraded, "adapters unreachable under strict startup");
            return ExitCode::from(EXIT_ADAPTER_UNREACHABLE);
        }
        warn!(degraded = ?app.degraded, "running in degraded mode");
    }

    let shutdown = Arc::new(Notify::new());
    let state = AppState {
        orchestrator: Arc::clone(&app.orchestrator),
        audit_store: Arc::clone(&app.audit_store),
        shutdown: Arc::clone(&shutdown),
        degraded: app.degraded.iter().map(ToString::to_string).collect(),
    };

    // SIGHUP reloads policy in place.
    spawn_sighup_reload(&app);

    let listener = match tokio::net::TcpListener::bind(&config.bind).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, bind = %config.bind, "failed to bind control surface");
            return ExitCode::FAILURE;
        }
    };
    info!(bind = %config.bind, policy = %config.policy_path.display(), "carelink daemon up");

    let orchestrator = Arc::clone(&app.orchestrator);
    let serve = axum::serve(listener, router(state)).with_graceful_shutdown(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        let requested = shutdown.notified();
        tokio::select! {
            _ = ctrl_c => info!("interrupt received, draining"),
            () = requested => info!("drain requested, draining"),
        }
    });

    if let Err(err) = serve.await {
        error!(error = %err, "control surface failed");
        return ExitCode::FAILURE;
    }

    orchestrator.drain().await;
    info!("drained cleanly");
    ExitCode::SUCCESS
}

fn spawn_sighup_reload(app: &carelink_server::App) {
    #[cfg(unix)]
    {
        let policy = Arc::clone(app.orchestrator.policy());
        tokio::spawn(async move {
            let Ok(mut hangup) =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())
            else {
                return;
            };
            while hangup.recv().await.is_some() {
                match policy.reload() {
                    Ok(version) => info!(version, "policy reloaded on SIGHUP"),
                    Err(err) => warn!(error = %err, "SIGHUP reload failed"),
                }
            }
        });
    }
    #[cfg(not(unix))]
    let _ = app;
}
