//! Carelink CLI
//!
//! Runs the companion daemon and drives its control surface: policy
//! validation and reload, snapshot dumps, synthetic emergencies, and
//! graceful drain.

mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

/// Carelink: guard-and-orchestration core for the elderly companion.
#[derive(Parser, Debug)]
#[command(name = "carelink", version, about)]
struct Cli {
    /// Daemon control endpoint.
    #[arg(
        long,
        env = "CARELINK_ENDPOINT",
        default_value = "http://127.0.0.1:8600",
        global = true
    )]
    endpoint: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the daemon.
    Run(commands::run::RunArgs),
    /// Validate a policy file without starting anything.
    CheckPolicy(commands::policy::CheckPolicyArgs),
    /// Print the running daemon's policy snapshot summary.
    DumpSnapshot,
    /// Ask the running daemon to reload its policy file.
    ReloadPolicy,
    /// Open a synthetic emergency (dry-run daemons record, they don't dial).
    TestEmergency(commands::emergency::TestEmergencyArgs),
    /// Quiesce the running daemon.
    Drain,
}

#[tokio::main]
async fn main() -> ExitCode {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => commands::run::run(args).await,
        Command::CheckPolicy(args) => commands::policy::check_policy(&args),
        Command::DumpSnapshot => commands::policy::dump_snapshot(&cli.endpoint).await,
        Command::ReloadPolicy => commands::policy::reload_policy(&cli.endpoint).await,
        Command::TestEmergency(args) => {
            commands::emergency::test_emergency(&cli.endpoint, &args).await
        }
        Command::Drain => commands::drain::drain(&cli.endpoint).await,
    }
}
