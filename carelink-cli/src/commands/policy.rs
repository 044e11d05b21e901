use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;

use carelink_policy::PolicySnapshot;

use super::{get_json, post_json};

#[derive(Args, Debug)]
pub struct CheckPolicyArgs {
    /// Path to the policy YAML file.
    #[arg(long, env = "CARELINK_POLICY_PATH", default_value = "policy.yaml")]
    policy: PathBuf,
}

pub fn check_policy(args: &CheckPolicyArgs) -> ExitCode {
    match PolicySnapshot::load(&args.policy) {
        Ok(snapshot) => {
            println!(
                "policy ok: version {}, {} devices, {} ladder rungs, {} zones",
                snapshot.version,
                snapshot.devices.len(),
                snapshot.ladder.len(),
                snapshot.zones.len(),
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("policy invalid: {err}");
            ExitCode::from(2)
        }
    }
}

pub async fn dump_snapshot(endpoint: &str) -> ExitCode {
    get_json(endpoint, "/v1/snapshot").await
}

pub async fn reload_policy(endpoint: &str) -> ExitCode {
    post_json(endpoint, "/v1/policy/reload", None).await
}
