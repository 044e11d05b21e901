use std::process::ExitCode;

use clap::Args;

use super::post_json;

#[derive(Args, Debug)]
pub struct TestEmergencyArgs {
    /// Emergency category (medical, fall, sos, security, distress).
    #[arg(long)]
    category: String,

    /// Severity 1..=4.
    #[arg(long, default_value_t = 2)]
    severity: u8,
}

pub async fn test_emergency(endpoint: &str, args: &TestEmergencyArgs) -> ExitCode {
    post_json(
        endpoint,
        "/v1/test-emergency",
        Some(serde_json::json!({
            "category": args.category,
            "severity": args.severity,
        })),
    )
    .await
}
