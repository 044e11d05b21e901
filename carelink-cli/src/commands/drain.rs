use std::process::ExitCode;

use super::post_json;

pub async fn drain(endpoint: &str) -> ExitCode {
    post_json(endpoint, "/v1/drain", None).await
}
