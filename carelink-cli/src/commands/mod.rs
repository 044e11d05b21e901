pub mod drain;
pub mod emergency;
pub mod policy;
pub mod run;

use std::process::ExitCode;

/// POST to a control route and pretty-print the JSON reply.
pub(crate) async fn post_json(endpoint: &str, path: &str, body: Option<serde_json::Value>) -> ExitCode {
    let client = reqwest::Client::new();
    let mut request = client.post(format!("{endpoint}{path}"));
    if let Some(body) = body {
        request = request.json(&body);
    }
    finish(request.send().await).await
}

/// GET a control route and pretty-print the JSON reply.
pub(crate) async fn get_json(endpoint: &str, path: &str) -> ExitCode {
    let client = reqwest::Client::new();
    finish(client.get(format!("{endpoint}{path}")).send().await).await
}

async fn finish(result: Result<reqwest::Response, reqwest::Error>) -> ExitCode {
    match result {
        Ok(response) => {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            match serde_json::from_str::<serde_json::Value>(&body) {
                Ok(value) => println!("{}", serde_json::to_string_pretty(&value).unwrap_or(body)),
                Err(_) if !body.is_empty() => println!("{body}"),
                Err(_) => {}
            }
            if status.is_success() {
                ExitCode::SUCCESS
            } else {
                eprintln!("daemon returned HTTP {status}");
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            eprintln!("failed to reach daemon: {err}");
            ExitCode::FAILURE
        }
    }
}
