use reqwest::header::{HeaderMap, AUTHORIZATION};
use serde_json::Value;
use std::time::Duration;

/// Build an HTTP client with optional Bearer token default header and a request timeout.
pub fn build_client(token: Option<&str>, timeout: Duration) -> anyhow::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().timeout(timeout);
    if let Some(tok) = token {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, format!("Bearer {}", tok).parse()?);
        builder = builder.default_headers(headers);
    }
    Ok(builder.build()?)
}

/// Normalize non-2xx responses into errors carrying the backend's message.
pub async fn handle_error(resp: reqwest::Response) -> anyhow::Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    Err(anyhow::anyhow!(error_message(status, &body)))
}

/// `{"message": ...}` bodies yield the message verbatim; anything else falls back to the body.
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    let message = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        v.get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
    });
    match message {
        Some(msg) => msg,
        None if body.trim().is_empty() => format!("request failed {}", status),
        None => body.trim().to_string(),
    }
}
