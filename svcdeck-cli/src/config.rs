use std::time::Duration;

/// Connection settings collected from flags and environment.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_base: &str, token: Option<String>, timeout_secs: u64) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
            timeout: Duration::from_secs(timeout_secs.max(1)),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    /// WebSocket endpoint for the push stream.
    pub fn events_url(&self) -> String {
        build_ws_url(&self.api_base, "events")
    }
}

fn build_ws_url(base: &str, path: &str) -> String {
    let mut ws_base = base
        .replace("https://", "wss://")
        .replace("http://", "ws://");
    while ws_base.ends_with('/') {
        ws_base.pop();
    }
    format!("{}/{}", ws_base, path.trim_start_matches('/'))
}
