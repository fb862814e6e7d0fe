//! Client settings.

use std::time::Duration;

/// Reconnect delays indexed by `min(retry_count, len - 1)`
pub const BACKOFF_DELAYS_MS: [u64; 5] = [1000, 2000, 4000, 8000, 15000];
/// Interval of the REST polling fallback
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// HTTP base url of the server, e.g. `http://127.0.0.1:8080`
    pub base_url: String,
    pub backoff: Vec<Duration>,
    pub poll_interval: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            backoff: BACKOFF_DELAYS_MS
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// WebSocket endpoint of an event (`http` → `ws`, `https` → `wss`)
    pub fn ws_url(&self, event_id: &str) -> String {
        let base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            self.base_url.clone()
        };
        format!("{}/api/v1/events/{}/ws", base, event_id)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("http://127.0.0.1:8080")
    }
}
