//! Client configuration with environment overrides.

use std::time::Duration;

/// Default interval between reconnection attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Default number of reconnection attempts before giving up.
pub const DEFAULT_MAX_RETRIES: u32 = 30;

/// Configuration for a [`crate::SocketClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint, e.g. `ws://localhost:3000/ws`.
    pub url: String,
    /// Fixed delay between reconnection attempts.
    pub retry_interval: Duration,
    /// Attempts before the retry loop gives up. A later explicit
    /// [`crate::SocketClient::reconnect`] starts a fresh round.
    pub max_retries: u32,
    /// Capacity of each subscription's delivery channel.
    pub event_channel_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:3000/ws".to_owned(),
            retry_interval: DEFAULT_RETRY_INTERVAL,
            max_retries: DEFAULT_MAX_RETRIES,
            event_channel_capacity: 256,
        }
    }
}

impl ClientConfig {
    /// Config pointing at `url` with default retry behavior.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Apply `PULSE_WS_URL`, `PULSE_RETRY_INTERVAL_SECS` and
    /// `PULSE_MAX_RETRIES` environment overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("PULSE_WS_URL") {
            if !url.is_empty() {
                self.url = url;
            }
        }
        if let Some(secs) = read_env_u64("PULSE_RETRY_INTERVAL_SECS", 1, 3600) {
            self.retry_interval = Duration::from_secs(secs);
        }
        if let Some(n) = read_env_u64("PULSE_MAX_RETRIES", 1, 10_000) {
            self.max_retries = u32::try_from(n).unwrap_or(u32::MAX);
        }
        self
    }
}

/// Read an integer env var, enforcing `[min, max]`. Out-of-range or
/// unparseable values are ignored with a warning.
fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.parse::<u64>() {
        Ok(v) if (min..=max).contains(&v) => Some(v),
        Ok(v) => {
            tracing::warn!(name, value = v, min, max, "env override out of range, ignoring");
            None
        }
        Err(_) => {
            tracing::warn!(name, raw, "env override not an integer, ignoring");
            None
        }
    }
}
