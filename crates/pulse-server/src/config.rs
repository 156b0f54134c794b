//! Server configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the Pulse gateway.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Interval between server-initiated Ping frames, in seconds.
    pub heartbeat_interval_secs: u64,
    /// Close the connection after this long without a Pong, in seconds.
    pub heartbeat_timeout_secs: u64,
    /// Capacity of each client's outbound send channel.
    pub send_channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 60,
            send_channel_capacity: 1024,
        }
    }
}

impl ServerConfig {
    /// Apply `PULSE_*` environment variable overrides.
    ///
    /// Invalid values are ignored, keeping the existing setting.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("PULSE_HOST") {
            if !v.trim().is_empty() {
                self.host = v;
            }
        }
        if let Some(v) = read_env_u64("PULSE_PORT", 0, 65535) {
            self.port = u16::try_from(v).unwrap_or(self.port);
        }
        if let Some(v) = read_env_u64("PULSE_HEARTBEAT_INTERVAL_SECS", 1, 3600) {
            self.heartbeat_interval_secs = v;
        }
        if let Some(v) = read_env_u64("PULSE_HEARTBEAT_TIMEOUT_SECS", 1, 86_400) {
            self.heartbeat_timeout_secs = v;
        }
        self
    }
}

/// Read an integer env var, rejecting values outside `[min, max]`.
fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    let parsed: u64 = raw.trim().parse().ok()?;
    (min..=max).contains(&parsed).then_some(parsed)
}
