//! Push-channel connection settings.

use parley_core::backoff::{DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY_MS};
use serde::{Deserialize, Serialize};

/// Settings for the realtime connection manager.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RealtimeSettings {
    /// WebSocket endpoint of the push channel.
    pub ws_url: String,
    /// Automatic reconnect attempts before giving up.
    pub max_reconnect_attempts: u32,
    /// Delay before the first reconnect attempt, in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound for any reconnect delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Whether a manual `connect()` clears an exhausted retry budget.
    pub reset_budget_on_connect: bool,
    /// Registry size at which a warning is logged about retained rooms.
    pub room_warn_threshold: usize,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            ws_url: "ws://127.0.0.1:8000/ws".to_string(),
            max_reconnect_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            reset_budget_on_connect: false,
            room_warn_threshold: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = RealtimeSettings::default();
        assert_eq!(s.ws_url, "ws://127.0.0.1:8000/ws");
        assert_eq!(s.max_reconnect_attempts, 5);
        assert_eq!(s.base_delay_ms, 1000);
        assert_eq!(s.max_delay_ms, 30_000);
        assert_eq!(s.room_warn_threshold, 256);
    }
}
