//! Connection manager configuration.

use parley_settings::RealtimeSettings;

/// Runtime configuration for a [`crate::ConnectionManager`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RealtimeConfig {
    /// WebSocket endpoint of the push channel.
    pub url: String,
    /// Automatic reconnect attempts before giving up.
    pub max_attempts: u32,
    /// Delay before the first reconnect attempt, in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound for any reconnect delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Whether a manual `connect()` clears an exhausted retry budget.
    pub reset_budget_on_connect: bool,
    /// Registry size at which a warning is logged about retained rooms.
    pub room_warn_threshold: usize,
}

impl RealtimeConfig {
    /// Config for `url` with every other field at its default.
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self::from(&RealtimeSettings::default())
    }
}

impl From<&RealtimeSettings> for RealtimeConfig {
    fn from(settings: &RealtimeSettings) -> Self {
        Self {
            url: settings.ws_url.clone(),
            max_attempts: settings.max_reconnect_attempts,
            base_delay_ms: settings.base_delay_ms,
            max_delay_ms: settings.max_delay_ms,
            reset_budget_on_connect: settings.reset_budget_on_connect,
            room_warn_threshold: settings.room_warn_threshold,
        }
    }
}
