//! Settings type definitions.
//!
//! Every struct uses `#[serde(rename_all = "camelCase", default)]` so a
//! partial JSON file fills the gaps from compiled defaults.

mod chat;
mod query;
mod realtime;

pub use chat::ChatSettings;
pub use query::QuerySettings;
pub use realtime::RealtimeSettings;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParleySettings {
    /// Settings schema version.
    pub version: String,
    /// Application name.
    pub name: String,
    /// Push-channel connection settings.
    pub realtime: RealtimeSettings,
    /// Query API settings.
    pub query: QuerySettings,
    /// Chat front-end settings.
    pub chat: ChatSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

impl Default for ParleySettings {
    fn default() -> Self {
        Self {
            version: parley_core::constants::VERSION.to_string(),
            name: parley_core::constants::NAME.to_string(),
            realtime: RealtimeSettings::default(),
            query: QuerySettings::default(),
            chat: ChatSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl ParleySettings {
    /// Reject values that would make the client unusable.
    pub fn validate(&self) -> Result<()> {
        if self.realtime.ws_url.trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "realtime.wsUrl must not be empty".into(),
            ));
        }
        if !self.realtime.ws_url.starts_with("ws://") && !self.realtime.ws_url.starts_with("wss://")
        {
            return Err(SettingsError::InvalidValue(format!(
                "realtime.wsUrl must use ws:// or wss://, got {}",
                self.realtime.ws_url
            )));
        }
        if self.realtime.base_delay_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "realtime.baseDelayMs must be positive".into(),
            ));
        }
        if self.realtime.max_delay_ms < self.realtime.base_delay_ms {
            return Err(SettingsError::InvalidValue(
                "realtime.maxDelayMs must be >= realtime.baseDelayMs".into(),
            ));
        }
        if self.query.base_url.trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "query.baseUrl must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level (`RUST_LOG` syntax). `RUST_LOG` itself wins when set.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
