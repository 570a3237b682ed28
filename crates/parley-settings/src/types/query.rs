//! Query API settings.

use serde::{Deserialize, Serialize};

/// Settings for the natural-language query API client.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuerySettings {
    /// Base URL of the query service.
    pub base_url: String,
    /// Path of the query endpoint, appended to `base_url`.
    pub path: String,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Caller identity sent with every query.
    pub user_id: String,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            path: "/query".to_string(),
            timeout_ms: 120_000,
            user_id: "anonymous".to_string(),
        }
    }
}

impl QuerySettings {
    /// Full endpoint URL with exactly one slash between base and path.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }
}
