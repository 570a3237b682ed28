//! Chat front-end settings.

use serde::{Deserialize, Serialize};

/// Settings for the chat session and terminal front-end.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatSettings {
    /// Directory where downloaded spreadsheets are written.
    pub download_dir: String,
    /// Connect to the push channel at startup.
    pub auto_connect: bool,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            download_dir: "downloads".to_string(),
            auto_connect: true,
        }
    }
}
