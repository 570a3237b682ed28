//! Request and response shapes of the query API.

use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use parley_core::RoomId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::SpreadsheetError;

/// Body of a query request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The natural-language question.
    pub query: String,
    /// Caller identity.
    pub user_id: String,
}

/// Answer to a query, tagged by `type` on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueryResponse {
    /// Inline prose answer.
    Text {
        /// Answer text.
        message: String,
    },
    /// Tabular data.
    Table(Table),
    /// A spreadsheet to save locally.
    Spreadsheet(Spreadsheet),
    /// A background job; follow its room for progress.
    Job(JobTicket),
}

/// Column headers plus rows of JSON cells.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Column headers.
    pub columns: Vec<String>,
    /// Rows, one cell per column.
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Display text for a cell: strings unquoted, `null` empty.
    pub fn cell_text(cell: &Value) -> String {
        match cell {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Base64 spreadsheet payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spreadsheet {
    /// File contents, base64 (standard alphabet).
    pub file_base64: String,
    /// Suggested file name. Only its last path component is used.
    pub filename: String,
    /// Number of data rows, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
}

impl Spreadsheet {
    /// The file-name component of [`Self::filename`], with any directory
    /// part (either separator) removed.
    pub fn safe_filename(&self) -> Result<&str, SpreadsheetError> {
        let name = self
            .filename
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .trim();
        if name.is_empty() || name == "." || name == ".." {
            return Err(SpreadsheetError::Filename(self.filename.clone()));
        }
        Ok(name)
    }

    /// Decoded file contents.
    pub fn bytes(&self) -> Result<Vec<u8>, SpreadsheetError> {
        Ok(STANDARD.decode(self.file_base64.trim())?)
    }

    /// Decode and write the file under `dir`, creating `dir` if needed.
    /// Returns the written path.
    pub fn save_to(&self, dir: &Path) -> Result<PathBuf, SpreadsheetError> {
        let name = self.safe_filename()?;
        let bytes = self.bytes()?;
        std::fs::create_dir_all(dir)?;
        let path = dir.join(name);
        std::fs::write(&path, &bytes)?;
        tracing::info!(path = %path.display(), bytes = bytes.len(), "spreadsheet saved");
        Ok(path)
    }
}

/// Descriptor of a background job started by a query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTicket {
    /// Room carrying the job's status updates.
    pub room_id: RoomId,
    /// Initial status.
    pub status: String,
    /// Optional human-readable note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
