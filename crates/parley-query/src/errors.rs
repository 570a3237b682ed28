//! Query client error types.

use thiserror::Error;

/// Errors from a query round-trip.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The API answered with a non-success status.
    #[error("query API returned {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error detail extracted from the body.
        message: String,
    },

    /// The request could not be sent or the body could not be read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The body was not a recognised response shape.
    #[error("undecodable query response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Errors from saving a spreadsheet payload.
#[derive(Debug, Error)]
pub enum SpreadsheetError {
    /// The payload was not valid base64.
    #[error("invalid spreadsheet payload: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The filename had no usable file-name component.
    #[error("invalid spreadsheet filename: {0:?}")]
    Filename(String),

    /// Writing the file failed.
    #[error("failed to write spreadsheet: {0}")]
    Io(#[from] std::io::Error),
}
