//! # parley-query
//!
//! HTTP client for the query/report API.
//!
//! A natural-language question goes out as a [`QueryRequest`]; the answer
//! comes back as one of the [`QueryResponse`] shapes: inline text, a table,
//! a base64 spreadsheet to save locally, or a background-job descriptor whose
//! room the caller should follow on the push channel.

#![deny(unsafe_code)]

pub mod client;
pub mod errors;
pub mod types;

pub use client::{QueryApi, QueryClient};
pub use errors::{QueryError, SpreadsheetError};
pub use types::{JobTicket, QueryRequest, QueryResponse, Spreadsheet, Table};
