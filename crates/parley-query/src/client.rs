//! Query API client backed by `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use parley_core::constants::{NAME, VERSION};
use parley_settings::QuerySettings;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::QueryError;
use crate::types::{QueryRequest, QueryResponse};

/// Seam between the chat session and the query backend.
#[async_trait]
pub trait QueryApi: Send + Sync {
    /// Submit one question and wait for the answer.
    async fn query(&self, request: &QueryRequest) -> Result<QueryResponse, QueryError>;
}

/// HTTP client for the query endpoint.
#[derive(Clone, Debug)]
pub struct QueryClient {
    client: reqwest::Client,
    endpoint: String,
}

impl QueryClient {
    /// Build a client from settings.
    pub fn new(settings: &QuerySettings) -> Result<Self, QueryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .user_agent(format!("{NAME}/{VERSION}"))
            .build()?;
        Ok(Self::with_client(client, settings.endpoint()))
    }

    /// Wrap an existing `reqwest` client.
    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// Full URL requests are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl QueryApi for QueryClient {
    async fn query(&self, request: &QueryRequest) -> Result<QueryResponse, QueryError> {
        debug!(endpoint = %self.endpoint, user_id = %request.user_id, "sending query");
        let response = self.client.post(&self.endpoint).json(request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = error_detail(&body)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_owned());
            warn!(status = status.as_u16(), error = %message, "query rejected");
            return Err(QueryError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let answer: QueryResponse = serde_json::from_str(&body)?;
        debug!(kind = response_kind(&answer), "query answered");
        Ok(answer)
    }
}

/// Best-effort error text from a failure body: a `detail`, `message` or
/// `error` string field, else the trimmed body itself.
fn error_detail(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
        for key in ["detail", "message", "error"] {
            if let Some(Value::String(s)) = map.get(key) {
                return Some(s.clone());
            }
        }
    }
    Some(trimmed.to_owned())
}

fn response_kind(answer: &QueryResponse) -> &'static str {
    match answer {
        QueryResponse::Text { .. } => "text",
        QueryResponse::Table(_) => "table",
        QueryResponse::Spreadsheet(_) => "spreadsheet",
        QueryResponse::Job(_) => "job",
    }
}
