//! HTTP client for the vibecode server with streaming code generation.

use std::time::Duration;

use async_stream::stream;
use chrono::{DateTime, SecondsFormat, Utc};
use futures::{Stream, StreamExt};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use thiserror::Error;
use vc_protocol::{
    Ack, ErrorBody, GenerateRequest, HistoryEntry, HistoryQuery, SaveChangesRequest, StreamEvent,
};

use crate::source::{EventSource, EventStream};
use crate::sse::parse_sse_stream;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";

/// Message shown when a failure carries no server-supplied text.
pub const GENERIC_FAILURE: &str = "Sorry, something went wrong. Please try again.";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("server error ({status}): {}", message.as_deref().unwrap_or("no details"))]
    Server { status: u16, message: Option<String> },
    #[error("stream error: {0}")]
    Stream(String),
}

impl ClientError {
    /// Text to show the user: the server's own message when it sent one.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Server {
                message: Some(message),
                ..
            } => message.clone(),
            _ => GENERIC_FAILURE.to_string(),
        }
    }
}

/// Timeouts applied to every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    /// Whole-request limit, including reading a generation stream.
    pub request: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            request: Duration::from_secs(300),
        }
    }
}

/// Client for the code-generation server.
#[derive(Debug, Clone)]
pub struct CodegenClient {
    base_url: String,
    http: Client,
}

fn build_http_client(timeouts: Timeouts) -> Result<Client, ClientError> {
    Ok(Client::builder()
        .timeout(timeouts.request)
        .connect_timeout(timeouts.connect)
        .pool_max_idle_per_host(2)
        .build()?)
}

impl CodegenClient {
    /// Create a client for the server at `base_url` with default timeouts.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_timeouts(base_url, Timeouts::default())
    }

    pub fn with_timeouts(
        base_url: impl Into<String>,
        timeouts: Timeouts,
    ) -> Result<Self, ClientError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            base_url,
            http: build_http_client(timeouts)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Submit a prompt and return the stream of generation events.
    ///
    /// A non-success status becomes a single `ClientError::Server` item.
    /// Malformed record JSON yields `ClientError::Json` and ends the stream.
    pub fn generate(
        &self,
        prompt: &str,
    ) -> impl Stream<Item = Result<StreamEvent, ClientError>> + Send + 'static {
        let http = self.http.clone();
        let url = self.endpoint("generate_code");
        let body = GenerateRequest::new(prompt);

        stream! {
            let response = match http.post(&url).json(&body).send().await {
                Ok(response) => response,
                Err(e) => {
                    yield Err(ClientError::Http(e));
                    return;
                }
            };

            let response = match check_status(response).await {
                Ok(response) => response,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            let mut records = parse_sse_stream(response.bytes_stream());
            while let Some(result) = records.next().await {
                match result {
                    Ok(record) => match serde_json::from_str::<StreamEvent>(&record.data) {
                        Ok(event) => yield Ok(event),
                        Err(e) => {
                            yield Err(ClientError::Json(e));
                            return;
                        }
                    },
                    Err(e) => {
                        yield Err(ClientError::Http(e));
                        return;
                    }
                }
            }
        }
    }

    /// Fetch the server-side chat log, newest first.
    pub async fn chat_history(&self, query: &HistoryQuery) -> Result<Vec<HistoryEntry>, ClientError> {
        let response = self
            .http
            .get(self.endpoint("chat_history"))
            .query(query)
            .send()
            .await?;
        read_json(response).await
    }

    /// Clear the server-side chat state.
    pub async fn reset_chat(&self) -> Result<Ack, ClientError> {
        let response = self.http.post(self.endpoint("reset_chat")).send().await?;
        read_json(response).await
    }

    /// Persist accepted editor content on the server.
    pub async fn save_changes(
        &self,
        code: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Ack, ClientError> {
        let body = SaveChangesRequest {
            code: code.to_string(),
            timestamp: format_timestamp(timestamp),
        };
        let response = self
            .http
            .post(self.endpoint("save_changes"))
            .json(&body)
            .send()
            .await?;
        read_json(response).await
    }
}

impl EventSource for CodegenClient {
    fn generate(&self, prompt: &str) -> EventStream {
        CodegenClient::generate(self, prompt).boxed()
    }
}

/// ISO-8601 UTC with millisecond precision, e.g. `2024-05-01T12:00:00.000Z`.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.bytes().await.unwrap_or_default();
    Err(ClientError::Server {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

/// Extract the non-empty `error` string of a JSON error body, if there is one.
pub fn error_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .map(|body| body.error)
        .filter(|message| !message.is_empty())
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let response = check_status(response).await?;
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}
