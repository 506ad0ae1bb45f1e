//! Mock event source for testing.
//!
//! Produces the same item sequence the HTTP client would for a given server
//! behaviour, so consumer tests run without a network.

use std::time::Duration;

use async_stream::stream;
use futures::{Stream, StreamExt};
use tokio::time::sleep;
use vc_protocol::{ChatMessage, StreamEvent};

use crate::client::ClientError;
use crate::source::{EventSource, EventStream};

/// Configurable mock responses for testing.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Emit a `code_line` event.
    CodeLine { line: String },
    /// Emit a `chat` event.
    Chat { content: String },
    /// Emit a `complete` event.
    Complete,
    /// Emit an event of a type the client does not know.
    Unknown,
    /// Fail the request with a non-success status (ends the stream).
    ServerError { status: u16, message: Option<String> },
    /// Fail while reading the body (ends the stream).
    StreamError { message: String },
    /// Delay before the next response.
    Delay { ms: u64 },
}

/// Configuration for a mock stream.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Sequence of responses to emit.
    pub responses: Vec<MockResponse>,
    /// Optional delay before each response (ms).
    pub chunk_delay_ms: Option<u64>,
}

impl MockConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses(mut self, responses: Vec<MockResponse>) -> Self {
        self.responses = responses;
        self
    }

    pub fn with_chunk_delay(mut self, ms: u64) -> Self {
        self.chunk_delay_ms = Some(ms);
        self
    }
}

/// Create a stream of generation items from a mock config.
///
/// Nothing is appended implicitly: an empty config is a stream that closes
/// without a single event.
pub fn mock_stream(
    config: MockConfig,
) -> impl Stream<Item = Result<StreamEvent, ClientError>> + Send + 'static {
    stream! {
        for response in config.responses {
            if let Some(delay_ms) = config.chunk_delay_ms {
                sleep(Duration::from_millis(delay_ms)).await;
            }

            match response {
                MockResponse::CodeLine { line } => {
                    yield Ok(StreamEvent::CodeLine { line });
                }
                MockResponse::Chat { content } => {
                    yield Ok(StreamEvent::Chat { message: ChatMessage::bot(content) });
                }
                MockResponse::Complete => {
                    yield Ok(StreamEvent::complete());
                }
                MockResponse::Unknown => {
                    yield Ok(StreamEvent::Unknown);
                }
                MockResponse::ServerError { status, message } => {
                    yield Err(ClientError::Server { status, message });
                    return;
                }
                MockResponse::StreamError { message } => {
                    yield Err(ClientError::Stream(message));
                    return;
                }
                MockResponse::Delay { ms } => {
                    sleep(Duration::from_millis(ms)).await;
                }
            }
        }
    }
}

/// An `EventSource` replaying the same config for every prompt.
#[derive(Debug, Clone, Default)]
pub struct MockSource {
    config: MockConfig,
}

impl MockSource {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }
}

impl EventSource for MockSource {
    fn generate(&self, _prompt: &str) -> EventStream {
        mock_stream(self.config.clone()).boxed()
    }
}

/// Built-in test fixtures for common scenarios.
pub mod fixtures {
    use super::*;

    fn code_lines<'a>(lines: &'a [&'a str]) -> impl Iterator<Item = MockResponse> + 'a {
        lines.iter().map(|line| MockResponse::CodeLine {
            line: (*line).to_string(),
        })
    }

    /// Code lines followed by `complete`, no chat.
    pub fn code_then_complete(lines: &[&str]) -> MockConfig {
        let mut responses: Vec<_> = code_lines(lines).collect();
        responses.push(MockResponse::Complete);
        MockConfig::new().with_responses(responses)
    }

    /// The server's usual shape: one chat message, the code, then `complete`.
    pub fn chat_then_code(chat: &str, lines: &[&str]) -> MockConfig {
        let mut responses = vec![MockResponse::Chat {
            content: chat.to_string(),
        }];
        responses.extend(code_lines(lines));
        responses.push(MockResponse::Complete);
        MockConfig::new().with_responses(responses)
    }

    /// A non-success status, optionally with an `{"error": ...}` body.
    pub fn server_error(status: u16, message: Option<&str>) -> MockConfig {
        MockConfig::new().with_responses(vec![MockResponse::ServerError {
            status,
            message: message.map(str::to_string),
        }])
    }

    /// Some code, then the connection drops.
    pub fn drop_mid_stream(lines: &[&str], error: &str) -> MockConfig {
        let mut responses: Vec<_> = code_lines(lines).collect();
        responses.push(MockResponse::StreamError {
            message: error.to_string(),
        });
        MockConfig::new().with_responses(responses)
    }

    /// The connection closes before any event arrives.
    pub fn empty() -> MockConfig {
        MockConfig::new()
    }
}
