//! Events streamed by the code-generation endpoint.

use serde::{Deserialize, Serialize};

use crate::chat::ChatMessage;

/// One decoded record of a generation stream.
///
/// On the wire each record is a JSON object tagged by its `type` field:
/// `{"type":"code_line","line":"..."}`, `{"type":"chat","message":{...}}`
/// or `{"type":"complete"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// One line of generated source, in emission order.
    CodeLine { line: String },

    /// Assistant text for the session's status entry. The latest one wins.
    Chat { message: ChatMessage },

    /// Terminal marker. The server also echoes the full code, which
    /// consumers may ignore in favour of their own line buffer.
    Complete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },

    /// Any `type` this client does not know about.
    #[serde(other)]
    Unknown,
}

impl StreamEvent {
    pub fn code_line(line: impl Into<String>) -> Self {
        Self::CodeLine { line: line.into() }
    }

    pub fn chat(content: impl Into<String>) -> Self {
        Self::Chat {
            message: ChatMessage::bot(content),
        }
    }

    pub fn complete() -> Self {
        Self::Complete { code: None }
    }

    /// Wire name of the event kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CodeLine { .. } => "code_line",
            Self::Chat { .. } => "chat",
            Self::Complete { .. } => "complete",
            Self::Unknown => "unknown",
        }
    }
}
