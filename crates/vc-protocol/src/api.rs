//! Request and response bodies of the HTTP endpoints.

use serde::{Deserialize, Serialize};

use crate::chat::ChatRole;

/// Body of `POST /generate_code`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerateRequest {
    pub prompt: String,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

/// Body of `POST /save_changes`. `timestamp` is ISO-8601.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SaveChangesRequest {
    pub code: String,
    pub timestamp: String,
}

/// Query of `GET /chat_history`.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct HistoryQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<ChatRole>,
}

impl HistoryQuery {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_role(mut self, role: ChatRole) -> Self {
        self.role = Some(role);
        self
    }
}

/// Success acknowledgement returned by the mutating endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ack {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Error body returned alongside a non-success status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
}
