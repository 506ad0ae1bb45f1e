//! Chat transcript types.

use serde::{Deserialize, Deserializer, Serialize};

/// Author of a chat message.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    #[default]
    #[serde(alias = "assistant")]
    Bot,
    System,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Bot => "bot",
            ChatRole::System => "system",
        }
    }

    /// Read a role name as sent by servers. Unrecognised names are `Bot`.
    pub fn from_wire(name: &str) -> Self {
        match name {
            "user" => ChatRole::User,
            "system" => ChatRole::System,
            _ => ChatRole::Bot,
        }
    }
}

/// Missing, null and unrecognised roles all decode to the default.
fn lenient_role<'de, D>(deserializer: D) -> Result<ChatRole, D::Error>
where
    D: Deserializer<'de>,
{
    let name = Option::<String>::deserialize(deserializer)?;
    Ok(name.as_deref().map(ChatRole::from_wire).unwrap_or_default())
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message in a chat transcript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    #[serde(default, deserialize_with = "lenient_role")]
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn bot(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Bot, content)
    }
}

/// A server-side history entry from `GET /chat_history`.
///
/// Accepted edits are logged as `system` entries carrying the saved code
/// and the client timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    #[serde(default, deserialize_with = "lenient_role")]
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// A transcript archived locally under an id (epoch milliseconds).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SavedChat {
    pub id: i64,
    pub chat: Vec<ChatMessage>,
}
