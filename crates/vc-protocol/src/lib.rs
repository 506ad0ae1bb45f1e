//! vc-protocol: Shared wire types for vibecode.
//!
//! This crate defines the records exchanged with the code-generation server:
//! the streamed generation events, chat messages, and the JSON bodies of the
//! auxiliary endpoints.

pub mod api;
pub mod chat;
pub mod event;

pub use api::{Ack, ErrorBody, GenerateRequest, HistoryQuery, SaveChangesRequest};
pub use chat::{ChatMessage, ChatRole, HistoryEntry, SavedChat};
pub use event::StreamEvent;
