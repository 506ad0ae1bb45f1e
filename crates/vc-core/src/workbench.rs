//! Application state shared by the stream consumer and the front end.

use std::sync::Arc;

use tokio::sync::Mutex;
use vc_protocol::{ChatMessage, ChatRole};

use crate::surface::{ChatLog, EditorSurface, EntryId, PreviewRenderer};

/// Status text shown while a session waits for its first event.
pub const GENERATING: &str = "Generating code...";

/// Which pane is in front.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ViewMode {
    #[default]
    Editor,
    Preview,
}

impl ViewMode {
    pub fn toggled(self) -> Self {
        match self {
            ViewMode::Editor => ViewMode::Preview,
            ViewMode::Preview => ViewMode::Editor,
        }
    }
}

/// Identifies one prompt submission. Later submissions get larger ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What `begin_session` hands to the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTicket {
    pub id: SessionId,
    /// The bot entry this session updates in place.
    pub status: EntryId,
}

/// Editor, preview and chat panel, plus the view and session bookkeeping.
pub struct Workbench {
    editor: Box<dyn EditorSurface>,
    preview: Box<dyn PreviewRenderer>,
    chat: Box<dyn ChatLog>,
    view: ViewMode,
    last_session: u64,
    last_rendered: Option<String>,
}

/// A workbench shared between concurrently running sessions.
pub type SharedWorkbench = Arc<Mutex<Workbench>>;

impl Workbench {
    pub fn new(
        editor: impl EditorSurface + 'static,
        preview: impl PreviewRenderer + 'static,
        chat: impl ChatLog + 'static,
    ) -> Self {
        Self {
            editor: Box::new(editor),
            preview: Box::new(preview),
            chat: Box::new(chat),
            view: ViewMode::Editor,
            last_session: 0,
            last_rendered: None,
        }
    }

    pub fn into_shared(self) -> SharedWorkbench {
        Arc::new(Mutex::new(self))
    }

    /// Start a new session for `prompt`, superseding any earlier one.
    ///
    /// Appends the user's message and the session's status entry with the
    /// in-progress indicator on.
    pub fn begin_session(&mut self, prompt: &str) -> SessionTicket {
        self.last_session += 1;
        self.chat.append(ChatRole::User, prompt, false);
        let status = self.chat.append(ChatRole::Bot, GENERATING, true);
        SessionTicket {
            id: SessionId(self.last_session),
            status,
        }
    }

    /// Whether `id` is the most recent session.
    pub fn is_current(&self, id: SessionId) -> bool {
        id.0 == self.last_session
    }

    pub fn code(&self) -> String {
        self.editor.text()
    }

    pub fn set_code(&mut self, code: &str) {
        self.editor.set_text(code);
    }

    /// Render the editor content, unless it is what the preview already shows.
    pub fn refresh_preview(&mut self) {
        let document = self.editor.text();
        if self.last_rendered.as_deref() == Some(document.as_str()) {
            return;
        }
        match self.preview.render(&document) {
            Ok(()) => self.last_rendered = Some(document),
            Err(e) => tracing::warn!(error = %e, "preview render failed"),
        }
    }

    pub fn view(&self) -> ViewMode {
        self.view
    }

    /// Bring a pane to the front. Showing the preview refreshes it.
    pub fn switch_view(&mut self, view: ViewMode) {
        self.view = view;
        if view == ViewMode::Preview {
            self.refresh_preview();
        }
    }

    pub fn toggle_view(&mut self) -> ViewMode {
        let next = self.view.toggled();
        self.switch_view(next);
        next
    }

    pub fn add_message(&mut self, role: ChatRole, content: &str) -> EntryId {
        self.chat.append(role, content, false)
    }

    pub fn update_entry(&mut self, id: EntryId, content: &str, loading: bool) {
        self.chat.update(id, content, loading);
    }

    pub fn chat(&self) -> &dyn ChatLog {
        self.chat.as_ref()
    }

    pub fn clear_chat(&mut self) {
        self.chat.clear();
    }

    /// Replace the chat panel with a stored transcript.
    pub fn restore_chat(&mut self, messages: &[ChatMessage]) {
        self.chat.clear();
        for message in messages {
            self.chat.append(message.role, &message.content, false);
        }
    }
}
