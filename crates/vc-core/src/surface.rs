//! Sinks a generation session writes into: the editor, the preview and
//! the chat log.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use vc_protocol::{ChatMessage, ChatRole};

/// A text editor holding the current code.
pub trait EditorSurface: Send {
    fn text(&self) -> String;
    fn set_text(&mut self, text: &str);
}

/// Renders raw HTML/JS in isolation from the rest of the app.
pub trait PreviewRenderer: Send {
    fn render(&mut self, document: &str) -> io::Result<()>;
}

/// Handle to one entry of a `ChatLog`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(usize);

/// One displayed chat entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    pub role: ChatRole,
    pub content: String,
    /// Whether the in-progress indicator is shown next to the entry.
    pub loading: bool,
}

/// The chat panel. Entries are updated in place through their `EntryId`.
pub trait ChatLog: Send {
    fn append(&mut self, role: ChatRole, content: &str, loading: bool) -> EntryId;
    /// Replace an entry's text and indicator. Unknown ids are ignored.
    fn update(&mut self, id: EntryId, content: &str, loading: bool);
    fn clear(&mut self);
    fn entries(&self) -> Vec<ChatEntry>;

    /// The transcript as persisted: role and text, no indicator.
    fn messages(&self) -> Vec<ChatMessage> {
        self.entries()
            .into_iter()
            .map(|entry| ChatMessage::new(entry.role, entry.content))
            .collect()
    }
}

/// In-memory editor that publishes every change.
#[derive(Debug)]
pub struct TextBuffer {
    text: String,
    changes: watch::Sender<String>,
}

impl TextBuffer {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let (changes, _) = watch::channel(text.clone());
        Self { text, changes }
    }

    /// Receive the editor text after every change.
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.changes.subscribe()
    }
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl EditorSurface for TextBuffer {
    fn text(&self) -> String {
        self.text.clone()
    }

    fn set_text(&mut self, text: &str) {
        if self.text == text {
            return;
        }
        self.text = text.to_string();
        self.changes.send_replace(self.text.clone());
    }
}

/// What a `MemoryPreview` has been asked to show so far.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub document: String,
    pub renders: usize,
}

/// Preview that keeps the last document and counts renders.
///
/// Clones share state, so a handle kept outside the workbench observes
/// every render.
#[derive(Debug, Default, Clone)]
pub struct MemoryPreview {
    inner: Arc<Mutex<Rendered>>,
}

impl MemoryPreview {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Rendered {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PreviewRenderer for MemoryPreview {
    fn render(&mut self, document: &str) -> io::Result<()> {
        let mut rendered = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        rendered.document = document.to_string();
        rendered.renders += 1;
        Ok(())
    }
}

/// Preview written to an HTML file a browser can open.
#[derive(Debug, Clone)]
pub struct HtmlFilePreview {
    path: PathBuf,
}

impl HtmlFilePreview {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreviewRenderer for HtmlFilePreview {
    fn render(&mut self, document: &str) -> io::Result<()> {
        write_atomic(&self.path, document.as_bytes())
    }
}

/// Write through a temp file in the same directory, then rename.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    use std::io::Write;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Chat log kept in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryChatLog {
    entries: Vec<ChatEntry>,
    /// Entries before this offset were cleared; ids stay unique across clears.
    base: usize,
}

impl MemoryChatLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChatLog for MemoryChatLog {
    fn append(&mut self, role: ChatRole, content: &str, loading: bool) -> EntryId {
        self.entries.push(ChatEntry {
            role,
            content: content.to_string(),
            loading,
        });
        EntryId(self.base + self.entries.len() - 1)
    }

    fn update(&mut self, id: EntryId, content: &str, loading: bool) {
        let Some(index) = id.0.checked_sub(self.base) else {
            return;
        };
        if let Some(entry) = self.entries.get_mut(index) {
            entry.content = content.to_string();
            entry.loading = loading;
        }
    }

    fn clear(&mut self) {
        self.base += self.entries.len();
        self.entries.clear();
    }

    fn entries(&self) -> Vec<ChatEntry> {
        self.entries.clone()
    }
}
