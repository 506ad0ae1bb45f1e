//! Stream consumer: applies one prompt's generation events to the workbench
//! as they arrive.
//!
//! Every session owns a code buffer and a single chat status entry. Events
//! are applied in arrival order and never wait for the end of the body:
//!
//! - `code_line` appends to the buffer, rewrites the editor with the buffer
//!   joined by `\n`, and refreshes the preview
//! - `chat` replaces the status text, keeping the in-progress indicator
//! - `complete` rewrites the editor, refreshes the preview, brings the
//!   preview to the front and finalizes the status entry
//!
//! Only the most recent session may touch the workbench. An older session
//! notices it has been superseded before applying its next event, drops its
//! stream and finalizes its own status entry.

use futures::StreamExt;
use tracing::{debug, info, warn};
use vc_client::EventSource;
use vc_protocol::StreamEvent;

use crate::workbench::{SessionId, SessionTicket, SharedWorkbench, ViewMode, Workbench};

pub use vc_client::GENERIC_FAILURE;

/// Status text after `complete` when no `chat` event arrived.
pub const COMPLETE: &str = "Code generation complete.";

/// Status text when the stream closed without any `chat` event or `complete`.
pub const STILL_GENERATING: &str = "Code generating...";

/// Status text of a session replaced by a newer prompt.
pub const SUPERSEDED: &str = "Superseded by a newer prompt.";

/// How a submission ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The prompt was blank; nothing was sent.
    Skipped,
    /// A `complete` event was applied.
    Completed,
    /// The stream closed without `complete`.
    Drained,
    /// The request or the stream failed; carries the message shown.
    Failed(String),
    /// A newer submission took over before this one finished.
    Superseded,
}

/// State of one prompt submission.
#[derive(Debug)]
pub struct Session {
    ticket: SessionTicket,
    code_lines: Vec<String>,
    got_first_chat: bool,
    final_chat_text: String,
    completed: bool,
}

impl Session {
    pub fn new(ticket: SessionTicket) -> Self {
        Self {
            ticket,
            code_lines: Vec::new(),
            got_first_chat: false,
            final_chat_text: String::new(),
            completed: false,
        }
    }

    pub fn id(&self) -> SessionId {
        self.ticket.id
    }

    /// The code buffer joined by newlines.
    pub fn code(&self) -> String {
        self.code_lines.join("\n")
    }

    pub fn got_first_chat(&self) -> bool {
        self.got_first_chat
    }

    pub fn completed(&self) -> bool {
        self.completed
    }

    /// Apply one event's effect to the workbench.
    pub fn apply(&mut self, wb: &mut Workbench, event: &StreamEvent) {
        debug!(session = %self.ticket.id, kind = event.kind(), "applying event");

        match event {
            StreamEvent::CodeLine { line } => {
                self.code_lines.push(line.clone());
                wb.set_code(&self.code());
                wb.refresh_preview();
            }
            StreamEvent::Chat { message } => {
                self.got_first_chat = true;
                self.final_chat_text = message.content.clone();
                wb.update_entry(self.ticket.status, &self.final_chat_text, true);
            }
            StreamEvent::Complete { .. } => {
                self.completed = true;
                wb.set_code(&self.code());
                wb.refresh_preview();
                wb.switch_view(ViewMode::Preview);
                let text = if self.final_chat_text.is_empty() {
                    COMPLETE
                } else {
                    self.final_chat_text.as_str()
                };
                wb.update_entry(self.ticket.status, text, false);
            }
            StreamEvent::Unknown => {
                debug!(session = %self.ticket.id, "ignoring event of unknown type");
            }
        }
    }

    /// Settle the status entry once the stream has closed.
    pub fn finish(&self, wb: &mut Workbench) -> SessionOutcome {
        if !self.got_first_chat {
            if !self.completed {
                wb.update_entry(self.ticket.status, STILL_GENERATING, false);
            }
        } else if !self.completed {
            wb.update_entry(self.ticket.status, &self.final_chat_text, false);
        }

        if self.completed {
            SessionOutcome::Completed
        } else {
            SessionOutcome::Drained
        }
    }

    /// Show a failure in the status entry. Applied code stays.
    pub fn fail(&self, wb: &mut Workbench, message: &str) {
        wb.update_entry(self.ticket.status, message, false);
    }

    /// Finalize the status entry of a session that lost to a newer one.
    pub fn supersede(&self, wb: &mut Workbench) {
        wb.update_entry(self.ticket.status, SUPERSEDED, false);
    }
}

/// Submit `prompt` to `source` and apply the resulting events to `wb`.
///
/// Blank prompts are discarded without a request. The workbench lock is
/// taken per event and never held while waiting on the stream.
///
/// A superseded session notices only when its next item arrives or its
/// stream ends. If that stream stalls, its status entry stays in progress
/// until the request timeout.
pub async fn submit<S>(wb: &SharedWorkbench, source: &S, prompt: &str) -> SessionOutcome
where
    S: EventSource + ?Sized,
{
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return SessionOutcome::Skipped;
    }

    let ticket = wb.lock().await.begin_session(prompt);
    let mut session = Session::new(ticket);
    info!(session = %ticket.id, "session started");

    let mut events = source.generate(prompt);
    while let Some(item) = events.next().await {
        let mut wb = wb.lock().await;
        if !wb.is_current(session.id()) {
            info!(session = %ticket.id, "session superseded, dropping stream");
            session.supersede(&mut wb);
            return SessionOutcome::Superseded;
        }

        match item {
            Ok(event) => session.apply(&mut wb, &event),
            Err(e) => {
                warn!(session = %ticket.id, error = %e, "session failed");
                let message = e.user_message();
                session.fail(&mut wb, &message);
                return SessionOutcome::Failed(message);
            }
        }
    }

    let mut wb = wb.lock().await;
    if !wb.is_current(session.id()) {
        session.supersede(&mut wb);
        return SessionOutcome::Superseded;
    }
    let outcome = session.finish(&mut wb);
    info!(
        session = %ticket.id,
        outcome = ?outcome,
        lines = session.code_lines.len(),
        "session finished"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{ChatEntry, MemoryChatLog, MemoryPreview, TextBuffer};
    use vc_client::mock::{fixtures, MockConfig, MockResponse, MockSource};
    use vc_protocol::ChatRole;

    fn workbench(code: &str) -> (SharedWorkbench, MemoryPreview) {
        let preview = MemoryPreview::new();
        let wb = Workbench::new(TextBuffer::new(code), preview.clone(), MemoryChatLog::new());
        (wb.into_shared(), preview)
    }

    async fn status(wb: &SharedWorkbench) -> ChatEntry {
        wb.lock().await.chat().entries().last().cloned().unwrap()
    }

    fn detached(code: &str) -> (Workbench, Session) {
        let mut wb = Workbench::new(TextBuffer::new(code), MemoryPreview::new(), MemoryChatLog::new());
        let ticket = wb.begin_session("prompt");
        (wb, Session::new(ticket))
    }

    #[test]
    fn code_lines_build_editor_prefixes() {
        let (mut wb, mut session) = detached("");
        let lines = ["<ul>", "  <li>one</li>", "</ul>"];

        for (i, line) in lines.iter().enumerate() {
            session.apply(&mut wb, &StreamEvent::code_line(*line));
            assert_eq!(wb.code(), lines[..=i].join("\n"));
        }
    }

    #[test]
    fn chat_replaces_status_without_appending() {
        let (mut wb, mut session) = detached("");
        session.apply(&mut wb, &StreamEvent::chat("first"));
        session.apply(&mut wb, &StreamEvent::chat("second"));

        let entries = wb.chat().entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].content, "second");
        assert!(entries[1].loading);
    }

    #[test]
    fn chat_with_unrecognised_role_sets_status() {
        let (mut wb, mut session) = detached("");
        for json in [
            r#"{"type":"chat","message":{"role":"ai","content":"Working on it"}}"#,
            r#"{"type":"chat","message":{"role":null,"content":"Almost there"}}"#,
        ] {
            let event: StreamEvent = serde_json::from_str(json).unwrap();
            session.apply(&mut wb, &event);
        }
        session.apply(&mut wb, &StreamEvent::complete());

        let entries = wb.chat().entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].content, "Almost there");
        assert!(!entries[1].loading);
    }

    #[test]
    fn unknown_event_changes_nothing() {
        let (mut wb, mut session) = detached("kept");
        let before = wb.chat().entries();
        session.apply(&mut wb, &StreamEvent::Unknown);
        assert_eq!(wb.code(), "kept");
        assert_eq!(wb.chat().entries(), before);
        assert_eq!(wb.view(), ViewMode::Editor);
    }

    #[test]
    fn complete_uses_own_buffer_not_server_code() {
        let (mut wb, mut session) = detached("");
        session.apply(&mut wb, &StreamEvent::code_line("a"));
        session.apply(
            &mut wb,
            &StreamEvent::Complete {
                code: Some("something else".to_string()),
            },
        );
        assert_eq!(wb.code(), "a");
    }

    #[test]
    fn empty_chat_text_counts_as_no_text_on_complete() {
        let (mut wb, mut session) = detached("");
        session.apply(&mut wb, &StreamEvent::chat(""));
        session.apply(&mut wb, &StreamEvent::complete());
        assert_eq!(wb.chat().entries()[1].content, COMPLETE);
    }

    #[tokio::test]
    async fn scenario_code_lines_then_complete() {
        let (wb, preview) = workbench("");
        let source = MockSource::new(fixtures::code_then_complete(&[
            "let x=1;",
            "console.log(x);",
        ]));

        let outcome = submit(&wb, &source, "log a variable").await;

        assert_eq!(outcome, SessionOutcome::Completed);
        let guard = wb.lock().await;
        assert_eq!(guard.code(), "let x=1;\nconsole.log(x);");
        assert_eq!(guard.view(), ViewMode::Preview);
        assert_eq!(preview.snapshot().renders, 2);
        assert_eq!(preview.snapshot().document, "let x=1;\nconsole.log(x);");
        let entries = guard.chat().entries();
        assert_eq!(entries[1].content, COMPLETE);
        assert!(!entries[1].loading);
    }

    #[tokio::test]
    async fn scenario_server_error_with_message() {
        let (wb, preview) = workbench("untouched");
        let source = MockSource::new(fixtures::server_error(500, Some("rate limited")));

        let outcome = submit(&wb, &source, "anything").await;

        assert_eq!(outcome, SessionOutcome::Failed("rate limited".to_string()));
        let entry = status(&wb).await;
        assert_eq!(entry.content, "rate limited");
        assert!(!entry.loading);
        assert_eq!(wb.lock().await.code(), "untouched");
        assert_eq!(preview.snapshot().renders, 0);
    }

    #[tokio::test]
    async fn scenario_server_error_unparsable_body() {
        let (wb, _) = workbench("");
        let source = MockSource::new(fixtures::server_error(500, None));

        let outcome = submit(&wb, &source, "anything").await;

        assert_eq!(outcome, SessionOutcome::Failed(GENERIC_FAILURE.to_string()));
        assert_eq!(status(&wb).await.content, GENERIC_FAILURE);
    }

    #[tokio::test]
    async fn scenario_chat_then_code() {
        let (wb, _) = workbench("");
        let source = MockSource::new(fixtures::chat_then_code("Thinking...", &["x=1"]));

        let outcome = submit(&wb, &source, "set x").await;

        assert_eq!(outcome, SessionOutcome::Completed);
        let entry = status(&wb).await;
        assert_eq!(entry.content, "Thinking...");
        assert!(!entry.loading);
        assert_eq!(wb.lock().await.code(), "x=1");
    }

    #[tokio::test]
    async fn scenario_stream_closes_without_events() {
        let (wb, preview) = workbench("previous code");
        let source = MockSource::new(fixtures::empty());

        let outcome = submit(&wb, &source, "anything").await;

        assert_eq!(outcome, SessionOutcome::Drained);
        let entry = status(&wb).await;
        assert_eq!(entry.content, STILL_GENERATING);
        assert!(!entry.loading);
        assert_eq!(wb.lock().await.code(), "previous code");
        assert_eq!(preview.snapshot().renders, 0);
    }

    #[tokio::test]
    async fn chat_without_complete_keeps_chat_text() {
        let (wb, _) = workbench("");
        let source = MockSource::new(MockConfig::new().with_responses(vec![
            MockResponse::Chat {
                content: "Here is a page".to_string(),
            },
            MockResponse::CodeLine {
                line: "<p>".to_string(),
            },
        ]));

        let outcome = submit(&wb, &source, "page").await;

        assert_eq!(outcome, SessionOutcome::Drained);
        let entry = status(&wb).await;
        assert_eq!(entry.content, "Here is a page");
        assert!(!entry.loading);
        assert_eq!(wb.lock().await.view(), ViewMode::Editor);
    }

    #[tokio::test]
    async fn stream_error_keeps_applied_code() {
        let (wb, _) = workbench("");
        let source = MockSource::new(fixtures::drop_mid_stream(&["a", "b"], "connection reset"));

        let outcome = submit(&wb, &source, "anything").await;

        assert_eq!(outcome, SessionOutcome::Failed(GENERIC_FAILURE.to_string()));
        assert_eq!(wb.lock().await.code(), "a\nb");
        assert_eq!(status(&wb).await.content, GENERIC_FAILURE);
    }

    #[tokio::test]
    async fn blank_prompt_is_skipped() {
        let (wb, _) = workbench("");
        let source = MockSource::new(fixtures::code_then_complete(&["x"]));

        assert_eq!(submit(&wb, &source, "   \n").await, SessionOutcome::Skipped);
        assert!(wb.lock().await.chat().entries().is_empty());
    }

    #[tokio::test]
    async fn prompt_is_trimmed_in_chat() {
        let (wb, _) = workbench("");
        let source = MockSource::new(fixtures::code_then_complete(&["x"]));

        submit(&wb, &source, "  make a page \n").await;

        let entries = wb.lock().await.chat().entries();
        assert_eq!(entries[0].role, ChatRole::User);
        assert_eq!(entries[0].content, "make a page");
    }

    #[tokio::test]
    async fn exactly_one_status_entry_per_session() {
        let (wb, _) = workbench("");
        let source = MockSource::new(MockConfig::new().with_responses(vec![
            MockResponse::Chat { content: "a".to_string() },
            MockResponse::Chat { content: "b".to_string() },
            MockResponse::Chat { content: "c".to_string() },
            MockResponse::Complete,
        ]));

        submit(&wb, &source, "p").await;

        let entries = wb.lock().await.chat().entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].content, "c");
    }

    #[tokio::test]
    async fn newer_session_supersedes_older() {
        let (wb, _) = workbench("");
        let slow = MockSource::new(
            MockConfig::new()
                .with_responses(vec![
                    MockResponse::CodeLine { line: "old 1".to_string() },
                    MockResponse::Delay { ms: 50 },
                    MockResponse::CodeLine { line: "old 2".to_string() },
                    MockResponse::Complete,
                ]),
        );
        let fast = MockSource::new(fixtures::code_then_complete(&["new"]));

        let wb_old = wb.clone();
        let old = tokio::spawn(async move { submit(&wb_old, &slow, "first").await });

        // Let the first session apply its first line, then submit again.
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let new = submit(&wb, &fast, "second").await;
        let old = old.await.unwrap();

        assert_eq!(new, SessionOutcome::Completed);
        assert_eq!(old, SessionOutcome::Superseded);

        let guard = wb.lock().await;
        assert_eq!(guard.code(), "new");
        let entries = guard.chat().entries();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[1].content, SUPERSEDED);
        assert!(!entries[1].loading);
        assert_eq!(entries[3].content, COMPLETE);
    }
}
