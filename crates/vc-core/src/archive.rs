//! Client-side persistence of chats, editor content and the theme.

use std::path::Path;

use vc_protocol::{ChatMessage, SavedChat};

use crate::store::{KeyValueStore, StoreError};

pub const CURRENT_CHAT_KEY: &str = "vibe_current_chat";
pub const SAVED_CHATS_KEY: &str = "vibe_saved_chats";
pub const EDITOR_CONTENT_KEY: &str = "editor-content";
pub const PROJECT_KEY: &str = "saved-code";
pub const THEME_KEY: &str = "theme";

/// File name used when exporting without an explicit path.
pub const DEFAULT_EXPORT_NAME: &str = "vibe-coding-project.txt";

/// Read a JSON list, treating a missing or malformed value as empty.
fn load_list<T: serde::de::DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Vec<T> {
    let Some(raw) = store.get(key) else {
        return Vec::new();
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        tracing::warn!(key, error = %e, "discarding malformed stored value");
        Vec::new()
    })
}

fn save_list<T: serde::Serialize>(
    store: &mut dyn KeyValueStore,
    key: &str,
    items: &[T],
) -> Result<(), StoreError> {
    store.set(key, &serde_json::to_string(items)?)
}

pub fn save_current_chat(
    store: &mut dyn KeyValueStore,
    chat: &[ChatMessage],
) -> Result<(), StoreError> {
    save_list(store, CURRENT_CHAT_KEY, chat)
}

pub fn load_current_chat(store: &dyn KeyValueStore) -> Vec<ChatMessage> {
    load_list(store, CURRENT_CHAT_KEY)
}

/// Start over with an empty current chat.
pub fn new_chat(store: &mut dyn KeyValueStore) -> Result<(), StoreError> {
    store.remove(CURRENT_CHAT_KEY)
}

pub fn saved_chats(store: &dyn KeyValueStore) -> Vec<SavedChat> {
    load_list(store, SAVED_CHATS_KEY)
}

/// Append the current chat to the saved list under `id`.
pub fn archive_current_chat(
    store: &mut dyn KeyValueStore,
    id: i64,
) -> Result<SavedChat, StoreError> {
    let mut all = saved_chats(store);
    let saved = SavedChat {
        id,
        chat: load_current_chat(store),
    };
    all.push(saved.clone());
    save_list(store, SAVED_CHATS_KEY, &all)?;
    Ok(saved)
}

/// Make the saved chat at `index` the current one.
pub fn restore_saved_chat(
    store: &mut dyn KeyValueStore,
    index: usize,
) -> Result<Option<Vec<ChatMessage>>, StoreError> {
    let Some(saved) = saved_chats(store).into_iter().nth(index) else {
        return Ok(None);
    };
    save_current_chat(store, &saved.chat)?;
    Ok(Some(saved.chat))
}

pub fn load_editor_content(store: &dyn KeyValueStore) -> Option<String> {
    store.get(EDITOR_CONTENT_KEY)
}

pub fn save_editor_content(store: &mut dyn KeyValueStore, code: &str) -> Result<(), StoreError> {
    store.set(EDITOR_CONTENT_KEY, code)
}

/// Keep a named snapshot of the project, separate from the autosave.
pub fn save_project(store: &mut dyn KeyValueStore, code: &str) -> Result<(), StoreError> {
    store.set(PROJECT_KEY, code)
}

pub fn load_project(store: &dyn KeyValueStore) -> Option<String> {
    store.get(PROJECT_KEY)
}

/// Write editor content to a file for download.
pub fn export_code(path: &Path, code: &str) -> Result<(), StoreError> {
    std::fs::write(path, code)?;
    Ok(())
}

/// UI colour scheme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored theme; anything but `dark` reads as light.
pub fn load_theme(store: &dyn KeyValueStore) -> Theme {
    match store.get(THEME_KEY).as_deref() {
        Some("dark") => Theme::Dark,
        _ => Theme::Light,
    }
}

pub fn set_theme(store: &mut dyn KeyValueStore, theme: Theme) -> Result<(), StoreError> {
    store.set(THEME_KEY, theme.as_str())
}

pub fn toggle_theme(store: &mut dyn KeyValueStore) -> Result<Theme, StoreError> {
    let next = load_theme(store).toggled();
    set_theme(store, next)?;
    Ok(next)
}
