use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use vc_client::{Timeouts, DEFAULT_BASE_URL};

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub preview: PreviewConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the code-generation server.
    pub base_url: String,
    pub connect_timeout_secs: u64,
    /// Upper bound for a whole request, including a generation stream.
    pub request_timeout_secs: u64,
    /// Entries fetched by `history` when no limit is given.
    pub history_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 300,
            history_limit: 20,
        }
    }
}

impl ServerConfig {
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            connect: Duration::from_secs(self.connect_timeout_secs),
            request: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Custom store path. Defaults to ~/.local/share/vibecode/store.json.
    pub path: Option<String>,
}

impl StorageConfig {
    pub fn resolve_path(&self) -> PathBuf {
        match self.path {
            Some(ref custom) => PathBuf::from(custom),
            None => data_dir().join("store.json"),
        }
    }
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct PreviewConfig {
    /// Custom preview file. Defaults to ~/.local/share/vibecode/preview.html.
    pub path: Option<String>,
}

impl PreviewConfig {
    pub fn resolve_path(&self) -> PathBuf {
        match self.path {
            Some(ref custom) => PathBuf::from(custom),
            None => data_dir().join("preview.html"),
        }
    }
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive; `RUST_LOG` takes precedence.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl Config {
    pub fn load_or_default() -> Self {
        Self::load_from_or_default(&config_path())
    }

    /// Load `path`; a missing or unparsable file yields the defaults.
    pub fn load_from_or_default(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "failed to parse config");
                Config::default()
            }),
            Err(_) => Config::default(),
        }
    }
}

fn data_dir() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("vibecode")
}

pub fn config_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("vibecode").join("config.toml")
}
