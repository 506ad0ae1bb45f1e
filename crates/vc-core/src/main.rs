use std::path::PathBuf;

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use thiserror::Error;
use tracing::info;
use vc_client::{ClientError, CodegenClient};
use vc_core::archive::{self, DEFAULT_EXPORT_NAME};
use vc_core::config::{config_path, Config};
use vc_core::logging;
use vc_core::store::{FileStore, KeyValueStore, StoreError};
use vc_core::surface::{HtmlFilePreview, MemoryChatLog, TextBuffer};
use vc_core::{submit, SessionOutcome, Workbench};
use vc_protocol::{ChatMessage, ChatRole, HistoryQuery};

const SAVED: &str = "Changes saved successfully! ✨";
const SAVE_FAILED: &str = "Failed to save changes. Please try again.";

/// vibecode: stream AI-generated code into a local editor and preview.
#[derive(Parser, Debug)]
#[command(name = "vibecode", version, about)]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/vibecode/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Server base URL, overriding the config file.
    #[arg(long, global = true, env = "VIBECODE_SERVER")]
    server: Option<String>,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate code for a prompt, printing lines as they stream in.
    Generate {
        #[arg(required = true)]
        prompt: Vec<String>,
        /// Also write the finished code to this file.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show the server-side chat history, newest first.
    History {
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, value_enum)]
        role: Option<RoleArg>,
    },
    /// Clear the chat on the server and locally.
    Reset,
    /// Send the current editor content to the server as accepted changes.
    Accept,
    /// Manage locally saved chats.
    Chats {
        #[command(subcommand)]
        action: ChatsAction,
    },
    /// Save or load the project snapshot.
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },
    /// Show the theme, or switch between light and dark.
    Theme {
        #[arg(long)]
        toggle: bool,
    },
    /// Write the editor content to a file.
    Export { path: Option<PathBuf> },
}

#[derive(Subcommand, Debug)]
enum ChatsAction {
    /// List saved chats.
    List,
    /// Start a new, empty chat.
    New,
    /// Save the current chat to the list.
    Archive,
    /// Make saved chat N (as numbered by `list`) current.
    Restore { number: usize },
}

#[derive(Subcommand, Debug)]
enum ProjectAction {
    Save,
    Load,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RoleArg {
    User,
    Bot,
    System,
}

impl From<RoleArg> for ChatRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::User => ChatRole::User,
            RoleArg::Bot => ChatRole::Bot,
            RoleArg::System => ChatRole::System,
        }
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("store: {0}")]
    Store(#[from] StoreError),
}

fn main() {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from_or_default(path),
        None => Config::load_or_default(),
    };
    if let Some(server) = &cli.server {
        config.server.base_url = server.clone();
    }

    let filter = if cli.verbose {
        "debug"
    } else {
        config.logging.filter.as_str()
    };
    logging::init(filter);
    let config_file = cli.config.clone().unwrap_or_else(config_path);
    info!(config = %config_file.display(), server = %config.server.base_url, "starting");

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to create async runtime: {e}");
            std::process::exit(1);
        }
    };

    match runtime.block_on(run(&config, cli.command)) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

async fn run(config: &Config, command: Command) -> Result<i32, CliError> {
    let mut store = FileStore::open(config.storage.resolve_path())?;

    match command {
        Command::Generate { prompt, output } => {
            generate(config, &mut store, &prompt.join(" "), output).await
        }
        Command::History { limit, role } => {
            let client = client(config)?;
            let mut query =
                HistoryQuery::default().with_limit(limit.unwrap_or(config.server.history_limit));
            if let Some(role) = role {
                query = query.with_role(role.into());
            }
            let history = client.chat_history(&query).await?;
            if history.is_empty() {
                println!("No chat history.");
            }
            for entry in history {
                println!("[{}] {}", entry.role, entry.content);
            }
            Ok(0)
        }
        Command::Reset => {
            let ack = client(config)?.reset_chat().await?;
            archive::new_chat(&mut store)?;
            println!(
                "{}",
                ack.message.as_deref().unwrap_or("Chat history reset.")
            );
            Ok(0)
        }
        Command::Accept => accept(config, &mut store).await,
        Command::Chats { action } => chats(&mut store, action),
        Command::Project { action } => project(&mut store, action),
        Command::Theme { toggle } => {
            let theme = if toggle {
                archive::toggle_theme(&mut store)?
            } else {
                archive::load_theme(&store)
            };
            println!("{theme}");
            Ok(0)
        }
        Command::Export { path } => {
            let path = path.unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_NAME));
            let code = archive::load_editor_content(&store).unwrap_or_default();
            archive::export_code(&path, &code)?;
            println!("{}", path.display());
            Ok(0)
        }
    }
}

fn client(config: &Config) -> Result<CodegenClient, ClientError> {
    CodegenClient::with_timeouts(&config.server.base_url, config.server.timeouts())
}

async fn generate(
    config: &Config,
    store: &mut dyn KeyValueStore,
    prompt: &str,
    output: Option<PathBuf>,
) -> Result<i32, CliError> {
    let client = client(config)?;

    let editor = TextBuffer::new(archive::load_editor_content(store).unwrap_or_default());
    let mut changes = editor.subscribe();
    let preview_path = config.preview.resolve_path();
    let mut wb = Workbench::new(editor, HtmlFilePreview::new(&preview_path), MemoryChatLog::new());
    wb.restore_chat(&archive::load_current_chat(store));
    let wb = wb.into_shared();

    // Echo code lines as the editor changes; ends when the workbench is dropped.
    let printer = tokio::spawn(async move {
        let mut printed = 0;
        while changes.changed().await.is_ok() {
            let text = changes.borrow_and_update().clone();
            let lines: Vec<&str> = text.split('\n').collect();
            if lines.len() < printed {
                printed = 0;
            }
            for line in &lines[printed..] {
                println!("{line}");
            }
            printed = lines.len();
        }
    });

    let outcome = submit(&wb, &client, prompt).await;

    let (code, messages) = {
        let wb = wb.lock().await;
        (wb.code(), wb.chat().messages())
    };
    drop(wb);
    if let Err(e) = printer.await {
        tracing::warn!(error = %e, "editor echo task failed");
    }

    if let Some(status) = messages.last() {
        eprintln!("[vibecode] {}", status.content);
    }
    archive::save_current_chat(store, &messages)?;
    archive::save_editor_content(store, &code)?;
    if let Some(path) = output {
        archive::export_code(&path, &code)?;
    }
    info!(preview = %preview_path.display(), outcome = ?outcome, "generation finished");

    Ok(match outcome {
        SessionOutcome::Completed | SessionOutcome::Drained => 0,
        SessionOutcome::Skipped => 2,
        SessionOutcome::Failed(_) | SessionOutcome::Superseded => 1,
    })
}

async fn accept(config: &Config, store: &mut dyn KeyValueStore) -> Result<i32, CliError> {
    let code = archive::load_editor_content(store).unwrap_or_default();
    let result = client(config)?.save_changes(&code, Utc::now()).await;

    let (reply, exit) = match result {
        Ok(_) => (SAVED, 0),
        Err(e) => {
            tracing::warn!(error = %e, "saving changes failed");
            (SAVE_FAILED, 1)
        }
    };
    let mut chat = archive::load_current_chat(store);
    chat.push(ChatMessage::bot(reply));
    archive::save_current_chat(store, &chat)?;
    println!("{reply}");
    Ok(exit)
}

fn chats(store: &mut dyn KeyValueStore, action: ChatsAction) -> Result<i32, CliError> {
    match action {
        ChatsAction::List => {
            let all = archive::saved_chats(store);
            if all.is_empty() {
                println!("No saved chats.");
            }
            for (i, saved) in all.iter().enumerate() {
                println!("Chat {} ({} messages)", i + 1, saved.chat.len());
            }
        }
        ChatsAction::New => archive::new_chat(store)?,
        ChatsAction::Archive => {
            let saved = archive::archive_current_chat(store, Utc::now().timestamp_millis())?;
            println!("Saved chat {} ({} messages)", saved.id, saved.chat.len());
        }
        ChatsAction::Restore { number } => {
            let restored = match number.checked_sub(1) {
                Some(index) => archive::restore_saved_chat(store, index)?,
                None => None,
            };
            let Some(chat) = restored else {
                eprintln!("no saved chat {number}");
                return Ok(1);
            };
            for message in chat {
                println!("[{}] {}", message.role, message.content);
            }
        }
    }
    Ok(0)
}

fn project(store: &mut dyn KeyValueStore, action: ProjectAction) -> Result<i32, CliError> {
    match action {
        ProjectAction::Save => {
            let code = archive::load_editor_content(store).unwrap_or_default();
            archive::save_project(store, &code)?;
            println!("Project saved successfully!");
        }
        ProjectAction::Load => match archive::load_project(store) {
            Some(code) => {
                archive::save_editor_content(store, &code)?;
                println!("Project loaded successfully!");
            }
            None => {
                println!("No saved project found!");
                return Ok(1);
            }
        },
    }
    Ok(0)
}
