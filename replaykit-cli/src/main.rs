//! Developer CLI for ReplayKit.
//!
//! Drives a replay-management API through `replaykit-core`: the session is
//! persisted in a JSON file, so credentials (and transparent refresh)
//! survive between invocations.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use clap::{Parser, Subcommand};
use eyre::{bail, eyre, Result, WrapErr};
use replaykit_core::storage::{self, KeyValueStore};
use replaykit_core::{
    ApiClient, ProgressFn, ReplayFilterUpdate, ReplayStore, Session, SessionManager, StatsStore,
};
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "replaykit",
    version,
    about = "Developer CLI for replay-management services"
)]
struct Cli {
    /// API base URL, e.g. https://replay.example.com
    #[arg(long, env = "REPLAYKIT_BASE_URL")]
    base_url: String,

    /// Session file; defaults to the per-user config directory.
    #[arg(long, env = "REPLAYKIT_SESSION_FILE")]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Authenticate and persist the session.
    Login {
        /// Account username.
        username: String,
        /// Account password.
        password: String,
    },
    /// Invalidate the session server-side and clear it locally.
    Logout,
    /// Show the authenticated profile.
    Whoami,
    /// Replay collection operations.
    #[command(subcommand)]
    Replays(ReplaysCommand),
    /// Dashboard statistics.
    Stats,
    /// Show or set the persisted locale preference.
    Locale {
        /// Locale tag to persist, e.g. `pt-BR`; omit to print the current one.
        tag: Option<String>,
    },
}

#[derive(Subcommand)]
enum ReplaysCommand {
    /// List replays with pagination and filters.
    List {
        /// 1-based page to show.
        #[arg(long, default_value_t = 1)]
        page: u64,
        /// Items per page.
        #[arg(long, default_value_t = 20)]
        page_size: u64,
        /// Free-text search.
        #[arg(long)]
        query: Option<String>,
        /// Filter by owner username.
        #[arg(long)]
        username: Option<String>,
        /// Filter by status (active, archived, deleted).
        #[arg(long)]
        status: Option<String>,
    },
    /// Show one replay.
    Show {
        /// Replay identifier.
        id: Uuid,
    },
    /// Delete a replay.
    Delete {
        /// Replay identifier.
        id: Uuid,
        /// Permanently delete the stored file.
        #[arg(long)]
        hard: bool,
    },
    /// Upload a recording.
    Upload {
        /// Path to the recording file.
        path: PathBuf,
    },
    /// Print the playback streaming URL.
    StreamUrl {
        /// Replay identifier.
        id: Uuid,
    },
}

/// JSON-file-backed key-value store, so the session survives invocations.
struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStore {
    fn open(path: PathBuf) -> Self {
        let entries = std::fs::read_to_string(&path)
            .ok()
            .and_then(|contents| serde_json::from_str(&contents).ok())
            .unwrap_or_default();
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, entries: &HashMap<String, String>) {
        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match serde_json::to_string_pretty(entries) {
            Ok(contents) => {
                if let Err(err) = std::fs::write(&self.path, contents) {
                    tracing::warn!("failed to persist session file: {err}");
                }
            }
            Err(err) => tracing::warn!("failed to encode session file: {err}"),
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self.lock();
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries);
    }

    fn remove(&self, key: &str) {
        let mut entries = self.lock();
        entries.remove(key);
        self.persist(&entries);
    }
}

fn default_session_file() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("replaykit").join("session.json"))
        .ok_or_else(|| eyre!("no config directory available; pass --session-file"))
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let session_file = match cli.session_file {
        Some(path) => path,
        None => default_session_file()?,
    };
    let store = Arc::new(FileStore::open(session_file));
    let session = Arc::new(Session::new(Arc::clone(&store) as Arc<dyn KeyValueStore>));
    let api = Arc::new(ApiClient::new(&cli.base_url, session));
    let auth = SessionManager::new(Arc::clone(&api));

    match cli.command {
        Command::Login { username, password } => {
            if auth.login(&username, &password).await {
                println!("logged in as {}", auth.session().display_name());
            } else {
                bail!(auth.error().unwrap_or_else(|| "login failed".to_string()));
            }
        }
        Command::Logout => {
            auth.logout().await;
            println!("logged out");
        }
        Command::Whoami => {
            auth.init().await;
            match auth.session().profile() {
                Some(profile) => println!("{}", serde_json::to_string_pretty(&profile)?),
                None => bail!("not authenticated; run `replaykit login` first"),
            }
        }
        Command::Replays(command) => run_replays(command, &api).await?,
        Command::Stats => {
            let stats = StatsStore::new(Arc::clone(&api));
            stats.fetch_all().await;
            if let Some(error) = stats.error() {
                bail!(error);
            }
            println!("{}", serde_json::to_string_pretty(&stats.overview())?);
            println!("{}", serde_json::to_string_pretty(&stats.top_users())?);
            println!("{}", serde_json::to_string_pretty(&stats.replays_over_time())?);
        }
        Command::Locale { tag } => match tag {
            Some(tag) => {
                storage::set_locale(store.as_ref(), &tag);
                println!("locale set to {tag}");
            }
            None => println!(
                "{}",
                storage::locale(store.as_ref()).unwrap_or_else(|| "unset".to_string())
            ),
        },
    }

    Ok(())
}

async fn run_replays(command: ReplaysCommand, api: &Arc<ApiClient>) -> Result<()> {
    let replays = ReplayStore::new(Arc::clone(api));

    match command {
        ReplaysCommand::List {
            page,
            page_size,
            query,
            username,
            status,
        } => {
            replays.set_page_size(page_size);
            replays.set_filters(ReplayFilterUpdate {
                query,
                username,
                status,
                ..ReplayFilterUpdate::default()
            });
            // the first fetch establishes the total, which bounds page jumps
            replays.fetch().await;
            if page > 1 {
                replays.go_to_page(page).await;
            }
            if let Some(error) = replays.error() {
                bail!(error);
            }
            println!("{}", serde_json::to_string_pretty(&replays.items())?);
            println!(
                "page {} of {} ({} total)",
                replays.page(),
                replays.total_pages(),
                replays.total()
            );
        }
        ReplaysCommand::Show { id } => match replays.fetch_one(id).await {
            Some(replay) => println!("{}", serde_json::to_string_pretty(&replay)?),
            None => bail!(replays
                .error()
                .unwrap_or_else(|| format!("replay {id} not found"))),
        },
        ReplaysCommand::Delete { id, hard } => {
            if replays.delete(id, hard).await {
                println!("deleted {id}");
            } else {
                bail!(replays
                    .error()
                    .unwrap_or_else(|| "delete failed".to_string()));
            }
        }
        ReplaysCommand::Upload { path } => {
            let bytes = std::fs::read(&path)
                .wrap_err_with(|| format!("reading {}", path.display()))?;
            let filename = path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("replay.guac")
                .to_string();
            let progress: Arc<ProgressFn> = Arc::new(|percent: u8| {
                eprint!("\rupload: {percent:>3}%");
            });
            let replay = replays.upload(&filename, bytes, Some(progress)).await?;
            eprintln!();
            println!("{}", serde_json::to_string_pretty(&replay)?);
        }
        ReplaysCommand::StreamUrl { id } => println!("{}", replays.stream_url(id)),
    }

    Ok(())
}
