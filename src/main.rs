//! # Teapot CLI (`teapot`)
//!
//! ## Usage
//!
//! ```bash
//! teapot --config ./config/teapot.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `teapot init` | Create the SQLite storage schema |
//! | `teapot docs add` | Add a reference document from a file or argument |
//! | `teapot docs list` | List stored documents |
//! | `teapot docs show <id>` | Print a document and its chunks |
//! | `teapot docs delete <id>` | Delete a document |
//! | `teapot search "<query>"` | Rank document chunks or session turns |
//! | `teapot context "<query>"` | Print the memory and RAG blocks (`--session <id>`) |
//! | `teapot chat [MESSAGE]` | Send one message, or chat interactively (`--resume`, `--session <id>`) |
//! | `teapot sessions list` | List stored sessions |
//! | `teapot serve` | Start the HTTP server |
//!
//! A missing config file is not an error: every setting has a default.
//! Log verbosity is controlled with `RUST_LOG` (default `teapot_chat=info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use teapot_chat::chat::{self, ChatEngine};
use teapot_chat::config;
use teapot_chat::generation::create_generator;
use teapot_chat::sqlite_store::SqliteKeyValueStore;
use teapot_chat::{library, search, server};

/// Teapot: chat with a small language model, grounded in your own documents.
#[derive(Parser)]
#[command(name = "teapot", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/teapot.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the storage database. Idempotent.
    Init,

    /// Manage reference documents.
    Docs {
        #[command(subcommand)]
        action: DocsAction,
    },

    /// Rank stored passages against a query.
    Search {
        query: String,

        /// Which passages to rank: `docs` or `memory`.
        #[arg(long, default_value = "docs")]
        corpus: String,

        /// Maximum results (defaults to the configured top-k).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Print the memory and RAG blocks that would accompany a message.
    Context {
        query: String,

        /// Draw memory from this session instead of the most recent one.
        #[arg(long)]
        session: Option<String>,
    },

    /// Send a message. Without MESSAGE, reads messages from stdin.
    Chat {
        message: Option<String>,

        /// Continue the most recent session instead of starting a new one.
        #[arg(long, conflicts_with = "session")]
        resume: bool,

        /// Continue the stored session with this id.
        #[arg(long)]
        session: Option<String>,

        /// Print the assembled prompt after each reply.
        #[arg(long)]
        show_prompt: bool,
    },

    /// Inspect chat sessions.
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum DocsAction {
    /// Add a document. The title defaults to the file name or first words.
    Add {
        /// Document text (omit when using --file).
        text: Option<String>,

        #[arg(long)]
        file: Option<PathBuf>,

        #[arg(long)]
        title: Option<String>,
    },
    List,
    Show { id: String },
    Delete { id: String },
}

#[derive(Subcommand)]
enum SessionsAction {
    List,
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("teapot_chat=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging();

    let cfg = config::load_or_default(&cli.config)?;

    let storage = Arc::new(SqliteKeyValueStore::open(&cfg).await?);

    let command = match cli.command {
        Commands::Init => {
            storage.close().await;
            println!("Storage initialized at {}", cfg.storage.path.display());
            return Ok(());
        }
        command => command,
    };

    let generator = create_generator(&cfg.generation)?;
    let engine = Arc::new(ChatEngine::open(cfg, storage.clone(), generator).await?);
    let result = run_command(&engine, command).await;
    storage.close().await;
    result
}

async fn run_command(engine: &Arc<ChatEngine>, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Init => {}
        Commands::Docs { action } => {
            let lib = engine.library();
            match action {
                DocsAction::Add { text, file, title } => {
                    library::run_add(lib, title, file.as_deref(), text).await?;
                }
                DocsAction::List => library::run_list(lib).await?,
                DocsAction::Show { id } => library::run_show(lib, &id).await?,
                DocsAction::Delete { id } => library::run_delete(lib, &id).await?,
            }
        }
        Commands::Search {
            query,
            corpus,
            limit,
        } => {
            search::run_search(engine, &query, &corpus, limit).await?;
        }
        Commands::Context { query, session } => {
            match session {
                Some(id) => engine.switch_session(&id).await?,
                None => {
                    engine.resume_latest().await;
                }
            }
            chat::run_context(engine, &query).await?;
        }
        Commands::Chat {
            message,
            resume,
            session,
            show_prompt,
        } => {
            if let Some(id) = session {
                engine.switch_session(&id).await?;
            } else if resume && !engine.resume_latest().await {
                tracing::info!("no stored session to resume, starting a new one");
            }
            chat::run_chat(engine, message, show_prompt).await?;
        }
        Commands::Sessions {
            action: SessionsAction::List,
        } => {
            chat::run_list_sessions(engine).await?;
        }
        Commands::Serve => {
            server::run_server(engine.clone()).await?;
        }
    }

    Ok(())
}
