//! palaver - streaming conversational chat backend.
//!
//! Main entry point for the palaver CLI.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};

use palaver_chat::{BroadcastNotifier, ChatService};
use palaver_llm::{OpenAiConfig, OpenAiClient};
use palaver_server::{Server, ServerConfig};
use palaver_store::{MemoryStore, SharedStore, SqliteStore};
use palaver_types::GenerationParams;

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// palaver - streaming conversational chat backend
#[derive(Parser)]
#[command(name = "palaver")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory for rotating JSON log files (console-only when absent)
    #[arg(long, global = true, env = "PALAVER_LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve(ServeArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Address to bind the server to
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: SocketAddr,

    /// SQLite database path; omit for an in-memory store
    #[arg(long, env = "PALAVER_DATABASE")]
    database: Option<PathBuf>,

    /// Base URL of the OpenAI-compatible completion gateway
    #[arg(long, env = "PALAVER_BASE_URL")]
    base_url: String,

    /// API key for the completion gateway
    #[arg(long, env = "PALAVER_API_KEY")]
    api_key: Option<String>,

    /// Default model for conversations that set none
    #[arg(long, env = "PALAVER_MODEL")]
    model: Option<String>,

    /// API token in `token:user` form; repeatable. None disables auth.
    #[arg(long = "token")]
    tokens: Vec<String>,

    /// CORS allowed origin; repeatable
    #[arg(long = "cors-origin")]
    cors_origins: Vec<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing — console (human-readable) + optional rotating
    // JSON file. The appender guard must outlive the server.
    let filter = if cli.verbose {
        "palaver=debug,palaver_chat=debug,palaver_llm=debug,palaver_server=debug,palaver_store=debug,info"
    } else {
        "palaver=info,palaver_chat=info,palaver_llm=info,palaver_server=info,warn"
    };

    use tracing_subscriber::prelude::*;

    let mut appender_guard = None;
    let file_layer = cli.log_dir.as_ref().map(|dir| {
        let file_appender = tracing_appender::rolling::daily(dir, "palaver.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        appender_guard = Some(guard);
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_filter(tracing_subscriber::EnvFilter::new(
                "palaver=trace,palaver_chat=trace,palaver_llm=trace,palaver_server=trace,palaver_store=trace,info",
            ))
    });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(file_layer)
        .init();
    let _appender_guard = appender_guard;

    match cli.command {
        Commands::Serve(args) => serve(args).await,
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let store: SharedStore = match &args.database {
        Some(path) => Arc::new(
            SqliteStore::open(path)
                .with_context(|| format!("failed to open database at {}", path.display()))?,
        ),
        None => {
            tracing::warn!("no database configured; conversations will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };

    let client = OpenAiClient::shared(
        OpenAiConfig::new(&args.base_url, args.api_key.clone()).with_name("gateway"),
    )
    .context("failed to create completion client")?;

    let default_params = match &args.model {
        Some(model) => GenerationParams::for_model(model),
        None => GenerationParams::default(),
    };

    let service = ChatService::new(store, client)
        .with_default_params(default_params)
        .with_notifier(Arc::new(BroadcastNotifier::default()));

    let mut config = ServerConfig::new()
        .with_bind_address(args.bind)
        .with_cors_origins(args.cors_origins.clone());
    for entry in &args.tokens {
        let Some((token, user)) = entry.split_once(':') else {
            bail!("invalid --token value {entry:?}: expected token:user");
        };
        config = config.with_token(token, user);
    }

    Server::new(service, config)
        .run()
        .await
        .context("server exited with an error")
}
