use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use graph_page_ingest::config::{database_path_from_env, Config};
use graph_page_ingest::db::Database;
use graph_page_ingest::graph::GraphClient;
use graph_page_ingest::ingest::{self, IngestLimits};

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create or drop the database schema.
    Schema {
        #[command(subcommand)]
        action: SchemaAction,
    },
    /// Fetch a page's posts and upsert them.
    Posts {
        /// Configured page name.
        #[arg(long)]
        page: String,
    },
    /// Fetch reaction tallies for a page's stored posts.
    Reactions {
        /// Configured page name.
        #[arg(long)]
        page: String,
        /// Only posts that have no tally yet.
        #[arg(long)]
        missing_only: bool,
    },
    /// Fetch new top-level comments for a page's stored posts.
    Comments {
        /// Configured page name.
        #[arg(long)]
        page: String,
    },
    /// Fetch new replies for every stored top-level comment.
    Replies,
}

#[derive(Debug, Subcommand)]
enum SchemaAction {
    Create,
    Drop,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    init_tracing()?;
    let cli = Cli::parse();

    match cli.command {
        // Schema commands need only the database path, not credentials or pages.
        Command::Schema { action } => {
            let path = database_path_from_env();
            ensure_parent_dir(&path).await?;
            match action {
                SchemaAction::Create => {
                    Database::new(&path)
                        .await
                        .context("Failed to create schema")?;
                    info!(path = %path.display(), "Schema created");
                }
                SchemaAction::Drop => {
                    Database::open(&path).await?.drop_schema().await?;
                }
            }
        }
        Command::Posts { page } => {
            let config = load_config().await?;
            let page = config.page(&page)?;
            let (db, graph) = connect(&config).await?;
            let limits = IngestLimits::from(&config);
            let report = ingest::run_posts(&graph, &db, &page.id, &limits).await;
            info!(page = %page.name, ?report, "Posts run finished");
        }
        Command::Reactions { page, missing_only } => {
            let config = load_config().await?;
            let page = config.page(&page)?;
            let (db, graph) = connect(&config).await?;
            ingest::run_reactions(&graph, &db, &page.id, missing_only).await?;
        }
        Command::Comments { page } => {
            let config = load_config().await?;
            let page = config.page(&page)?;
            let (db, graph) = connect(&config).await?;
            let limits = IngestLimits::from(&config);
            ingest::run_comments(&graph, &db, &page.id, &limits).await?;
        }
        Command::Replies => {
            let config = load_config().await?;
            let (db, graph) = connect(&config).await?;
            let limits = IngestLimits::from(&config);
            ingest::run_replies(&graph, &db, &limits).await?;
        }
    }

    Ok(())
}

async fn load_config() -> Result<Config> {
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    ensure_parent_dir(&config.database_path).await?;
    Ok(config)
}

async fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create database directory: {}", parent.display())
        })?;
    }
    Ok(())
}

/// Open the database and authenticate once, before any traversal starts.
async fn connect(config: &Config) -> Result<(Database, GraphClient)> {
    let db = Database::new(&config.database_path)
        .await
        .context("Failed to initialize database")?;
    let graph = GraphClient::connect(config)
        .await
        .context("Failed to authenticate with the Graph API")?;
    Ok((db, graph))
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,graph_page_ingest=debug"));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}
