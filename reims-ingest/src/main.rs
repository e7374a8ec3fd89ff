//! reims-ingest - REIMS document ingestion service
//!
//! `serve` runs the HTTP API with its background processing worker. The
//! other subcommands operate on the same root folder from the command line:
//! bulk `ingest` of a file or folder (processed inline), `recompute` of
//! property aggregates, a `reconcile` report and a `classify` dry run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reims_common::config::{ConfigSource, RootFolder, RootFolderResolver, TomlConfig};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use walkdir::WalkDir;

use reims_ingest::services::filename_parser::{extract_period, extract_year, PropertyAliases};
use reims_ingest::services::storage::{build_object_store, ObjectStore};
use reims_ingest::services::{classify_document, importer, reconciler, worker, Ingestor, Processor};
use reims_ingest::AppState;

/// Command-line arguments for reims-ingest
#[derive(Parser, Debug)]
#[command(name = "reims-ingest")]
#[command(about = "Real-estate document ingestion and analytics service")]
#[command(version)]
struct Args {
    /// Root folder holding the database and local object storage
    #[arg(short, long, global = true)]
    root_folder: Option<PathBuf>,

    /// Bootstrap TOML configuration file
    #[arg(short, long, global = true, env = "REIMS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default)
    Serve {
        /// Override `bind_addr` from the config file
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Ingest and process a file, or every file under a folder
    Ingest {
        path: PathBuf,
        /// Assign all ingested documents to this property
        #[arg(short, long)]
        property: Option<String>,
    },
    /// Recompute unit aggregates for every property
    Recompute,
    /// Report storage/database inconsistencies
    Reconcile,
    /// Show how a filename would be classified and stored
    Classify { name: String },
}

/// Everything the subcommands share
struct Services {
    config: Arc<TomlConfig>,
    db: sqlx::SqlitePool,
    store: Arc<dyn ObjectStore>,
    aliases: Arc<PropertyAliases>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // An explicitly named config file must load; the default location may
    // be absent or broken and falls back to defaults.
    let (config, source) = match &args.config {
        Some(path) => {
            let config = TomlConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?;
            (config, ConfigSource::File(path.clone()))
        }
        None => TomlConfig::load_or_default(None),
    };
    init_tracing(&config.logging.level);
    source.log();

    info!(
        "reims-ingest {} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    if let Some(Command::Classify { name }) = &args.command {
        let aliases = PropertyAliases::new(&config.aliases)?;
        classify(name, &aliases);
        return Ok(());
    }

    let ctx = open_context(args.root_folder.clone(), config).await?;

    match args.command.unwrap_or(Command::Serve { bind: None }) {
        Command::Serve { bind } => serve(ctx, bind).await,
        Command::Ingest { path, property } => ingest_path(ctx, &path, property.as_deref()).await,
        Command::Recompute => {
            let updated = importer::recompute_all(&ctx.db).await?;
            println!("Recomputed {} properties", updated);
            Ok(())
        }
        Command::Reconcile => {
            let report = reconciler::reconcile(&ctx.db, ctx.store.as_ref()).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Classify { .. } => Ok(()),
    }
}

/// `RUST_LOG` wins over the configured level
fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},tower_http=info,sqlx=warn", level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn open_context(cli_root: Option<PathBuf>, config: TomlConfig) -> Result<Services> {
    // Step 1: Resolve root folder (CLI > env > TOML > default)
    let root = RootFolderResolver::new(cli_root, &config).resolve();
    let root = RootFolder::new(root, &config);
    root.ensure_directory_exists()
        .context("Failed to initialize root folder")?;
    info!("Root folder: {}", root.path().display());

    // Step 2: Open or create database
    info!("Database: {}", root.database_path().display());
    let db = reims_ingest::db::init_database_pool(root.database_path()).await?;

    // Step 3: Object storage
    let store = build_object_store(&config.storage, root.storage_path())
        .await
        .context("Failed to initialize object storage")?;

    let aliases = Arc::new(PropertyAliases::new(&config.aliases)?);

    Ok(Services {
        config: Arc::new(config),
        db,
        store,
        aliases,
    })
}

async fn serve(ctx: Services, bind: Option<String>) -> Result<()> {
    let processor = Processor::new(
        ctx.db.clone(),
        ctx.store.clone(),
        ctx.config.rent_roll.unit_count_policy,
    );
    let capacity = worker::queue_capacity(&ctx.db).await?;
    let (queue, worker_handle) = worker::spawn_worker(processor, capacity);

    {
        let db = ctx.db.clone();
        let queue = queue.clone();
        tokio::spawn(async move {
            if let Err(e) = worker::recover_pending(&db, &queue).await {
                error!("Failed to re-enqueue unfinished documents: {}", e);
            }
        });
    }

    let bind = bind.unwrap_or_else(|| ctx.config.bind_addr.clone());
    let state = AppState::new(ctx.db, ctx.store, queue, ctx.config, ctx.aliases);
    let app = reims_ingest::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind to {}", bind))?;
    info!("Listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // The router held the last queue sender; the worker drains and exits
    if let Err(e) = worker_handle.await {
        warn!("Processing worker ended abnormally: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Ingest one file or a whole folder tree, processing each document inline.
/// A failing file is logged and the batch continues.
async fn ingest_path(ctx: Services, path: &Path, property: Option<&str>) -> Result<()> {
    let files: Vec<PathBuf> = if path.is_dir() {
        WalkDir::new(path)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
            .map(|entry| entry.into_path())
            .collect()
    } else if path.is_file() {
        vec![path.to_path_buf()]
    } else {
        anyhow::bail!("Path not found: {}", path.display());
    };

    info!(count = files.len(), "Ingesting files from {}", path.display());

    let ingestor = Ingestor::new(ctx.db.clone(), ctx.store.clone(), ctx.aliases.clone());
    let processor = Processor::new(
        ctx.db.clone(),
        ctx.store.clone(),
        ctx.config.rent_roll.unit_count_policy,
    );

    let mut completed = 0;
    let mut failed = 0;
    for file in &files {
        match ingest_one(&ingestor, &processor, file, property).await {
            Ok(()) => completed += 1,
            Err(e) => {
                error!(file = %file.display(), "Ingest failed: {:#}", e);
                failed += 1;
            }
        }
    }

    println!(
        "Ingested {} files: {} completed, {} failed",
        files.len(),
        completed,
        failed
    );
    Ok(())
}

async fn ingest_one(
    ingestor: &Ingestor,
    processor: &Processor,
    file: &Path,
    property: Option<&str>,
) -> Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let document = ingestor.ingest(&filename, &bytes, None, property).await?;
    processor.process(document.id).await?;
    Ok(())
}

fn classify(name: &str, aliases: &PropertyAliases) {
    use chrono::Datelike;

    let doc_type = classify_document(name);
    let year = extract_year(name, chrono::Utc::now().year());
    let period = extract_period(name, year);
    let property = aliases.resolve(name);
    let key = reims_ingest::services::storage::object_key(property.as_deref(), year, doc_type, name);

    println!("document_type: {}", doc_type);
    println!("year:          {}", year);
    println!("period:        {}", period.as_deref().unwrap_or("-"));
    println!("property:      {}", property.as_deref().unwrap_or("-"));
    println!("object_key:    {}", key);
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
