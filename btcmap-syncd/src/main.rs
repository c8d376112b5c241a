//! BTC Map sync daemon
//!
//! Keeps a local SQLite mirror of the BTC Map collections (places, areas,
//! users, events, area reports) up to date:
//! 1. Runs a sync pass at start and then on a fixed interval
//! 2. Serves per-collection status and a manual trigger over HTTP
//!
//! Usage:
//!   btcmap-syncd --db btcmap.db --interval 300

use anyhow::{Context, Result};
use btcmap_storage::SqliteCache;
use btcmap_sync::{ApiClient, Collections, ExecutionContext, SyncEnv};
use btcmap_syncd::{AppState, DaemonConfig, build_router, spawn_sync_loop, sync_pass};
use clap::{Parser, ValueEnum};
use std::{path::PathBuf, sync::Arc};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "btcmap-syncd")]
#[command(about = "Keeps a local mirror of BTC Map collections in sync")]
struct Args {
    /// JSON config file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Remote API base URL
    #[arg(long)]
    api_url: Option<String>,

    /// Static places snapshot used for the first places sync
    #[arg(long)]
    static_url: Option<String>,

    /// SQLite cache file
    #[arg(long)]
    db: Option<PathBuf>,

    /// Seconds between sync passes
    #[arg(short, long)]
    interval: Option<u64>,

    /// Execution context; `server` serves areas from the in-process cache
    #[arg(long, value_enum, default_value = "client")]
    context: ContextArg,

    /// HTTP API port for the status endpoint
    #[arg(long)]
    http_port: Option<u16>,

    /// Run a single sync pass and exit
    #[arg(long)]
    once: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ContextArg {
    Client,
    Server,
}

impl From<ContextArg> for ExecutionContext {
    fn from(value: ContextArg) -> Self {
        match value {
            ContextArg::Client => ExecutionContext::Client,
            ContextArg::Server => ExecutionContext::Server,
        }
    }
}

fn load_config(args: &Args) -> Result<DaemonConfig> {
    let mut config = match &args.config {
        Some(path) => DaemonConfig::from_file(path)?,
        None => DaemonConfig::default(),
    };
    if let Some(url) = &args.api_url {
        config.api.base_url = url.clone();
    }
    if let Some(url) = &args.static_url {
        config.collections.places_snapshot_url = url.clone();
    }
    if let Some(db) = &args.db {
        config.db_path = db.clone();
    }
    if let Some(secs) = args.interval {
        config.interval_secs = secs;
    }
    if let Some(port) = args.http_port {
        config.http_port = port;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    let config = load_config(&args)?;
    info!("BTC Map sync daemon starting...");
    info!("API: {}", config.api.base_url);
    info!("Cache: {}", config.db_path.display());

    let cache = Arc::new(
        SqliteCache::open(&config.db_path)
            .with_context(|| format!("Failed to open cache {}", config.db_path.display()))?,
    );
    let env = SyncEnv {
        api: Arc::new(ApiClient::new(config.api.clone())?),
        cache: cache.clone(),
        lease: Some(cache),
        context: args.context.into(),
    };
    let collections = Collections::new(env, &config.collections)?;
    let registry = collections.registry();

    if args.once {
        for report in sync_pass(&registry).await {
            println!("{}", serde_json::to_string(&report)?);
        }
        return Ok(());
    }

    let sync_loop = spawn_sync_loop(registry.clone(), config.interval());

    let app = build_router(Arc::new(AppState { registry }));
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.http_port))
        .await
        .with_context(|| format!("Failed to bind HTTP port {}", config.http_port))?;
    info!("HTTP status endpoint listening on port {}", config.http_port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("HTTP server failed")?;

    sync_loop.abort();
    Ok(())
}
