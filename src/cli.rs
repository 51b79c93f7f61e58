//! Command-line interface
//!
//! `run` (the default) prints the ranked list, `serve` exposes the same
//! pipeline over HTTP and `clear-cache` drops the stored snapshot.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::{
    api::{create_router, AppState},
    config::Config,
    db::{create_redis_client, CacheStore, FileCacheStore, RedisCacheStore},
    services::{
        providers::{steam::SteamProvider, DataSource},
        report::render_report,
        RecommendationService, RunOptions,
    },
};

/// Recommend Steam games based on what your friends own and play
#[derive(Parser)]
#[command(name = "friendplay")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging (sets log level to DEBUG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build recommendations and print them
    Run(RunArgs),

    /// Serve recommendations over HTTP
    Serve,

    /// Delete the cached friend data
    ClearCache,
}

#[derive(Args, Default)]
struct RunArgs {
    /// Ignore cached friend data and refetch everything
    #[arg(long)]
    fresh: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = log_filter(cli.verbose);
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    // Configuration problems are fatal before any network activity
    let config = Config::from_env()?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(async move {
        match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
            Commands::Run(args) => run_once(&config, args).await,
            Commands::Serve => serve(config).await,
            Commands::ClearCache => clear_cache(&config).await,
        }
    })
}

/// RUST_LOG wins when set; otherwise INFO, or DEBUG with `--verbose`
fn log_filter(verbose: bool) -> EnvFilter {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()))
}

fn build_store(config: &Config) -> Result<Arc<dyn CacheStore>> {
    let store: Arc<dyn CacheStore> = match &config.redis_url {
        Some(url) => {
            let client = create_redis_client(url)?;
            Arc::new(RedisCacheStore::new(client, &config.steam_id, config.cache_max_age))
        }
        None => Arc::new(FileCacheStore::new(&config.cache_path)),
    };
    Ok(store)
}

fn build_service(config: &Config) -> Result<RecommendationService> {
    let source: Arc<dyn DataSource> = Arc::new(SteamProvider::new(config.client_settings())?);
    let store = build_store(config)?;

    tracing::info!(
        source = source.name(),
        cache = store.name(),
        max_friends = config.max_friends_to_process,
        max_failures = config.max_failed_requests,
        "Recommendation service ready"
    );

    Ok(RecommendationService::new(
        source,
        store,
        config.aggregation_limits(),
        config.steam_id.clone(),
        config.cache_max_age(),
    ))
}

async fn run_once(config: &Config, args: RunArgs) -> Result<()> {
    let service = build_service(config)?;
    let report = service
        .run(RunOptions {
            use_cache: !args.fresh,
        })
        .await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_report(&report, &config.store_url));
    }
    Ok(())
}

async fn serve(config: Config) -> Result<()> {
    let service = build_service(&config)?;
    let app = create_router(AppState::new(service, config.store_url.clone()));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(address = %addr, "Server running");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn clear_cache(config: &Config) -> Result<()> {
    build_store(config)?.clear().await?;
    println!("Cache cleared");
    Ok(())
}
