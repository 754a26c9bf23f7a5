//! Command-line client for Tessera.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::path::{Path, PathBuf};
use tessera_core::config::AppConfig;
use tessera_core::{ResourceId, UpdateTime};
use tessera_engine::{ChunkedStore, UpsertOutcome, WriteOptions};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tessera")]
#[command(about = "Store and read chunked JSON objects in a Tessera table store")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "TESSERA_CONFIG",
        default_value = "config/tessera.toml"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a JSON document as the new version of a resource
    Put {
        /// Resource id (decimal integers are numeric ids)
        id: String,

        /// Read the document from this file instead of stdin
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Write timestamp (RFC 3339); defaults to now
        #[arg(long)]
        update_time: Option<String>,
    },
    /// Print the current version of a resource
    Get {
        /// Resource id
        id: String,

        /// Print on one line
        #[arg(long, default_value_t = false)]
        compact: bool,
    },
    /// Print the manifest naming the current version of a resource
    Manifest {
        /// Resource id
        id: String,
    },
    /// Delete chunks no manifest references
    Sweep {
        /// Override the configured grace period
        #[arg(long)]
        grace_period_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries command output.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let Cli { config, command } = Cli::parse();
    let mut config = load_config(&config)?;

    if let Commands::Sweep {
        grace_period_secs: Some(secs),
    } = &command
    {
        config.sweep.grace_period_secs = *secs;
    }

    let engine = tessera_engine::from_config(&config)
        .await
        .context("failed to open table store")?;

    match command {
        Commands::Put {
            id,
            file,
            update_time,
        } => handle_put(&engine, &id, file.as_deref(), update_time.as_deref()).await,
        Commands::Get { id, compact } => handle_get(&engine, &id, compact).await,
        Commands::Manifest { id } => handle_manifest(&engine, &id).await,
        Commands::Sweep { .. } => handle_sweep(&engine).await,
    }
}

/// Config file (optional) overlaid with `TESSERA_` environment variables.
fn load_config(path: &Path) -> Result<AppConfig> {
    let mut figment = Figment::new();

    if path.exists() {
        tracing::debug!(config_path = %path.display(), "loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::debug!(config_path = %path.display(), "no config file, using defaults");
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("TESSERA_").ignore(&["config"]).split("__"))
        .extract()
        .context("failed to load configuration")?;

    config
        .validate()
        .map_err(|err| anyhow::anyhow!(err))
        .context("invalid configuration")?;
    Ok(config)
}

fn parse_id(id: &str) -> Result<ResourceId> {
    ResourceId::new(id).with_context(|| format!("invalid resource id {id:?}"))
}

async fn handle_put(
    engine: &ChunkedStore,
    id: &str,
    file: Option<&Path>,
    update_time: Option<&str>,
) -> Result<()> {
    let resource_id = parse_id(id)?;

    let raw = match file {
        Some(path) => tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut buf)
                .await
                .context("failed to read stdin")?;
            buf
        }
    };
    let document: serde_json::Value =
        serde_json::from_slice(&raw).context("input is not valid JSON")?;

    let cancel = CancellationToken::new();
    let mut options = WriteOptions::default().with_cancel(cancel.clone());
    if let Some(update_time) = update_time {
        let update_time = UpdateTime::parse_rfc3339(update_time)
            .with_context(|| format!("invalid update time {update_time:?}"))?;
        options = options.with_update_time(update_time);
    }

    // Ctrl-C stops the write before its manifest is committed.
    let watcher = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, abandoning write");
                cancel.cancel();
            }
        }
    });

    let outcome = engine.upsert_with(&resource_id, &document, options).await;
    watcher.abort();

    match outcome.context("write failed")? {
        UpsertOutcome::Committed(manifest) => {
            println!("{}", serde_json::to_string_pretty(&manifest)?);
            Ok(())
        }
        UpsertOutcome::Rejected { attempted, current } => {
            let current = current
                .map(|m| format!("{} at {}", m.version_id, m.update_time))
                .unwrap_or_else(|| "none".to_string());
            anyhow::bail!(
                "write of {} at {} superseded by version {current}",
                attempted.version_id,
                attempted.update_time
            )
        }
    }
}

async fn handle_get(engine: &ChunkedStore, id: &str, compact: bool) -> Result<()> {
    let resource_id = parse_id(id)?;
    let document: serde_json::Value = engine
        .get(&resource_id)
        .await
        .with_context(|| format!("failed to read {resource_id}"))?;

    if compact {
        println!("{}", serde_json::to_string(&document)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&document)?);
    }
    Ok(())
}

async fn handle_manifest(engine: &ChunkedStore, id: &str) -> Result<()> {
    let resource_id = parse_id(id)?;
    let manifest = engine
        .manifest(&resource_id)
        .await
        .with_context(|| format!("failed to read manifest of {resource_id}"))?;

    println!("{}", serde_json::to_string_pretty(&manifest)?);
    Ok(())
}

async fn handle_sweep(engine: &ChunkedStore) -> Result<()> {
    let stats = engine
        .sweeper()
        .sweep()
        .await
        .context("sweep failed")?;

    println!("Sweep completed.");
    println!("  Chunks scanned: {}", stats.chunks_scanned);
    println!("  Chunks deleted: {}", stats.chunks_deleted);
    println!("  Bytes reclaimed: {}", stats.bytes_reclaimed);
    println!("  Errors: {}", stats.errors);
    Ok(())
}
