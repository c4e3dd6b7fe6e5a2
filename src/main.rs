//! gallery-preview: keeps a WebP preview next to every gallery original.
//!
//! Originals live in a directory tree or an S3-compatible bucket (Cloudflare
//! R2 in production). `sync` derives a preview key for each eligible source,
//! skips the ones that already have a preview, and resizes + re-encodes the
//! rest with a tiered upload fallback. `audit` checks coverage read-only and
//! `index` writes the JSON document the gallery front end consumes.

#![warn(clippy::all)]

mod audit;
mod cli;
mod config;
mod index;
mod keys;
pub mod retry;
mod shutdown;
mod source;
mod store;
mod sync;
mod transform;
mod types;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Command;
use store::{StoreClient, StoreConnector};
use sync::{SetupError, SyncEngine};

fn connect_source(stores: &config::StoreConfig) -> anyhow::Result<Arc<dyn StoreClient>> {
    let location = stores.source_location()?;
    location
        .connect()
        .with_context(|| format!("Failed to connect to source store {:?}", location))
}

fn connect_target(
    stores: &config::StoreConfig,
) -> anyhow::Result<(Arc<dyn StoreClient>, store::StoreLocation)> {
    let location = stores.target_location()?;
    let client = location.connect().map_err(SetupError::TargetConnect)?;
    Ok((client, location))
}

async fn run_sync(args: cli::SyncArgs) -> anyhow::Result<()> {
    let settings = config::SyncSettings::from_cli(args);
    tracing::debug!(?settings, "Resolved configuration");

    let source = connect_source(&settings.stores)?;
    let (target, target_location) = connect_target(&settings.stores)?;
    let connector: Arc<dyn StoreConnector> = Arc::new(target_location);
    let engine = SyncEngine::new(source, target, connector, settings.sync.clone());

    let shutdown_token = shutdown::install_signal_handler()?;

    loop {
        if shutdown_token.is_cancelled() {
            tracing::info!("Shutdown requested, exiting...");
            break;
        }

        match engine.run(shutdown_token.clone()).await {
            Ok(result) => sync::log_summary(&result, settings.sync.dry_run),
            // A daemon outlives a temporarily unreachable source.
            Err(e) if settings.watch_with_interval.is_some() => {
                tracing::error!("Sync pass aborted: {}", e);
            }
            Err(e) => return Err(e).context("Sync aborted before processing any asset"),
        }

        let Some(interval) = settings.watch_with_interval else {
            break;
        };
        if shutdown_token.is_cancelled() {
            tracing::info!("Shutdown requested, exiting...");
            break;
        }
        tracing::info!("Waiting {} seconds...", interval);
        tokio::select! {
            _ = tokio::time::sleep(std::time::Duration::from_secs(interval)) => {}
            _ = shutdown_token.cancelled() => {
                tracing::info!("Shutdown during wait, exiting...");
                break;
            }
        }
    }

    Ok(())
}

async fn run_audit(args: cli::AuditArgs) -> anyhow::Result<()> {
    let settings = config::AuditSettings::from_cli(args);
    tracing::debug!(?settings, "Resolved configuration");

    let source = connect_source(&settings.stores)?;
    let (target, _) = connect_target(&settings.stores)?;

    let report = audit::audit(source.as_ref(), target.as_ref(), &settings.audit)
        .await
        .context("Coverage audit failed")?;
    audit::log_report(&report);

    if settings.strict && (report.mismatch || !report.sample_verified) {
        anyhow::bail!(
            "Coverage incomplete: {} missing, {} orphaned, {} of {} samples verified",
            report.missing.len(),
            report.orphaned.len(),
            report.samples.iter().filter(|s| s.is_ok()).count(),
            report.samples.len()
        );
    }
    Ok(())
}

async fn run_index(args: cli::IndexArgs) -> anyhow::Result<()> {
    let settings = config::IndexSettings::from_cli(args);
    tracing::debug!(?settings, "Resolved configuration");

    let source = connect_source(&settings.stores)?;
    let gallery = index::build_index(source.as_ref(), &settings.index)
        .await
        .context("Failed to enumerate gallery sources")?;
    index::write_index(&settings.output, &gallery).await?;

    tracing::info!(
        categories = gallery.gallery.len(),
        images = gallery.total_images,
        "Gallery index written to {}",
        settings.output.display()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_filter())),
        )
        .init();

    match cli.command {
        Command::Sync(args) => run_sync(args).await,
        Command::Audit(args) => run_audit(args).await,
        Command::Index(args) => run_index(args).await,
    }
}
