//! Preview sync engine.
//!
//! Enumerates eligible sources once, derives every preview key up front
//! (flagging collisions), then runs each asset through
//! probe → read → transform → upload with bounded concurrency. Per-asset
//! failures are logged and counted; only enumeration failures abort a run.
//!
//! Per-asset states: `Discovered → KeyDerived → (Skipped | Transformed →
//! Uploaded | Failed)`.

pub mod error;
pub mod result;
pub mod upload;

use std::collections::HashMap;
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Instant;

use futures_util::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use crate::keys::{self, PreviewKey};
use crate::source::{self, SourceAsset};
use crate::store::{self, StoreClient, StoreConnector};
use crate::transform;

pub use error::{AssetError, SetupError};
pub use result::{format_duration, AssetOutcome, SyncResult};
pub use upload::UploadPolicy;

/// Subset of application config consumed by the sync engine.
/// Decoupled from CLI parsing so the engine can be tested independently.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Root prepended to every preview key.
    pub prefix: String,
    /// Directory prefix of the sources inside the source store.
    pub source_prefix: String,
    /// Categories to sync; empty means all.
    pub categories: Vec<String>,
    pub max_dimension: u32,
    /// Configured base quality; the encode quality is derived from it.
    pub quality: u8,
    pub concurrency: usize,
    pub upload: UploadPolicy,
    pub dry_run: bool,
    pub no_progress_bar: bool,
}

/// A source whose preview key has been derived and claimed for this run.
#[derive(Debug, Clone)]
struct PlannedAsset {
    source: SourceAsset,
    preview: PreviewKey,
}

pub struct SyncEngine {
    source: Arc<dyn StoreClient>,
    target: Arc<dyn StoreClient>,
    connector: Arc<dyn StoreConnector>,
    config: SyncConfig,
}

impl SyncEngine {
    /// `connector` must build clients for the same location as `target`; it
    /// backs the fresh-client upload tiers.
    pub fn new(
        source: Arc<dyn StoreClient>,
        target: Arc<dyn StoreClient>,
        connector: Arc<dyn StoreConnector>,
        config: SyncConfig,
    ) -> Self {
        Self {
            source,
            target,
            connector,
            config,
        }
    }

    /// Run one sync pass.
    ///
    /// Returns `Err` only when the source store can't be enumerated. Once
    /// `shutdown` is cancelled no new assets are dispatched; in-flight ones
    /// finish and are counted.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<SyncResult, SetupError> {
        let started = Instant::now();

        let sources = source::enumerate_sources(
            self.source.as_ref(),
            &self.config.source_prefix,
            &self.config.categories,
        )
        .await
        .map_err(|e| SetupError::SourceUnreachable {
            location: self.source.describe(),
            source: e,
        })?;

        let (planned, collisions) = plan(sources, &self.config.prefix);
        let mut result = SyncResult {
            total: planned.len(),
            collisions,
            ..Default::default()
        };

        tracing::info!(
            eligible = planned.len(),
            collisions,
            source = %self.source.describe(),
            target = %self.target.describe(),
            "Starting preview sync"
        );

        let quality = transform::effective_quality(self.config.quality);
        let pb = create_progress_bar(self.config.no_progress_bar, planned.len() as u64);

        let mut outcomes = stream::iter(planned)
            .take_while(|_| std::future::ready(!shutdown.is_cancelled()))
            .map(|asset| async move {
                let outcome = self.process(&asset, quality).await;
                (asset, outcome)
            })
            .buffer_unordered(self.config.concurrency.max(1));

        while let Some((asset, outcome)) = outcomes.next().await {
            let outcome = match outcome {
                Ok(outcome) => outcome,
                Err(e) => {
                    pb.suspend(|| {
                        tracing::error!(
                            source = %asset.source.key,
                            class = e.class(),
                            retryable = e.is_retryable(),
                            "Preview failed: {}",
                            e
                        );
                    });
                    AssetOutcome::Failed {
                        class: e.class(),
                        message: e.to_string(),
                    }
                }
            };
            pb.set_message(asset.source.key.clone());
            pb.inc(1);
            result.record(asset.source.key, outcome);
        }
        pb.finish_and_clear();

        result.interrupted = shutdown.is_cancelled() && result.completed() < result.total;
        result.elapsed = started.elapsed();
        Ok(result)
    }

    /// Drive one asset from `KeyDerived` to a terminal state.
    async fn process(&self, asset: &PlannedAsset, quality: u8) -> Result<AssetOutcome, AssetError> {
        let preview = &asset.preview;

        if store::exists(self.target.as_ref(), preview.as_str())
            .await
            .map_err(AssetError::Probe)?
        {
            tracing::debug!(source = %asset.source.key, preview = %preview, "Preview exists, skipping");
            return Ok(AssetOutcome::Skipped);
        }

        if self.config.dry_run {
            tracing::info!("[DRY RUN] Would generate {}", preview);
            return Ok(AssetOutcome::WouldUpload);
        }

        let raw = self
            .source
            .get(&asset.source.store_key)
            .await
            .map_err(AssetError::Read)?;
        let source_len = raw.len();

        let rendered = transform::transform_blocking(raw, self.config.max_dimension, quality).await?;

        let tier = upload::upload_preview(
            &self.target,
            self.connector.as_ref(),
            preview,
            &rendered.bytes,
            &self.config.upload,
        )
        .await?;

        tracing::info!(
            source = %asset.source.key,
            preview = %preview,
            width = rendered.width,
            height = rendered.height,
            quality = rendered.quality,
            source_bytes = source_len,
            preview_bytes = rendered.bytes.len(),
            ?tier,
            "Preview uploaded"
        );
        Ok(AssetOutcome::Uploaded {
            tier,
            bytes: rendered.bytes.len(),
        })
    }
}

/// Derive preview keys and claim each one for a single source.
///
/// Sources arrive sorted, so the first source in key order wins a contested
/// preview key; the rest are logged and counted as collisions.
fn plan(sources: Vec<SourceAsset>, prefix: &str) -> (Vec<PlannedAsset>, usize) {
    let mut claimed: HashMap<PreviewKey, String> = HashMap::new();
    let mut planned = Vec::with_capacity(sources.len());
    let mut collisions = 0;

    for source in sources {
        let Some(preview) = keys::derive_preview_key(&source.key, prefix) else {
            tracing::debug!(source = %source.key, "Not eligible for a preview");
            continue;
        };
        if let Some(winner) = claimed.get(&preview) {
            tracing::warn!(
                source = %source.key,
                winner = %winner,
                preview = %preview,
                "Preview key collision, keeping the preview of the first source"
            );
            collisions += 1;
            continue;
        }
        claimed.insert(preview.clone(), source.key.clone());
        planned.push(PlannedAsset { source, preview });
    }

    (planned, collisions)
}

/// Create a progress bar with a consistent template.
///
/// Returns `ProgressBar::hidden()` when `--no-progress-bar` was passed or
/// stdout is not a TTY (cron, piped output).
fn create_progress_bar(no_progress_bar: bool, total: u64) -> ProgressBar {
    if no_progress_bar || !std::io::stdout().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .expect("valid template")
        .progress_chars("=> "),
    );
    pb
}

/// Log the end-of-run summary block.
pub fn log_summary(result: &SyncResult, dry_run: bool) {
    if dry_run {
        tracing::info!("── Dry Run Summary ──");
        tracing::info!(
            "  {} previews would be generated, {} already exist, {} failed",
            result.processed,
            result.skipped,
            result.failed
        );
    } else {
        tracing::info!("── Summary ──");
        tracing::info!(
            "  {} total, {} processed, {} skipped, {} failed",
            result.total,
            result.processed,
            result.skipped,
            result.failed
        );
        tracing::info!("  {} preview bytes written", result.bytes_written);
    }
    if result.collisions > 0 {
        tracing::warn!(
            "  {} sources share a preview key with another source and were not processed",
            result.collisions
        );
    }
    if result.degraded_uploads > 0 {
        tracing::warn!(
            "  {} uploads needed a fallback client",
            result.degraded_uploads
        );
    }
    if result.interrupted {
        tracing::info!(
            "  Interrupted: {} of {} assets completed before shutdown",
            result.completed(),
            result.total
        );
    }
    for key in result.failed_keys() {
        tracing::error!("  failed: {}", key);
    }
    tracing::info!("  elapsed: {}", format_duration(result.elapsed));
}
