//! Read-only coverage audit: does every eligible source have a preview?
//!
//! Lists the preview side and the source side independently, compares them
//! through [`keys::derive_preview_key`], and re-probes a few previews with
//! `head` to catch zero-byte or unreadable uploads. Neither store is written.

use std::collections::BTreeSet;

use crate::keys::{self, PreviewKey};
use crate::source;
use crate::store::StoreClient;
use crate::sync::SetupError;

#[derive(Debug, Clone)]
pub struct AuditConfig {
    pub prefix: String,
    pub source_prefix: String,
    /// Categories to audit; empty means all.
    pub categories: Vec<String>,
    /// Number of previews re-probed with `head`.
    pub sample_size: usize,
}

/// Result of re-probing one listed preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleResult {
    pub key: String,
    pub size: Option<u64>,
    pub error: Option<String>,
}

impl SampleResult {
    /// Retrievable and non-empty.
    pub fn is_ok(&self) -> bool {
        self.error.is_none() && self.size.is_some_and(|s| s > 0)
    }
}

/// Snapshot comparison of expected vs. actual previews. Not persisted.
#[derive(Debug, Clone, Default)]
pub struct CoverageReport {
    /// Eligible sources.
    pub expected_count: usize,
    /// Objects found under the preview root.
    pub actual_count: usize,
    /// Every sampled preview was retrievable and non-empty.
    pub sample_verified: bool,
    pub mismatch: bool,
    /// Derived keys with no preview object.
    pub missing: Vec<String>,
    /// Preview objects with no eligible source.
    pub orphaned: Vec<String>,
    pub samples: Vec<SampleResult>,
}

pub async fn audit(
    source_store: &dyn StoreClient,
    target: &dyn StoreClient,
    config: &AuditConfig,
) -> Result<CoverageReport, SetupError> {
    let sources = source::enumerate_sources(source_store, &config.source_prefix, &config.categories)
        .await
        .map_err(|e| SetupError::SourceUnreachable {
            location: source_store.describe(),
            source: e,
        })?;

    let actual = list_previews(target, config).await?;

    let expected: BTreeSet<PreviewKey> = sources
        .iter()
        .filter_map(|s| keys::derive_preview_key(&s.key, &config.prefix))
        .collect();
    let actual_set: BTreeSet<&str> = actual.iter().map(String::as_str).collect();

    let missing: Vec<String> = expected
        .iter()
        .filter(|k| !actual_set.contains(k.as_str()))
        .map(|k| k.to_string())
        .collect();
    let expected_keys: BTreeSet<&str> = expected.iter().map(PreviewKey::as_str).collect();
    let orphaned: Vec<String> = actual
        .iter()
        .filter(|k| !expected_keys.contains(k.as_str()))
        .cloned()
        .collect();

    let mut samples = Vec::with_capacity(config.sample_size.min(actual.len()));
    for key in actual.iter().take(config.sample_size) {
        let sample = match target.head(key).await {
            Ok(info) => SampleResult {
                key: info.key,
                size: Some(info.size),
                error: None,
            },
            Err(e) => SampleResult {
                key: key.clone(),
                size: None,
                error: Some(e.to_string()),
            },
        };
        samples.push(sample);
    }

    let expected_count = sources.len();
    let actual_count = actual.len();
    Ok(CoverageReport {
        expected_count,
        actual_count,
        sample_verified: samples.iter().all(SampleResult::is_ok),
        mismatch: expected_count != actual_count || !missing.is_empty(),
        missing,
        orphaned,
        samples,
    })
}

/// Every object below the preview root of the configured categories, sorted.
async fn list_previews(
    target: &dyn StoreClient,
    config: &AuditConfig,
) -> Result<Vec<String>, SetupError> {
    let dirs: Vec<String> = if config.categories.is_empty() {
        vec![keys::preview_dir(&config.prefix, "")]
    } else {
        config
            .categories
            .iter()
            .map(|c| keys::preview_dir(&config.prefix, c.trim_matches('/')))
            .collect()
    };

    let mut listed = Vec::new();
    for dir in dirs {
        match target.list(&dir).await {
            Ok(keys) => listed.extend(keys),
            // A preview root that was never written is an empty listing.
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                return Err(SetupError::TargetUnreachable {
                    location: target.describe(),
                    source: e,
                })
            }
        }
    }
    listed.sort();
    listed.dedup();
    Ok(listed)
}

pub fn log_report(report: &CoverageReport) {
    tracing::info!("── Coverage ──");
    tracing::info!(
        "  {} eligible sources, {} previews found",
        report.expected_count,
        report.actual_count
    );
    for key in &report.missing {
        tracing::warn!("  missing: {}", key);
    }
    for key in &report.orphaned {
        tracing::warn!("  orphaned: {}", key);
    }
    for sample in &report.samples {
        if sample.is_ok() {
            tracing::debug!(preview = %sample.key, size = ?sample.size, "Sample verified");
        } else {
            tracing::warn!(
                preview = %sample.key,
                size = ?sample.size,
                error = sample.error.as_deref().unwrap_or("empty object"),
                "Sample failed verification"
            );
        }
    }
    if report.mismatch {
        tracing::warn!("  Coverage mismatch");
    } else {
        tracing::info!("  Coverage complete");
    }
}
