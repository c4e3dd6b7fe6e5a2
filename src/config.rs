use std::path::PathBuf;

use anyhow::Context;

use crate::audit::AuditConfig;
use crate::cli::{AuditArgs, IndexArgs, StoreArgs, SyncArgs};
use crate::index::IndexConfig;
use crate::keys;
use crate::retry::RetryConfig;
use crate::store::{S3Settings, StoreLocation};
use crate::sync::{SyncConfig, UploadPolicy};
use crate::types::StoreKind;

/// Store selection shared by every command.
///
/// Locations are resolved on demand so a command that never touches the
/// target (e.g. `index`) doesn't need target options.
#[derive(Clone)]
pub struct StoreConfig {
    pub source_kind: StoreKind,
    pub source_dir: Option<PathBuf>,
    pub target_kind: StoreKind,
    pub target_dir: Option<PathBuf>,
    pub source_prefix: String,
    pub prefix: String,
    pub categories: Vec<String>,
    bucket: Option<String>,
    endpoint: Option<String>,
    region: String,
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("source_kind", &self.source_kind)
            .field("source_dir", &self.source_dir)
            .field("target_kind", &self.target_kind)
            .field("target_dir", &self.target_dir)
            .field("source_prefix", &self.source_prefix)
            .field("prefix", &self.prefix)
            .field("categories", &self.categories)
            .field("bucket", &self.bucket)
            .field("endpoint", &self.endpoint)
            .field("secret_access_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl StoreConfig {
    pub fn from_args(args: StoreArgs) -> Self {
        let source_prefix = keys::normalize_prefix(&args.source_prefix).to_string();
        let prefix = args
            .prefix
            .as_deref()
            .map(keys::normalize_prefix)
            .unwrap_or(source_prefix.as_str())
            .to_string();
        let categories = args
            .categories
            .iter()
            .map(|c| c.trim_matches('/').to_string())
            .filter(|c| !c.is_empty())
            .collect();

        Self {
            source_kind: args.source_kind,
            source_dir: args.source_dir.as_deref().map(expand_tilde),
            target_kind: args.target_kind,
            target_dir: args.target_dir.as_deref().map(expand_tilde),
            source_prefix,
            prefix,
            categories,
            bucket: args.bucket,
            endpoint: args.endpoint,
            region: args.region,
            access_key_id: args.access_key_id,
            secret_access_key: args.secret_access_key,
        }
    }

    fn s3_settings(&self) -> anyhow::Result<S3Settings> {
        let bucket = self
            .bucket
            .clone()
            .context("--bucket (or R2_BUCKET_NAME) is required for an s3 store")?;
        let access_key_id = self
            .access_key_id
            .clone()
            .context("--access-key-id (or R2_ACCESS_KEY_ID) is required for an s3 store")?;
        let secret_access_key = self
            .secret_access_key
            .clone()
            .context("R2_SECRET_ACCESS_KEY is required for an s3 store")?;
        Ok(S3Settings {
            bucket,
            endpoint: self.endpoint.clone(),
            region: self.region.clone(),
            access_key_id,
            secret_access_key,
        })
    }

    pub fn source_location(&self) -> anyhow::Result<StoreLocation> {
        match self.source_kind {
            StoreKind::Fs => {
                let root = self
                    .source_dir
                    .clone()
                    .context("--source-dir is required for an fs source")?;
                Ok(StoreLocation::Fs { root })
            }
            StoreKind::S3 => Ok(StoreLocation::S3(self.s3_settings()?)),
        }
    }

    /// An fs target without `--target-dir` writes next to the originals.
    pub fn target_location(&self) -> anyhow::Result<StoreLocation> {
        match self.target_kind {
            StoreKind::Fs => {
                let root = self
                    .target_dir
                    .clone()
                    .or_else(|| self.source_dir.clone())
                    .context("--target-dir (or --source-dir) is required for an fs target")?;
                Ok(StoreLocation::Fs { root })
            }
            StoreKind::S3 => Ok(StoreLocation::S3(self.s3_settings()?)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub stores: StoreConfig,
    pub sync: SyncConfig,
    pub watch_with_interval: Option<u64>,
}

impl SyncSettings {
    pub fn from_cli(args: SyncArgs) -> Self {
        let stores = StoreConfig::from_args(args.store);
        let mut upload = UploadPolicy::new(RetryConfig {
            max_retries: args.max_retries,
            base_delay_ms: args.retry_delay,
            ..RetryConfig::default()
        });
        upload.tiers.truncate(args.max_retries as usize + 1);

        let sync = SyncConfig {
            prefix: stores.prefix.clone(),
            source_prefix: stores.source_prefix.clone(),
            categories: stores.categories.clone(),
            max_dimension: args.max_dimension,
            quality: args.quality,
            concurrency: usize::from(args.threads_num),
            upload,
            dry_run: args.dry_run,
            no_progress_bar: args.no_progress_bar,
        };
        Self {
            stores,
            sync,
            watch_with_interval: args.watch_with_interval,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuditSettings {
    pub stores: StoreConfig,
    pub audit: AuditConfig,
    pub strict: bool,
}

impl AuditSettings {
    pub fn from_cli(args: AuditArgs) -> Self {
        let stores = StoreConfig::from_args(args.store);
        let audit = AuditConfig {
            prefix: stores.prefix.clone(),
            source_prefix: stores.source_prefix.clone(),
            categories: stores.categories.clone(),
            sample_size: args.sample_size,
        };
        Self {
            stores,
            audit,
            strict: args.strict,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexSettings {
    pub stores: StoreConfig,
    pub index: IndexConfig,
    pub output: PathBuf,
}

impl IndexSettings {
    pub fn from_cli(args: IndexArgs) -> Self {
        let stores = StoreConfig::from_args(args.store);
        let index = IndexConfig {
            prefix: stores.prefix.clone(),
            source_prefix: stores.source_prefix.clone(),
            categories: stores.categories.clone(),
            base_url: args.base_url,
        };
        Self {
            stores,
            index,
            output: expand_tilde(&args.output),
        }
    }
}
