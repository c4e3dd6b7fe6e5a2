use clap::{Args, Parser, Subcommand};

use crate::types::{LogLevel, StoreKind};

#[derive(Parser, Debug)]
#[command(
    name = "gallery-preview",
    about = "Keep a WebP preview for every gallery image and audit coverage"
)]
pub struct Cli {
    /// Log level
    #[arg(long, value_enum, default_value = "info", global = true)]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate missing previews
    Sync(SyncArgs),
    /// Compare eligible sources with the previews that exist
    Audit(AuditArgs),
    /// Write the gallery index JSON
    Index(IndexArgs),
}

/// Where originals are read from and previews are written to.
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Store holding the original images
    #[arg(long, value_enum, default_value = "fs")]
    pub source_kind: StoreKind,

    /// Root directory of originals (fs source)
    #[arg(long)]
    pub source_dir: Option<String>,

    /// Directory prefix of originals inside the source store
    #[arg(long, env = "R2_IMAGE_DIR", default_value = "")]
    pub source_prefix: String,

    /// Store receiving the previews
    #[arg(long, value_enum, default_value = "fs")]
    pub target_kind: StoreKind,

    /// Root directory for previews (fs target; defaults to --source-dir)
    #[arg(long)]
    pub target_dir: Option<String>,

    /// Root prepended to every preview key (defaults to --source-prefix)
    #[arg(long)]
    pub prefix: Option<String>,

    /// Category to process (repeatable; default: all)
    #[arg(short = 'c', long = "category")]
    pub categories: Vec<String>,

    /// Bucket name (s3)
    #[arg(long, env = "R2_BUCKET_NAME")]
    pub bucket: Option<String>,

    /// S3-compatible endpoint URL, e.g. an R2 account endpoint
    #[arg(long, env = "R2_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Bucket region
    #[arg(long, env = "R2_REGION", default_value = "auto")]
    pub region: String,

    /// Access key id (s3)
    #[arg(long, env = "R2_ACCESS_KEY_ID", hide_env_values = true)]
    pub access_key_id: Option<String>,

    /// Secret access key (s3).
    /// WARNING: passing via --secret-access-key is visible in process listings.
    /// Prefer the R2_SECRET_ACCESS_KEY environment variable instead.
    #[arg(long, env = "R2_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub secret_access_key: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SyncArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Longest side of a preview in pixels
    #[arg(long, default_value_t = 800, value_parser = clap::value_parser!(u32).range(1..=16383))]
    pub max_dimension: u32,

    /// Base compression quality; previews are encoded at a derived, lower quality
    #[arg(long, env = "IMAGE_COMPRESSION_QUALITY", default_value_t = 80,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality: u8,

    /// Number of assets processed concurrently
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u16).range(1..))]
    pub threads_num: u16,

    /// Upload fallback attempts after the first (0 disables fallback, at most 2)
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u32).range(0..=2))]
    pub max_retries: u32,

    /// Initial delay between upload attempts (ms, doubled each attempt)
    #[arg(long, default_value_t = 500)]
    pub retry_delay: u64,

    /// Report what would be generated without transforming or writing
    #[arg(long)]
    pub dry_run: bool,

    /// Disable progress bar
    #[arg(long)]
    pub no_progress_bar: bool,

    /// Run continuously, waiting N seconds between runs
    #[arg(long)]
    pub watch_with_interval: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct AuditArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Number of previews re-probed to confirm they are retrievable
    #[arg(long, default_value_t = 5)]
    pub sample_size: usize,

    /// Exit non-zero when coverage is incomplete
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Debug, Clone)]
pub struct IndexArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Output file
    #[arg(short = 'o', long, default_value = "gallery-index.json")]
    pub output: String,

    /// Public base URL prepended to every image URL
    #[arg(long, env = "R2_PUBLIC_URL", default_value = "")]
    pub base_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_defaults() {
        let cli = Cli::try_parse_from(["gallery-preview", "sync", "--source-dir", "/photos"])
            .unwrap();
        let Command::Sync(args) = cli.command else {
            panic!("expected sync");
        };
        assert_eq!(args.max_dimension, 800);
        assert_eq!(args.threads_num, 4);
        assert_eq!(args.store.source_kind, StoreKind::Fs);
        assert_eq!(args.store.source_dir.as_deref(), Some("/photos"));
        assert!(!args.dry_run);
    }

    #[test]
    fn test_quality_range_is_enforced() {
        assert!(Cli::try_parse_from(["gallery-preview", "sync", "--quality", "0"]).is_err());
        assert!(Cli::try_parse_from(["gallery-preview", "sync", "--quality", "101"]).is_err());
        assert!(Cli::try_parse_from(["gallery-preview", "sync", "--quality", "100"]).is_ok());
    }

    #[test]
    fn test_repeatable_category() {
        let cli = Cli::try_parse_from([
            "gallery-preview",
            "audit",
            "--category",
            "BB",
            "-c",
            "PH7",
            "--strict",
        ])
        .unwrap();
        let Command::Audit(args) = cli.command else {
            panic!("expected audit");
        };
        assert_eq!(args.store.categories, vec!["BB", "PH7"]);
        assert_eq!(args.sample_size, 5);
        assert!(args.strict);
    }

    #[test]
    fn test_global_log_level_after_subcommand() {
        let cli = Cli::try_parse_from([
            "gallery-preview",
            "index",
            "--log-level",
            "warn",
            "--source-kind",
            "s3",
        ])
        .unwrap();
        assert_eq!(cli.log_level, LogLevel::Warn);
        let Command::Index(args) = cli.command else {
            panic!("expected index");
        };
        assert_eq!(args.output, "gallery-index.json");
        assert_eq!(args.store.source_kind, StoreKind::S3);
    }
}
