use std::time::Duration;

use super::upload::UploadTier;

/// Terminal state of one asset's pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetOutcome {
    /// A preview already existed at the derived key.
    Skipped,
    /// A preview was generated and written.
    Uploaded { tier: UploadTier, bytes: usize },
    /// Dry run: a preview would have been generated.
    WouldUpload,
    /// Any step after key derivation failed.
    Failed { class: &'static str, message: String },
}

/// Per-run tally. Lives only for the duration of one run.
#[derive(Debug, Clone, Default)]
pub struct SyncResult {
    /// Eligible sources whose derived key was claimed by this run.
    pub total: usize,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Sources excluded because another source maps to the same preview key.
    pub collisions: usize,
    /// Uploads that needed a fallback tier.
    pub degraded_uploads: usize,
    /// Encoded preview bytes written this run.
    pub bytes_written: usize,
    /// Set when a shutdown stopped dispatch before every asset ran.
    pub interrupted: bool,
    /// `(source key, outcome)` in completion order.
    pub outcomes: Vec<(String, AssetOutcome)>,
    pub elapsed: Duration,
}

impl SyncResult {
    /// Fold one completed asset into the tally.
    pub fn record(&mut self, source_key: String, outcome: AssetOutcome) {
        match &outcome {
            AssetOutcome::Skipped => self.skipped += 1,
            AssetOutcome::Uploaded { tier, bytes } => {
                self.processed += 1;
                self.bytes_written += bytes;
                if *tier != UploadTier::Primary {
                    self.degraded_uploads += 1;
                }
            }
            AssetOutcome::WouldUpload => self.processed += 1,
            AssetOutcome::Failed { .. } => self.failed += 1,
        }
        self.outcomes.push((source_key, outcome));
    }

    /// Source keys of failed assets, in completion order.
    pub fn failed_keys(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, AssetOutcome::Failed { .. }))
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Assets that reached a terminal state.
    pub fn completed(&self) -> usize {
        self.processed + self.skipped + self.failed
    }
}

pub fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m {:02}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}
