use thiserror::Error;

use crate::store::StoreError;
use crate::transform::TransformError;

/// Why a single asset ended in the `Failed` state.
///
/// These never abort a run: the engine logs them against the source key,
/// counts them and moves on.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Existence probe failed: {0}")]
    Probe(#[source] StoreError),

    #[error("Reading source failed: {0}")]
    Read(#[source] StoreError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("Upload failed after {attempts} attempts: {last_error}")]
    Upload {
        attempts: u32,
        #[source]
        last_error: StoreError,
    },
}

impl AssetError {
    /// Short error class for log fields and failure summaries.
    pub fn class(&self) -> &'static str {
        match self {
            AssetError::Probe(_) => "probe",
            AssetError::Read(_) => "read",
            AssetError::Transform(TransformError::UnsupportedFormat(_)) => "unsupported-format",
            AssetError::Transform(_) => "transform",
            AssetError::Upload { .. } => "upload",
        }
    }

    /// Whether the failure was transient, i.e. a later run may succeed
    /// without any change to the source.
    pub fn is_retryable(&self) -> bool {
        match self {
            AssetError::Probe(e) | AssetError::Read(e) => e.is_retryable(),
            AssetError::Transform(_) => false,
            AssetError::Upload { last_error, .. } => last_error.is_retryable(),
        }
    }
}

/// Failures that stop a run before any asset is dispatched.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Source store {location} is unreachable: {source}")]
    SourceUnreachable {
        location: String,
        #[source]
        source: StoreError,
    },

    #[error("Target store could not be connected: {0}")]
    TargetConnect(#[source] StoreError),

    #[error("Target store {location} could not be listed: {source}")]
    TargetUnreachable {
        location: String,
        #[source]
        source: StoreError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        let decode = image::ImageError::IoError(std::io::Error::other("bad"));
        assert_eq!(
            AssetError::Transform(TransformError::UnsupportedFormat(decode)).class(),
            "unsupported-format"
        );
        assert_eq!(
            AssetError::Transform(TransformError::Encode("x".into())).class(),
            "transform"
        );
        assert!(!AssetError::Transform(TransformError::Encode("x".into())).is_retryable());
        let missing = AssetError::Read(StoreError::NotFound { key: "BB/a.jpg".into() });
        assert!(!missing.is_retryable());
        let err = AssetError::Upload {
            attempts: 3,
            last_error: StoreError::Connect("down".into()),
        };
        assert_eq!(err.class(), "upload");
        assert!(err.is_retryable());
        assert!(err.to_string().contains("after 3 attempts"));
    }
}
