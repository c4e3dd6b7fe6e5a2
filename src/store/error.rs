use thiserror::Error;

/// Errors returned by every [`StoreClient`](super::StoreClient) variant.
///
/// `NotFound` is the only variant an existence probe may turn into `false`;
/// everything else (credentials, permissions, network) must propagate.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Object not found: {key}")]
    NotFound { key: String },

    #[error("Invalid object key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("I/O error on {key}: {source}")]
    Io {
        key: String,
        source: std::io::Error,
    },

    #[error("Object store error on {key}: {source}")]
    Backend {
        key: String,
        source: object_store::Error,
    },

    #[error("Failed to connect store: {0}")]
    Connect(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// Whether a retry against the same or a fresh client could succeed.
    ///
    /// Malformed keys and missing objects never change between attempts.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::NotFound { .. } | StoreError::InvalidKey { .. } => false,
            StoreError::Io { source, .. } => !matches!(
                source.kind(),
                std::io::ErrorKind::PermissionDenied | std::io::ErrorKind::InvalidInput
            ),
            StoreError::Backend { .. } | StoreError::Connect(_) => true,
        }
    }

    /// Map an `io::Error`, folding `NotFound` into the typed variant.
    pub(crate) fn from_io(key: &str, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            StoreError::NotFound {
                key: key.to_string(),
            }
        } else {
            StoreError::Io {
                key: key.to_string(),
                source,
            }
        }
    }

    /// Map an `object_store::Error`, folding `NotFound` into the typed variant.
    pub(crate) fn from_backend(key: &str, source: object_store::Error) -> Self {
        match source {
            object_store::Error::NotFound { .. } => StoreError::NotFound {
                key: key.to_string(),
            },
            source => StoreError::Backend {
                key: key.to_string(),
                source,
            },
        }
    }
}
