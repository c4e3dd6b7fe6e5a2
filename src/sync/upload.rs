//! Tiered preview upload.
//!
//! Each retry attempt maps to an [`UploadTier`] that degrades the request:
//! the shared client first, then a freshly connected client in case the
//! shared one holds a stale connection, then a fresh client with the content
//! type omitted. Attempts are spaced by the configured backoff.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::keys::{PreviewKey, PREVIEW_CONTENT_TYPE};
use crate::retry::{self, RetryAction, RetryConfig};
use crate::store::{StoreClient, StoreConnector, StoreError};

use super::error::AssetError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadTier {
    /// The engine's shared target client, full request.
    Primary,
    /// A newly connected client, full request.
    FreshClient,
    /// A newly connected client, no content type.
    Minimal,
}

impl UploadTier {
    fn content_type(self) -> Option<&'static str> {
        match self {
            UploadTier::Primary | UploadTier::FreshClient => Some(PREVIEW_CONTENT_TYPE),
            UploadTier::Minimal => None,
        }
    }

    fn uses_fresh_client(self) -> bool {
        !matches!(self, UploadTier::Primary)
    }
}

/// Ordered tiers plus the delay schedule between them.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub tiers: Vec<UploadTier>,
    pub backoff: RetryConfig,
}

impl UploadPolicy {
    pub fn new(backoff: RetryConfig) -> Self {
        Self {
            tiers: vec![
                UploadTier::Primary,
                UploadTier::FreshClient,
                UploadTier::Minimal,
            ],
            backoff,
        }
    }

    fn tier_for_attempt(&self, attempt: u32) -> UploadTier {
        let idx = (attempt as usize).min(self.tiers.len().saturating_sub(1));
        self.tiers.get(idx).copied().unwrap_or(UploadTier::Primary)
    }

    fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.tiers.len().saturating_sub(1) as u32,
            ..self.backoff
        }
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

/// Upload `bytes` to `key`, walking the policy's tiers until one succeeds.
///
/// Returns the tier that succeeded. A non-retryable store error (for
/// example an invalid key) stops the walk early.
pub async fn upload_preview(
    primary: &Arc<dyn StoreClient>,
    connector: &dyn StoreConnector,
    key: &PreviewKey,
    bytes: &[u8],
    policy: &UploadPolicy,
) -> Result<UploadTier, AssetError> {
    let attempts = AtomicU32::new(0);

    let result = retry::retry_with_backoff(
        &policy.retry_config(),
        |e: &StoreError| {
            if e.is_retryable() {
                RetryAction::Retry
            } else {
                RetryAction::Abort
            }
        },
        |attempt| {
            let tier = policy.tier_for_attempt(attempt);
            attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                let client = if tier.uses_fresh_client() {
                    tracing::warn!(preview = %key, ?tier, "Retrying upload with a fresh client");
                    connector.connect()?
                } else {
                    primary.clone()
                };
                client
                    .put(key.as_str(), bytes.to_vec(), tier.content_type())
                    .await?;
                Ok::<_, StoreError>(tier)
            }
        },
    )
    .await;

    result.map_err(|last_error| AssetError::Upload {
        attempts: attempts.load(Ordering::SeqCst),
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::derive_preview_key;
    use crate::store::testing::FlakyConnector;
    use crate::store::RemoteStore;

    fn instant_policy() -> UploadPolicy {
        UploadPolicy::new(RetryConfig {
            max_retries: 0,
            base_delay_ms: 0,
            max_delay_ms: 0,
        })
    }

    fn key() -> PreviewKey {
        derive_preview_key("BB/a.jpg", "gallery").unwrap()
    }

    #[tokio::test]
    async fn test_primary_success_uses_no_fresh_client() {
        let connector = FlakyConnector::new(Arc::new(RemoteStore::in_memory()), 0);
        let primary: Arc<dyn StoreClient> = Arc::new(connector.store());
        let tier = upload_preview(&primary, &connector, &key(), b"webp", &instant_policy())
            .await
            .unwrap();
        assert_eq!(tier, UploadTier::Primary);
        assert_eq!(connector.connects.load(Ordering::SeqCst), 0);
        assert_eq!(
            *connector.content_types.lock().unwrap(),
            vec![Some("image/webp".to_string())]
        );
    }

    #[tokio::test]
    async fn test_falls_back_to_fresh_client() {
        let inner = Arc::new(RemoteStore::in_memory());
        let connector = FlakyConnector::new(inner.clone(), 1);
        let primary: Arc<dyn StoreClient> = Arc::new(connector.store());
        let tier = upload_preview(&primary, &connector, &key(), b"webp", &instant_policy())
            .await
            .unwrap();
        assert_eq!(tier, UploadTier::FreshClient);
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
        assert!(inner.head(key().as_str()).await.is_ok());
    }

    #[tokio::test]
    async fn test_minimal_tier_omits_content_type() {
        let connector = FlakyConnector::new(Arc::new(RemoteStore::in_memory()), 2);
        let primary: Arc<dyn StoreClient> = Arc::new(connector.store());
        let tier = upload_preview(&primary, &connector, &key(), b"webp", &instant_policy())
            .await
            .unwrap();
        assert_eq!(tier, UploadTier::Minimal);
        assert_eq!(*connector.content_types.lock().unwrap(), vec![None]);
    }

    #[tokio::test]
    async fn test_all_tiers_exhausted() {
        let connector = FlakyConnector::new(Arc::new(RemoteStore::in_memory()), 10);
        let primary: Arc<dyn StoreClient> = Arc::new(connector.store());
        let err = upload_preview(&primary, &connector, &key(), b"webp", &instant_policy())
            .await
            .unwrap_err();
        match err {
            AssetError::Upload { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(connector.put_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_invalid_key_aborts_without_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let fs_store: Arc<dyn StoreClient> =
            Arc::new(crate::store::FsStore::new(dir.path().to_path_buf()));
        let connector = FlakyConnector::new(fs_store.clone(), 0);
        let bad = derive_preview_key("BB/a.jpg", "../escape").unwrap();
        let err = upload_preview(&fs_store, &connector, &bad, b"webp", &instant_policy())
            .await
            .unwrap_err();
        match err {
            AssetError::Upload { attempts, .. } => assert_eq!(attempts, 1),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(connector.connects.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_tier_for_attempt_clamps() {
        let policy = UploadPolicy::default();
        assert_eq!(policy.tier_for_attempt(0), UploadTier::Primary);
        assert_eq!(policy.tier_for_attempt(2), UploadTier::Minimal);
        assert_eq!(policy.tier_for_attempt(9), UploadTier::Minimal);
        assert_eq!(policy.retry_config().max_retries, 2);
    }
}
