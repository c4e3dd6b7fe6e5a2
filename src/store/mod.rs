//! Store abstraction shared by the source side and the preview side.
//!
//! Two variants implement [`StoreClient`] with identical semantics:
//! - [`FsStore`]: a directory tree; key segments map to path components.
//! - [`RemoteStore`]: a flat S3-compatible keyspace via `object_store`.
//!
//! `put` is always an upsert, and `head`/`get`/`delete` on a missing key
//! return [`StoreError::NotFound`].

pub mod error;
pub mod fs;
pub mod remote;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

pub use error::StoreError;
pub use fs::FsStore;
pub use remote::RemoteStore;

/// Metadata returned by [`StoreClient::head`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
}

/// Object-safe store client, shared as `Arc<dyn StoreClient>` across tasks.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Fetch size metadata without reading the body.
    async fn head(&self, key: &str) -> Result<ObjectInfo, StoreError>;

    /// Read the full object body.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Create or overwrite `key`. `content_type` is omitted from the request
    /// when `None`.
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), StoreError>;

    /// All keys starting with `prefix`, sorted. An empty prefix lists everything.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Human-readable location for logs.
    fn describe(&self) -> String;
}

/// Existence probe: `Ok(false)` only on `NotFound`, every other error propagates.
pub async fn exists(store: &dyn StoreClient, key: &str) -> Result<bool, StoreError> {
    match store.head(key).await {
        Ok(_) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

/// Builds new, independent client instances.
///
/// The upload fallback asks for a fresh client instead of reusing one that
/// may hold a poisoned connection pool.
pub trait StoreConnector: Send + Sync {
    fn connect(&self) -> Result<Arc<dyn StoreClient>, StoreError>;
}

/// S3/R2 connection settings.
#[derive(Clone)]
pub struct S3Settings {
    pub bucket: String,
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for S3Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Settings")
            .field("bucket", &self.bucket)
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key_id", &redact(&self.access_key_id))
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

fn redact(value: &str) -> String {
    let shown: String = value.chars().take(4).collect();
    format!("{}...", shown)
}

/// Where a store lives. Connecting yields a fresh client each time.
#[derive(Debug, Clone)]
pub enum StoreLocation {
    Fs { root: PathBuf },
    S3(S3Settings),
}

impl StoreConnector for StoreLocation {
    fn connect(&self) -> Result<Arc<dyn StoreClient>, StoreError> {
        match self {
            StoreLocation::Fs { root } => Ok(Arc::new(FsStore::new(root.clone()))),
            StoreLocation::S3(settings) => Ok(Arc::new(RemoteStore::connect_s3(settings)?)),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Store doubles shared by the sync and audit tests.

    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Wraps a store and fails the first `fail_puts` put calls across every
    /// instance built from the same [`FlakyConnector`]. Records the content
    /// type of every put that reached the inner store.
    pub struct FlakyStore {
        inner: Arc<dyn StoreClient>,
        remaining_failures: Arc<AtomicU32>,
        pub put_calls: Arc<AtomicU32>,
        pub content_types: Arc<Mutex<Vec<Option<String>>>>,
        fail_head_keys: Arc<HashSet<String>>,
    }

    #[async_trait]
    impl StoreClient for FlakyStore {
        async fn head(&self, key: &str) -> Result<ObjectInfo, StoreError> {
            if self.fail_head_keys.contains(key) {
                return Err(StoreError::Connect("access denied".into()));
            }
            self.inner.head(key).await
        }

        async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
            self.inner.get(key).await
        }

        async fn put(
            &self,
            key: &str,
            bytes: Vec<u8>,
            content_type: Option<&str>,
        ) -> Result<(), StoreError> {
            self.put_calls.fetch_add(1, Ordering::SeqCst);
            let should_fail = self
                .remaining_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if should_fail {
                return Err(StoreError::Connect("simulated upload failure".into()));
            }
            self.content_types
                .lock()
                .unwrap()
                .push(content_type.map(str::to_string));
            self.inner.put(key, bytes, content_type).await
        }

        async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
            self.inner.list(prefix).await
        }

        async fn delete(&self, key: &str) -> Result<(), StoreError> {
            self.inner.delete(key).await
        }

        fn describe(&self) -> String {
            format!("flaky({})", self.inner.describe())
        }
    }

    /// Hands out [`FlakyStore`]s that share one failure budget and one inner store.
    pub struct FlakyConnector {
        pub inner: Arc<dyn StoreClient>,
        pub remaining_failures: Arc<AtomicU32>,
        pub put_calls: Arc<AtomicU32>,
        pub connects: Arc<AtomicU32>,
        pub content_types: Arc<Mutex<Vec<Option<String>>>>,
        pub fail_head_keys: Arc<HashSet<String>>,
    }

    impl FlakyConnector {
        pub fn new(inner: Arc<dyn StoreClient>, fail_puts: u32) -> Self {
            Self {
                inner,
                remaining_failures: Arc::new(AtomicU32::new(fail_puts)),
                put_calls: Arc::new(AtomicU32::new(0)),
                connects: Arc::new(AtomicU32::new(0)),
                content_types: Arc::new(Mutex::new(Vec::new())),
                fail_head_keys: Arc::new(HashSet::new()),
            }
        }

        pub fn failing_head_on(mut self, key: &str) -> Self {
            let mut keys = (*self.fail_head_keys).clone();
            keys.insert(key.to_string());
            self.fail_head_keys = Arc::new(keys);
            self
        }

        pub fn store(&self) -> FlakyStore {
            FlakyStore {
                inner: self.inner.clone(),
                remaining_failures: self.remaining_failures.clone(),
                put_calls: self.put_calls.clone(),
                content_types: self.content_types.clone(),
                fail_head_keys: self.fail_head_keys.clone(),
            }
        }
    }

    impl StoreConnector for FlakyConnector {
        fn connect(&self) -> Result<Arc<dyn StoreClient>, StoreError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(self.store()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn assert_probe_semantics(store: &dyn StoreClient) {
        assert!(!exists(store, "BB/missing.webp").await.unwrap());
        store
            .put("BB/present.webp", b"data".to_vec(), Some("image/webp"))
            .await
            .unwrap();
        assert!(exists(store, "BB/present.webp").await.unwrap());
    }

    #[tokio::test]
    async fn test_exists_on_fs_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path().to_path_buf());
        assert_probe_semantics(&store).await;
    }

    #[tokio::test]
    async fn test_exists_on_remote_store() {
        let store = RemoteStore::in_memory();
        assert_probe_semantics(&store).await;
    }

    #[tokio::test]
    async fn test_exists_propagates_non_not_found_errors() {
        let connector = testing::FlakyConnector::new(Arc::new(RemoteStore::in_memory()), 0)
            .failing_head_on("BB/x.webp");
        let store = connector.store();
        let err = exists(&store, "BB/x.webp").await.unwrap_err();
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_fs_location_connects() {
        let location = StoreLocation::Fs {
            root: PathBuf::from("/tmp/previews"),
        };
        let client = location.connect().unwrap();
        assert!(client.describe().contains("/tmp/previews"));
    }

    #[test]
    fn test_s3_settings_debug_redacts_secrets() {
        let settings = S3Settings {
            bucket: "b".into(),
            endpoint: None,
            region: "auto".into(),
            access_key_id: "AKIAEXAMPLE".into(),
            secret_access_key: "supersecret".into(),
        };
        let out = format!("{:?}", settings);
        assert!(!out.contains("supersecret"));
        assert!(!out.contains("AKIAEXAMPLE"));
        assert!(out.contains("AKIA..."));
    }
}
