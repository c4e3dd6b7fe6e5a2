use std::sync::Arc;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};

use super::{ObjectInfo, S3Settings, StoreClient, StoreError};

/// Store backed by any `object_store` implementation (S3, R2, in-memory).
#[derive(Debug, Clone)]
pub struct RemoteStore {
    inner: Arc<dyn ObjectStore>,
    label: String,
}

impl RemoteStore {
    pub fn new(inner: Arc<dyn ObjectStore>, label: impl Into<String>) -> Self {
        Self {
            inner,
            label: label.into(),
        }
    }

    /// Build a client for an S3-compatible bucket. Every call builds a new
    /// HTTP client with its own connection pool.
    pub fn connect_s3(settings: &S3Settings) -> Result<Self, StoreError> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&settings.bucket)
            .with_region(&settings.region)
            .with_access_key_id(&settings.access_key_id)
            .with_secret_access_key(&settings.secret_access_key);
        if let Some(endpoint) = &settings.endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        let s3 = builder
            .build()
            .map_err(|e| StoreError::Connect(e.to_string()))?;
        let label = match &settings.endpoint {
            Some(endpoint) => format!("s3://{} ({})", settings.bucket, endpoint),
            None => format!("s3://{}", settings.bucket),
        };
        Ok(Self::new(Arc::new(s3), label))
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(object_store::memory::InMemory::new()),
            "memory://",
        )
    }

    fn object_path(key: &str) -> Result<ObjectPath, StoreError> {
        ObjectPath::parse(key).map_err(|e| StoreError::InvalidKey {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Segment-aligned part of a raw string prefix, i.e. everything up to the
/// last `/`. Listing uses it and then filters on the full prefix.
fn listing_dir(prefix: &str) -> Option<&str> {
    match prefix.rfind('/') {
        Some(idx) if idx > 0 => Some(&prefix[..idx]),
        _ => None,
    }
}

#[async_trait]
impl StoreClient for RemoteStore {
    async fn head(&self, key: &str) -> Result<ObjectInfo, StoreError> {
        let path = Self::object_path(key)?;
        let meta = self
            .inner
            .head(&path)
            .await
            .map_err(|e| StoreError::from_backend(key, e))?;
        Ok(ObjectInfo {
            key: key.to_string(),
            size: meta.size as u64,
        })
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = Self::object_path(key)?;
        let result = self
            .inner
            .get(&path)
            .await
            .map_err(|e| StoreError::from_backend(key, e))?;
        let bytes = result
            .bytes()
            .await
            .map_err(|e| StoreError::from_backend(key, e))?;
        Ok(bytes.to_vec())
    }

    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), StoreError> {
        let path = Self::object_path(key)?;
        let mut attributes = Attributes::new();
        if let Some(content_type) = content_type {
            attributes.insert(Attribute::ContentType, content_type.to_string().into());
        }
        let opts = PutOptions {
            attributes,
            ..Default::default()
        };
        self.inner
            .put_opts(&path, PutPayload::from(bytes), opts)
            .await
            .map_err(|e| StoreError::from_backend(key, e))?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let dir = listing_dir(prefix).map(ObjectPath::from);
        let metas: Vec<_> = self
            .inner
            .list(dir.as_ref())
            .try_collect()
            .await
            .map_err(|e| StoreError::from_backend(prefix, e))?;
        let mut keys: Vec<String> = metas
            .into_iter()
            .map(|m| m.location.to_string())
            .filter(|k| k.starts_with(prefix))
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = Self::object_path(key)?;
        match self.inner.delete(&path).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(StoreError::from_backend(key, e)),
        }
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}
