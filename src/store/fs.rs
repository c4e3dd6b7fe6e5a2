use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{ObjectInfo, StoreClient, StoreError};

/// Suffix of in-flight writes; such files are never listed.
const PART_SUFFIX: &str = ".part";

/// Store backed by a directory tree rooted at `root`.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Map a `/`-separated key onto a path below the root, rejecting keys
    /// that would escape it.
    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let invalid = |reason: &str| StoreError::InvalidKey {
            key: key.to_string(),
            reason: reason.to_string(),
        };
        if key.is_empty() {
            return Err(invalid("empty key"));
        }
        let mut path = self.root.clone();
        for segment in key.split('/') {
            if segment.is_empty() {
                return Err(invalid("empty path segment"));
            }
            match Path::new(segment).components().next() {
                Some(Component::Normal(_)) => path.push(segment),
                _ => return Err(invalid("segment is not a plain name")),
            }
        }
        Ok(path)
    }
}

/// Temp path next to the destination so the final rename stays on one filesystem.
fn part_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}{}", name, PART_SUFFIX))
}

/// Recursively collect `/`-joined keys of regular files below `dir`.
fn walk_keys(root: &Path, dir: &Path, keys: &mut Vec<String>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let path = entry.path();
        if file_type.is_dir() {
            walk_keys(root, &path, keys)?;
        } else if file_type.is_file() {
            let name = entry.file_name();
            if name.to_string_lossy().ends_with(PART_SUFFIX) {
                continue;
            }
            if let Ok(relative) = path.strip_prefix(root) {
                let key: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                keys.push(key.join("/"));
            }
        }
    }
    Ok(())
}

#[async_trait]
impl StoreClient for FsStore {
    async fn head(&self, key: &str) -> Result<ObjectInfo, StoreError> {
        let path = self.path_for(key)?;
        let meta = fs::metadata(&path)
            .await
            .map_err(|e| StoreError::from_io(key, e))?;
        if !meta.is_file() {
            return Err(StoreError::NotFound {
                key: key.to_string(),
            });
        }
        Ok(ObjectInfo {
            key: key.to_string(),
            size: meta.len(),
        })
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(key)?;
        fs::read(&path).await.map_err(|e| StoreError::from_io(key, e))
    }

    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: Option<&str>,
    ) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let io_err = |e: std::io::Error| StoreError::Io {
            key: key.to_string(),
            source: e,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        // Readers never observe a half-written preview: write aside, then rename.
        let tmp = part_path(&path);
        let mut file = fs::File::create(&tmp).await.map_err(io_err)?;
        if let Err(e) = file.write_all(&bytes).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(io_err(e));
        }
        file.flush().await.map_err(io_err)?;
        drop(file);
        fs::rename(&tmp, &path).await.map_err(io_err)?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        // A root that was never created holds no keys; callers decide
        // whether that is fatal.
        if !fs::try_exists(&self.root).await.unwrap_or(false) {
            return Err(StoreError::NotFound {
                key: prefix.to_string(),
            });
        }
        let root = self.root.clone();
        let walked = tokio::task::spawn_blocking(move || {
            let mut keys = Vec::new();
            walk_keys(&root, &root, &mut keys)?;
            Ok::<_, std::io::Error>(keys)
        })
        .await
        .map_err(|e| StoreError::Io {
            key: prefix.to_string(),
            source: std::io::Error::other(e),
        })?;

        let mut keys = walked.map_err(|e| StoreError::Io {
            key: prefix.to_string(),
            source: e,
        })?;
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }

    /// Deleting a missing key succeeds, matching object-store semantics.
    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::from_io(key, e)),
        }
    }

    fn describe(&self) -> String {
        format!("fs://{}", self.root.display())
    }
}
