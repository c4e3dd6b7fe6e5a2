//! Enumeration of eligible source images.
//!
//! Sync, audit and index all enumerate through [`enumerate_sources`], so they
//! agree on which sources should have a preview.

use crate::keys;
use crate::store::{StoreClient, StoreError};

/// An original image found in the source store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceAsset {
    /// Key relative to the source prefix: `{category}/.../{filename}.{ext}`.
    pub key: String,
    /// Full key in the source store, used to read the bytes.
    pub store_key: String,
}

impl SourceAsset {
    pub fn category(&self) -> &str {
        keys::category_of(&self.key).unwrap_or("")
    }

    pub fn filename(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }

    pub fn basename(&self) -> &str {
        keys::strip_extension(self.filename())
    }
}

/// List eligible sources below `source_prefix`, sorted by key.
///
/// With an empty `categories` slice every category is scanned; otherwise only
/// the named ones. Keys under the preview root and files outside the image
/// allow-list are dropped here. A listing failure is returned as-is: the
/// caller treats it as fatal for the run.
pub async fn enumerate_sources(
    store: &dyn StoreClient,
    source_prefix: &str,
    categories: &[String],
) -> Result<Vec<SourceAsset>, StoreError> {
    let source_prefix = keys::normalize_prefix(source_prefix);
    let root = if source_prefix.is_empty() {
        String::new()
    } else {
        format!("{}/", source_prefix)
    };

    let mut listed = Vec::new();
    if categories.is_empty() {
        listed = store.list(&root).await?;
    } else {
        for category in categories {
            let category = category.trim_matches('/');
            let dir = format!("{}{}/", root, category);
            listed.extend(store.list(&dir).await?);
        }
    }

    let mut assets: Vec<SourceAsset> = listed
        .into_iter()
        .filter_map(|store_key| {
            let key = store_key.strip_prefix(&root)?.to_string();
            keys::is_eligible(&key).then_some(SourceAsset { key, store_key })
        })
        .collect();
    assets.sort();
    assets.dedup();

    tracing::debug!(
        count = assets.len(),
        store = %store.describe(),
        "Enumerated eligible sources"
    );
    Ok(assets)
}
