//! Gallery index: the JSON document the gallery front end reads to find
//! originals and their previews.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::keys;
use crate::source::{self, SourceAsset};
use crate::store::StoreClient;
use crate::sync::SetupError;

#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub prefix: String,
    pub source_prefix: String,
    pub categories: Vec<String>,
    /// Prepended to every URL. Empty yields root-relative URLs.
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexImage {
    pub name: String,
    pub original: String,
    pub preview: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexCategory {
    pub name: String,
    pub images: Vec<IndexImage>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GalleryIndex {
    pub gallery: BTreeMap<String, IndexCategory>,
    pub total_images: usize,
    pub generated_at: DateTime<Utc>,
}

fn url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key)
}

fn index_image(asset: &SourceAsset, config: &IndexConfig) -> Option<IndexImage> {
    let preview = keys::derive_preview_key(&asset.key, &config.prefix)?;
    Some(IndexImage {
        name: asset.basename().to_string(),
        original: url(&config.base_url, &asset.store_key),
        preview: url(&config.base_url, preview.as_str()),
        category: asset.category().to_string(),
    })
}

/// Enumerate eligible sources and group them by category.
pub async fn build_index(
    store: &dyn StoreClient,
    config: &IndexConfig,
) -> Result<GalleryIndex, SetupError> {
    let sources = source::enumerate_sources(store, &config.source_prefix, &config.categories)
        .await
        .map_err(|e| SetupError::SourceUnreachable {
            location: store.describe(),
            source: e,
        })?;

    let mut gallery: BTreeMap<String, IndexCategory> = BTreeMap::new();
    for asset in &sources {
        let Some(image) = index_image(asset, config) else {
            continue;
        };
        gallery
            .entry(image.category.clone())
            .or_insert_with(|| IndexCategory {
                name: image.category.clone(),
                images: Vec::new(),
                count: 0,
            })
            .images
            .push(image);
    }

    let mut total_images = 0;
    for category in gallery.values_mut() {
        category.images.sort_by(|a, b| a.name.cmp(&b.name));
        category.count = category.images.len();
        total_images += category.count;
    }

    Ok(GalleryIndex {
        gallery,
        total_images,
        generated_at: Utc::now(),
    })
}

/// Write the index as pretty JSON, replacing `path` atomically.
pub async fn write_index(path: &Path, index: &GalleryIndex) -> anyhow::Result<()> {
    let json = serde_json::to_vec_pretty(index).context("Failed to serialize gallery index")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "gallery-index.json".to_string());
    let part = path.with_file_name(format!(".{}.part", file_name));
    tokio::fs::write(&part, &json)
        .await
        .with_context(|| format!("Failed to write {}", part.display()))?;
    tokio::fs::rename(&part, path)
        .await
        .with_context(|| format!("Failed to move index into place at {}", path.display()))?;
    Ok(())
}
