//! Source key → preview key mapping.
//!
//! Every place that needs to know where a preview lives (the sync engine, the
//! coverage audit and the gallery index) goes through [`derive_preview_key`],
//! so the three can never disagree about a key.

use std::fmt;

/// Reserved first segment under which previews are stored.
pub const PREVIEW_ROOT: &str = "0_preview";

/// Extension given to every preview.
pub const PREVIEW_EXTENSION: &str = "webp";

/// Content type written alongside every preview.
pub const PREVIEW_CONTENT_TYPE: &str = "image/webp";

/// Top-level directories of a gallery checkout that are never categories.
/// Hidden directories (`.git`, ...) are skipped as well.
pub const EXCLUDED_CATEGORIES: [&str; 4] = ["public", "archive", "backup", "node_modules"];

/// Source extensions that get a preview. Compared case-insensitively.
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "bmp", "webp"];

/// Store key of a preview, e.g. `gallery/0_preview/BB/0008-photo.webp`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PreviewKey(String);

impl PreviewKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PreviewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PreviewKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Strip leading and trailing `/` from a configured prefix.
pub fn normalize_prefix(prefix: &str) -> &str {
    prefix.trim_matches('/')
}

/// Join a (possibly empty) prefix and a relative key with a single `/`.
pub fn join_key(prefix: &str, key: &str) -> String {
    let prefix = normalize_prefix(prefix);
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}/{}", prefix, key)
    }
}

/// Key prefix under which all previews of `category` live, with a trailing `/`.
/// An empty `category` yields the preview root itself.
pub fn preview_dir(prefix: &str, category: &str) -> String {
    let root = join_key(prefix, PREVIEW_ROOT);
    if category.is_empty() {
        format!("{}/", root)
    } else {
        format!("{}/{}/", root, category)
    }
}

/// Derive the preview key for a source key of the form `{category}/.../{filename}.{ext}`.
///
/// Returns `None` when the key is not eligible for a preview: fewer than two
/// segments, an empty category or basename, or a category that is itself the
/// preview root.
pub fn derive_preview_key(source_key: &str, prefix: &str) -> Option<PreviewKey> {
    let parts: Vec<&str> = source_key.split('/').collect();
    if parts.len() < 2 {
        return None;
    }
    let category = parts[0];
    if category.is_empty() || category == PREVIEW_ROOT {
        return None;
    }
    let filename = parts[parts.len() - 1];
    let basename = strip_extension(filename);
    if basename.is_empty() {
        return None;
    }
    let relative = format!(
        "{}/{}/{}.{}",
        PREVIEW_ROOT, category, basename, PREVIEW_EXTENSION
    );
    Some(PreviewKey(join_key(prefix, &relative)))
}

/// First path segment of a source key.
pub fn category_of(source_key: &str) -> Option<&str> {
    match source_key.split_once('/') {
        Some((category, _)) if !category.is_empty() => Some(category),
        _ => None,
    }
}

/// File name with its trailing extension removed at the last `.`.
///
/// A name without a `.`, or ending in `.`, is returned unchanged.
pub fn strip_extension(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(idx) if idx + 1 < filename.len() => &filename[..idx],
        _ => filename,
    }
}

/// Lower-cased extension after the last `.`, if any.
pub fn extension_of(filename: &str) -> Option<String> {
    let name = filename.rsplit('/').next().unwrap_or(filename);
    match name.rfind('.') {
        Some(idx) if idx + 1 < name.len() => Some(name[idx + 1..].to_ascii_lowercase()),
        _ => None,
    }
}

pub fn is_excluded_category(category: &str) -> bool {
    category.starts_with('.') || EXCLUDED_CATEGORIES.contains(&category)
}

/// Whether a source key should have a preview: an allow-listed image
/// extension, a category that isn't excluded, and a structure
/// [`derive_preview_key`] accepts.
pub fn is_eligible(source_key: &str) -> bool {
    let has_image_ext = extension_of(source_key)
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()));
    let excluded = category_of(source_key).is_some_and(is_excluded_category);
    has_image_ext && !excluded && derive_preview_key(source_key, "").is_some()
}
