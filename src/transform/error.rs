use thiserror::Error;

/// Failures while turning source bytes into a preview.
///
/// All of these are fatal for the asset at hand and never retried: the same
/// bytes would fail the same way.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("Unsupported or corrupt image: {0}")]
    UnsupportedFormat(#[from] image::ImageError),

    #[error("Image {width}x{height} is too large to encode as WebP")]
    TooLarge { width: u32, height: u32 },

    #[error("WebP encoding failed: {0}")]
    Encode(String),

    #[error("Transform task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
