//! Source bytes → WebP preview.
//!
//! Decodes with `image`, rotates upright from the EXIF orientation, shrinks
//! so the longer side fits `max_dimension` (never enlarges), and encodes lossy
//! WebP. The output carries no EXIF block, so no orientation tag survives.

pub mod error;
pub mod orientation;

use image::imageops::FilterType;
use image::DynamicImage;

pub use error::TransformError;

/// Hard WebP limit on either side.
const WEBP_MAX_DIMENSION: u32 = 16383;

/// Quality used when the configured base quality is 100 or more.
pub const FALLBACK_QUALITY: u8 = 70;

/// Lowest quality the scaling policy will produce.
pub const QUALITY_FLOOR: u8 = 50;

/// An encoded preview.
#[derive(Debug, Clone)]
pub struct Preview {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub quality: u8,
}

/// Encoding quality derived from the configured base quality.
///
/// Near-lossless settings would make previews larger than their sources, so a
/// base of 100 or more falls back to [`FALLBACK_QUALITY`]; anything lower is
/// scaled by 0.75 and floored at [`QUALITY_FLOOR`]. The result is always in
/// `[50, 100)`.
pub fn effective_quality(base: u8) -> u8 {
    if base >= 100 {
        return FALLBACK_QUALITY;
    }
    let scaled = (f64::from(base) * 0.75).round() as u8;
    scaled.max(QUALITY_FLOOR)
}

/// Target size for a `width`x`height` image bounded by `max_dimension`.
///
/// Images already within bounds keep their size. Otherwise the longer side
/// becomes `max_dimension` and the other side scales proportionally, rounded
/// to the nearest pixel and never below 1.
pub fn target_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    if width <= max_dimension && height <= max_dimension {
        return (width, height);
    }
    let max = f64::from(max_dimension);
    if width > height {
        let h = (f64::from(height) * max / f64::from(width)).round() as u32;
        (max_dimension, h.max(1))
    } else {
        let w = (f64::from(width) * max / f64::from(height)).round() as u32;
        (w.max(1), max_dimension)
    }
}

/// Produce a preview from raw source bytes. CPU-bound; call from a blocking task.
pub fn transform(raw: &[u8], max_dimension: u32, quality: u8) -> Result<Preview, TransformError> {
    let mut img = image::load_from_memory(raw)?;

    if let Some(orientation) = orientation::read_orientation(raw) {
        img.apply_orientation(orientation);
    }

    let (width, height) = target_dimensions(img.width(), img.height(), max_dimension);
    if (width, height) != (img.width(), img.height()) {
        img = img.resize_exact(width, height, FilterType::Lanczos3);
    }

    let bytes = encode_webp(&img, quality)?;
    Ok(Preview {
        bytes,
        width,
        height,
        quality,
    })
}

/// Run [`transform`] on the blocking pool.
pub async fn transform_blocking(
    raw: Vec<u8>,
    max_dimension: u32,
    quality: u8,
) -> Result<Preview, TransformError> {
    tokio::task::spawn_blocking(move || transform(&raw, max_dimension, quality)).await?
}

fn encode_webp(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, TransformError> {
    let (width, height) = (img.width(), img.height());
    if width > WEBP_MAX_DIMENSION || height > WEBP_MAX_DIMENSION {
        return Err(TransformError::TooLarge { width, height });
    }
    let quality = f32::from(quality.clamp(1, 100));

    // libwebp only takes 8-bit RGB/RGBA; keep alpha when the source has it.
    let encoded = if img.color().has_alpha() {
        let rgba = img.to_rgba8();
        webp::Encoder::from_rgba(rgba.as_raw(), width, height).encode_simple(false, quality)
    } else {
        let rgb = img.to_rgb8();
        webp::Encoder::from_rgb(rgb.as_raw(), width, height).encode_simple(false, quality)
    };
    encoded
        .map(|mem| mem.to_vec())
        .map_err(|e| TransformError::Encode(format!("{:?}", e)))
}
