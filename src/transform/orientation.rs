use std::io::Cursor;

use image::metadata::Orientation;

/// Read the EXIF `Orientation` tag from an encoded image.
///
/// Returns `None` when the container has no EXIF block, the tag is missing,
/// or the value is outside 1..=8. Missing EXIF is the common case for PNG,
/// GIF and BMP sources and is not an error.
pub fn read_orientation(bytes: &[u8]) -> Option<Orientation> {
    let exif_reader = exif::Reader::new();
    let exif_data = match exif_reader.read_from_container(&mut Cursor::new(bytes)) {
        Ok(data) => data,
        Err(e) => {
            tracing::trace!("No EXIF data: {}", e);
            return None;
        }
    };
    let field = exif_data.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let value = field.value.get_uint(0)?;
    u8::try_from(value).ok().and_then(Orientation::from_exif)
}

/// Splice an APP1 Exif segment carrying only `Orientation` into a JPEG,
/// right after its SOI marker.
#[cfg(test)]
pub(crate) fn with_exif_orientation(jpeg: &[u8], value: u16) -> Vec<u8> {
    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"MM\x00\x2a");
    tiff.extend_from_slice(&8u32.to_be_bytes());
    tiff.extend_from_slice(&1u16.to_be_bytes());
    tiff.extend_from_slice(&0x0112u16.to_be_bytes());
    tiff.extend_from_slice(&3u16.to_be_bytes());
    tiff.extend_from_slice(&1u32.to_be_bytes());
    tiff.extend_from_slice(&value.to_be_bytes());
    tiff.extend_from_slice(&[0, 0]);
    tiff.extend_from_slice(&0u32.to_be_bytes());

    let mut payload = b"Exif\x00\x00".to_vec();
    payload.extend_from_slice(&tiff);

    let mut out = jpeg[..2].to_vec();
    out.extend_from_slice(&[0xff, 0xe1]);
    out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(&payload);
    out.extend_from_slice(&jpeg[2..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([90, 120, 30]));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Jpeg)
            .unwrap();
        buf
    }

    #[test]
    fn test_reads_orientation_from_jpeg_exif() {
        let bytes = with_exif_orientation(&jpeg(40, 20), 6);
        assert_eq!(read_orientation(&bytes), Some(Orientation::Rotate90));
    }

    #[test]
    fn test_out_of_range_orientation_is_ignored() {
        let bytes = with_exif_orientation(&jpeg(8, 8), 9);
        assert_eq!(read_orientation(&bytes), None);
    }

    #[test]
    fn test_no_exif_in_png() {
        let img = image::RgbImage::new(4, 2);
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        assert_eq!(read_orientation(&buf), None);
    }

    #[test]
    fn test_garbage_has_no_orientation() {
        assert_eq!(read_orientation(b"definitely not an image"), None);
    }

    #[test]
    fn test_exif_values_map_to_orientation() {
        assert_eq!(Orientation::from_exif(1), Some(Orientation::NoTransforms));
        assert_eq!(Orientation::from_exif(6), Some(Orientation::Rotate90));
        assert_eq!(Orientation::from_exif(9), None);
    }
}
