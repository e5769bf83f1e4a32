//! Header-only metadata for the CLI's `detect` output.

use crate::{detect_format, ImageFormat};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// What can be learned about an image without decoding its pixels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Format sniffed from the magic bytes
    pub format: ImageFormat,
    /// File size in bytes
    pub size_bytes: usize,
}

/// Read dimensions from the image header.
///
/// `None` when the bytes are not a recognised image or the header is
/// truncated.
pub fn extract_metadata(data: &[u8]) -> Option<ImageMetadata> {
    let format = detect_format(data).ok()?;
    let (width, height) = image::io::Reader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()?;

    Some(ImageMetadata {
        width,
        height,
        format,
        size_bytes: data.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode_image;
    use image::{DynamicImage, RgbImage};

    fn encoded(format: ImageFormat) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::new(64, 48));
        encode_image("fixture", &img, format, 80).unwrap()
    }

    #[test]
    fn test_dimensions_per_format() {
        for format in [ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::WebP, ImageFormat::Gif] {
            let data = encoded(format);
            let meta = extract_metadata(&data).unwrap();
            assert_eq!((meta.width, meta.height), (64, 48), "{format:?}");
            assert_eq!(meta.format, format);
            assert_eq!(meta.size_bytes, data.len());
        }
    }

    #[test]
    fn test_truncated_header() {
        let data = encoded(ImageFormat::Png);
        assert!(extract_metadata(&data[..12]).is_none());
    }

    #[test]
    fn test_garbage_has_no_metadata() {
        assert!(extract_metadata(b"not an image at all").is_none());
    }
}
