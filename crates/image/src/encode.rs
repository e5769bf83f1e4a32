//! Decoding and encoding with the image crate.

use crate::{ImageError, ImageFormat, Result};
use image::{DynamicImage, ImageOutputFormat};
use std::io::Cursor;

/// Decode image bytes, naming the image in the error.
pub fn decode(name: &str, data: &[u8]) -> Result<DynamicImage> {
    if data.is_empty() {
        return Err(ImageError::decode(name, "file is empty"));
    }
    image::load_from_memory(data).map_err(|e| ImageError::decode(name, e))
}

/// Encode a DynamicImage to bytes.
///
/// `quality` only affects formats whose encoder honours it (JPEG and WebP).
/// JPEG output drops any alpha channel, so callers flatten transparency first.
pub fn encode_image(name: &str, img: &DynamicImage, format: ImageFormat, quality: u8) -> Result<Vec<u8>> {
    if format == ImageFormat::WebP {
        return encode_webp(name, img, quality);
    }

    let mut buffer = Cursor::new(Vec::new());

    let result = match format {
        ImageFormat::Jpeg => {
            let rgb = match img {
                DynamicImage::ImageRgb8(_) => None,
                other => Some(DynamicImage::ImageRgb8(other.to_rgb8())),
            };
            rgb.as_ref()
                .unwrap_or(img)
                .write_to(&mut buffer, ImageOutputFormat::Jpeg(quality.clamp(1, 100)))
        }
        ImageFormat::Png => img.write_to(&mut buffer, ImageOutputFormat::Png),
        ImageFormat::Gif => img.write_to(&mut buffer, ImageOutputFormat::Gif),
        other => {
            return Err(ImageError::UnsupportedOutput(format!("{:?}", other)));
        }
    };
    result.map_err(|e| ImageError::encode(name, e))?;

    let bytes = buffer.into_inner();
    if bytes.is_empty() {
        return Err(ImageError::EmptyOutput(name.to_string()));
    }
    Ok(bytes)
}

/// Lossy WebP through libwebp; alpha is kept.
fn encode_webp(name: &str, img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let rgba = img.to_rgba8();
    let encoded = webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height())
        .encode(f32::from(quality.clamp(1, 100)));
    if encoded.is_empty() {
        return Err(ImageError::EmptyOutput(name.to_string()));
    }
    Ok(encoded.to_vec())
}
