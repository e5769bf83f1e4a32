//! Image format detection from magic bytes and declared MIME types.

use crate::{ImageError, Result};

/// MIME types accepted from the file source.
pub const ALLOWED_UPLOAD_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// JPEG image
    Jpeg,
    /// PNG image
    Png,
    /// GIF image
    Gif,
    /// WebP image
    WebP,
    /// AVIF image
    Avif,
    /// BMP image
    Bmp,
    /// TIFF image
    Tiff,
}

impl ImageFormat {
    /// Get the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Gif => "image/gif",
            ImageFormat::WebP => "image/webp",
            ImageFormat::Avif => "image/avif",
            ImageFormat::Bmp => "image/bmp",
            ImageFormat::Tiff => "image/tiff",
        }
    }

    /// Parse a declared MIME type.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(ImageFormat::Jpeg),
            "image/png" => Some(ImageFormat::Png),
            "image/gif" => Some(ImageFormat::Gif),
            "image/webp" => Some(ImageFormat::WebP),
            "image/avif" => Some(ImageFormat::Avif),
            "image/bmp" => Some(ImageFormat::Bmp),
            "image/tiff" => Some(ImageFormat::Tiff),
            _ => None,
        }
    }

    /// Guess from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        [
            ImageFormat::Jpeg,
            ImageFormat::Png,
            ImageFormat::Gif,
            ImageFormat::WebP,
            ImageFormat::Avif,
            ImageFormat::Bmp,
            ImageFormat::Tiff,
        ]
        .into_iter()
        .find(|f| f.extensions().contains(&ext.as_str()))
    }

    /// Get common file extensions for this format.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            ImageFormat::Jpeg => &["jpg", "jpeg"],
            ImageFormat::Png => &["png"],
            ImageFormat::Gif => &["gif"],
            ImageFormat::WebP => &["webp"],
            ImageFormat::Avif => &["avif"],
            ImageFormat::Bmp => &["bmp"],
            ImageFormat::Tiff => &["tiff", "tif"],
        }
    }

    /// Whether the format stores pixels without loss.
    pub fn is_lossless(&self) -> bool {
        matches!(
            self,
            ImageFormat::Png | ImageFormat::Gif | ImageFormat::Bmp | ImageFormat::Tiff
        )
    }

    /// Whether our encoder for this format honours a quality setting.
    pub fn supports_quality(&self) -> bool {
        matches!(self, ImageFormat::Jpeg | ImageFormat::WebP)
    }

    /// Whether the format can carry an alpha channel.
    pub fn supports_transparency(&self) -> bool {
        !matches!(self, ImageFormat::Jpeg | ImageFormat::Bmp)
    }

    /// Whether the file source may hand this format to the core.
    pub fn is_upload_allowed(&self) -> bool {
        ALLOWED_UPLOAD_TYPES.contains(&self.mime_type())
    }
}

/// Check a declared MIME type against the upload allow-list.
pub fn is_allowed_mime(mime: &str) -> bool {
    ImageFormat::from_mime(mime).is_some_and(|f| f.is_upload_allowed())
}

/// Detect image format from magic bytes.
///
/// # Arguments
/// * `data` - First few bytes of the image file (at least 12 bytes recommended)
///
/// # Returns
/// Detected image format, or error if unknown
///
/// # Example
/// ```
/// use slimsnap_image::detect_format;
///
/// // JPEG magic bytes
/// let jpeg_data = [0xFF, 0xD8, 0xFF, 0xE0];
/// assert!(matches!(detect_format(&jpeg_data), Ok(slimsnap_image::ImageFormat::Jpeg)));
///
/// // PNG magic bytes
/// let png_data = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
/// assert!(matches!(detect_format(&png_data), Ok(slimsnap_image::ImageFormat::Png)));
/// ```
pub fn detect_format(data: &[u8]) -> Result<ImageFormat> {
    if data.len() < 4 {
        return Err(ImageError::InvalidData("Not enough data for format detection".into()));
    }

    // JPEG: FF D8 FF
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Ok(ImageFormat::Jpeg);
    }

    // PNG: 89 50 4E 47 0D 0A 1A 0A
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Ok(ImageFormat::Png);
    }

    // GIF: GIF87a or GIF89a
    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return Ok(ImageFormat::Gif);
    }

    // WebP: RIFF....WEBP
    if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        return Ok(ImageFormat::WebP);
    }

    // BMP: BM
    if data.starts_with(b"BM") {
        return Ok(ImageFormat::Bmp);
    }

    // TIFF: II or MM (little/big endian)
    if data.starts_with(&[0x49, 0x49, 0x2A, 0x00]) || data.starts_with(&[0x4D, 0x4D, 0x00, 0x2A]) {
        return Ok(ImageFormat::Tiff);
    }

    // AVIF: ....ftypavif or ....ftypavis
    if data.len() >= 12 && &data[4..8] == b"ftyp" {
        let brand = &data[8..12];
        if brand == b"avif" || brand == b"avis" {
            return Ok(ImageFormat::Avif);
        }
    }

    Err(ImageError::UnknownFormat)
}

/// Resolve the format of an input, trusting the declared MIME type first and
/// the magic bytes second.
pub fn resolve_format(declared_mime: &str, data: &[u8]) -> Result<ImageFormat> {
    match ImageFormat::from_mime(declared_mime) {
        Some(format) => Ok(format),
        None => detect_format(data),
    }
}
