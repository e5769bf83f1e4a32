//! Error types for the image crate.

use thiserror::Error;

/// Result type alias for image operations.
pub type Result<T> = std::result::Result<T, ImageError>;

/// Errors that can occur during image operations.
#[derive(Debug, Error)]
pub enum ImageError {
    /// Unknown image format
    #[error("Unknown image format")]
    UnknownFormat,

    /// Invalid image data
    #[error("Invalid image data: {0}")]
    InvalidData(String),

    /// Settings outside their allowed range
    #[error("Invalid compression settings: {0}")]
    InvalidSettings(String),

    /// Input bytes could not be interpreted as an image
    #[error("Failed to decode {name}: {reason}")]
    Decode {
        /// Display name of the image
        name: String,
        /// Decoder message
        reason: String,
    },

    /// The encoder failed
    #[error("Failed to encode {name}: {reason}")]
    Encode {
        /// Display name of the image
        name: String,
        /// Encoder message
        reason: String,
    },

    /// The encoder produced no bytes
    #[error("Encoder produced empty output for {0}")]
    EmptyOutput(String),

    /// No encoder is available for the requested output format
    #[error("Unsupported output format: {0}")]
    UnsupportedOutput(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Image processing error
    #[error("Image processing error: {0}")]
    ProcessingError(#[from] image::ImageError),
}

impl ImageError {
    /// Build a decode error for the named image.
    pub fn decode(name: &str, reason: impl ToString) -> Self {
        ImageError::Decode {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Build an encode error for the named image.
    pub fn encode(name: &str, reason: impl ToString) -> Self {
        ImageError::Encode {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error means the input itself is unusable.
    ///
    /// Empty encoder output is grouped with decode failures.
    pub fn is_decode_class(&self) -> bool {
        matches!(
            self,
            ImageError::Decode { .. }
                | ImageError::EmptyOutput(_)
                | ImageError::UnknownFormat
                | ImageError::InvalidData(_)
        )
    }
}

impl From<ImageError> for slimsnap_core::Error {
    fn from(err: ImageError) -> Self {
        let message = err.to_string();
        if err.is_decode_class() {
            slimsnap_core::Error::decode(message).with_source(err)
        } else {
            slimsnap_core::Error::encode(message).with_source(err)
        }
    }
}
