//! Image compression for SlimSnap.
//!
//! This crate provides:
//! - Format detection from magic bytes and declared MIME types
//! - Metadata extraction
//! - Output dimension planning for each tier
//! - Size-targeted compression with a single-pass fallback
//! - Alpha flattening for lossy outputs
//! - Recommended settings per use case

#![warn(missing_docs)]

mod alpha;
pub mod budget;
pub mod compress;
mod detect;
mod dimensions;
mod encode;
mod error;
mod metadata;
mod recommend;
mod settings;

pub use alpha::{flatten_transparency, has_alpha_channel, has_transparent_pixels, remove_alpha_channel, WHITE};
pub use compress::{
    compress, output_format, savings_percent, CompressedImage, CompressionEngine, CompressionRequest,
    CompressionStrategy, RasterFallbackStrategy, SearchTuning, SizeTargetingStrategy, StrategyKind,
};
pub use detect::{detect_format, is_allowed_mime, resolve_format, ImageFormat, ALLOWED_UPLOAD_TYPES};
pub use dimensions::{fit_longest_edge, plan_dimensions, DimensionPlanner};
pub use encode::{decode, encode_image};
pub use error::{ImageError, Result};
pub use metadata::{extract_metadata, ImageMetadata};
pub use recommend::{recommend_settings, UseCase};
pub use settings::CompressionSettings;
