//! The compression engine.
//!
//! Two strategies satisfy the same [`CompressionStrategy`] contract:
//!
//! - [`SizeTargetingStrategy`] derives a byte budget from the quality setting
//!   and searches quality (then dimensions) for the best encoding that fits.
//! - [`RasterFallbackStrategy`] resizes to the planned dimensions and encodes
//!   once at the requested quality.
//!
//! [`CompressionEngine`] tries the primary strategy and, only if it fails,
//! returns the fallback's result.

use crate::alpha::{flatten_transparency, has_alpha_channel, has_transparent_pixels, remove_alpha_channel, WHITE};
use crate::budget::target_size_bytes;
use crate::dimensions::{fit_longest_edge, DimensionPlanner};
use crate::encode::{decode, encode_image};
use crate::{resolve_format, CompressionSettings, ImageFormat, Result};
use image::imageops::FilterType;
use image::DynamicImage;
use serde::Serialize;
use slimsnap_core::{FreemiumLimits, Tier};

/// Quality at or above which lossless inputs keep their format.
pub const LOSSLESS_KEEP_QUALITY: u8 = 95;

/// Factor applied to both dimensions when quality alone cannot meet the budget.
const SHRINK_FACTOR: f64 = 0.9;

/// One image to compress. Borrowed; the engine never mutates its inputs.
#[derive(Debug, Clone, Copy)]
pub struct CompressionRequest<'a> {
    /// Display name, used in errors and logs
    pub name: &'a str,
    /// Original file bytes
    pub bytes: &'a [u8],
    /// Declared MIME type of the original
    pub mime: &'a str,
    /// Settings shared by the whole batch
    pub settings: &'a CompressionSettings,
    /// Tier of the requesting user
    pub tier: Tier,
}

/// Which strategy produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Size-targeting search
    SizeTargeting,
    /// Single-pass raster fallback
    RasterFallback,
}

/// A compressed image.
#[derive(Debug, Clone)]
pub struct CompressedImage {
    /// Encoded bytes
    pub bytes: Vec<u8>,
    /// Output format
    pub format: ImageFormat,
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Encoder quality of the chosen attempt
    pub quality: u8,
    /// Byte budget the primary strategy aimed for, when it ran
    pub target_bytes: Option<u64>,
    /// Strategy that produced the bytes
    pub strategy: StrategyKind,
}

impl CompressedImage {
    /// Output size in bytes.
    pub fn byte_length(&self) -> usize {
        self.bytes.len()
    }

    /// Output MIME type.
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }
}

/// A way of turning one original into a compressed image.
pub trait CompressionStrategy: Send + Sync {
    /// Which strategy this is
    fn kind(&self) -> StrategyKind;

    /// Compress one image
    fn compress(&self, request: &CompressionRequest<'_>) -> Result<CompressedImage>;
}

/// Output type for an input: lossless inputs switch to JPEG below
/// [`LOSSLESS_KEEP_QUALITY`], trading transparency for size.
pub fn output_format(input: ImageFormat, quality: u8) -> ImageFormat {
    if input.is_lossless() && quality < LOSSLESS_KEEP_QUALITY {
        ImageFormat::Jpeg
    } else {
        input
    }
}

/// Search tuning for the size-targeting strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchTuning {
    /// Maximum encode attempts
    pub max_iterations: u32,
    /// Lowest quality the search may use
    pub min_quality: u8,
}

impl Default for SearchTuning {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            min_quality: 10,
        }
    }
}

#[derive(Debug)]
struct Attempt {
    bytes: Vec<u8>,
    quality: u8,
    width: u32,
    height: u32,
}

impl Attempt {
    fn fits(&self, budget: u64) -> bool {
        self.bytes.len() as u64 <= budget
    }
}

/// Primary strategy: byte budget from the quality band, then a bounded search.
#[derive(Debug, Clone)]
pub struct SizeTargetingStrategy {
    planner: DimensionPlanner,
    tuning: SearchTuning,
}

impl SizeTargetingStrategy {
    /// Create the strategy.
    pub fn new(planner: DimensionPlanner, tuning: SearchTuning) -> Self {
        Self { planner, tuning }
    }

    fn encode_attempt(
        &self,
        name: &str,
        img: &DynamicImage,
        format: ImageFormat,
        quality: u8,
    ) -> Result<Attempt> {
        let bytes = encode_image(name, img, format, quality)?;
        Ok(Attempt {
            bytes,
            quality,
            width: img.width(),
            height: img.height(),
        })
    }

    /// Highest quality in `[min_quality, initial]` that fits, or the smallest
    /// attempt seen when none does.
    fn search_quality(
        &self,
        name: &str,
        img: &DynamicImage,
        format: ImageFormat,
        initial: u8,
        budget: u64,
        iterations: &mut u32,
    ) -> Result<Attempt> {
        *iterations += 1;
        let first = self.encode_attempt(name, img, format, initial)?;
        if first.fits(budget) || !format.supports_quality() {
            return Ok(first);
        }

        let mut smallest = first;
        let mut best_fit: Option<Attempt> = None;
        let mut lo = u32::from(self.tuning.min_quality.min(initial));
        let mut hi = u32::from(initial).saturating_sub(1);

        while lo <= hi && *iterations < self.tuning.max_iterations {
            let mid = lo + (hi - lo) / 2;
            *iterations += 1;
            let attempt = self.encode_attempt(name, img, format, mid as u8)?;
            tracing::trace!(image = name, quality = mid, bytes = attempt.bytes.len(), budget, "search step");

            if attempt.fits(budget) {
                lo = mid + 1;
                best_fit = Some(attempt);
            } else {
                if attempt.bytes.len() < smallest.bytes.len() {
                    smallest = attempt;
                }
                if mid == 0 {
                    break;
                }
                hi = mid - 1;
            }
        }

        Ok(best_fit.unwrap_or(smallest))
    }
}

impl CompressionStrategy for SizeTargetingStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SizeTargeting
    }

    fn compress(&self, request: &CompressionRequest<'_>) -> Result<CompressedImage> {
        let settings = request.settings;
        settings.validate()?;

        let input_format = resolve_format(request.mime, request.bytes)?;
        let format = output_format(input_format, settings.quality);
        let budget = target_size_bytes(request.bytes.len(), settings.quality);
        let ceiling = self.planner.longest_edge_ceiling(request.tier, settings);

        let decoded = decode(request.name, request.bytes)?;
        let mut current = match ceiling {
            Some(limit) => {
                let (w, h) = fit_longest_edge(decoded.width(), decoded.height(), limit);
                if (w, h) == (decoded.width(), decoded.height()) {
                    decoded
                } else {
                    decoded.resize_exact(w, h, FilterType::Lanczos3)
                }
            }
            None => decoded,
        };
        if !format.supports_transparency() && has_alpha_channel(&current) {
            current = remove_alpha_channel(&current, WHITE);
        }

        tracing::debug!(
            image = request.name,
            original_bytes = request.bytes.len(),
            target_bytes = budget,
            quality = settings.quality,
            ?ceiling,
            ?input_format,
            output_format = ?format,
            "compression options"
        );

        let mut iterations = 0;
        let mut best: Option<Attempt> = None;
        loop {
            let attempt = self.search_quality(
                request.name,
                &current,
                format,
                settings.quality,
                budget,
                &mut iterations,
            )?;
            let fits = attempt.fits(budget);
            if best.as_ref().is_none_or(|b| attempt.bytes.len() < b.bytes.len()) {
                best = Some(attempt);
            }
            // Outputs that ignore quality are encoded once at the ceiling.
            if fits || !format.supports_quality() || iterations >= self.tuning.max_iterations {
                break;
            }

            let next_w = ((current.width() as f64) * SHRINK_FACTOR).floor() as u32;
            let next_h = ((current.height() as f64) * SHRINK_FACTOR).floor() as u32;
            if next_w == 0 || next_h == 0 {
                break;
            }
            current = current.resize_exact(next_w, next_h, FilterType::Lanczos3);
        }

        let Some(best) = best else {
            return Err(crate::ImageError::EmptyOutput(request.name.to_string()));
        };

        if !best.fits(budget) {
            tracing::debug!(
                image = request.name,
                achieved = best.bytes.len(),
                target_bytes = budget,
                "size budget not met, keeping smallest attempt"
            );
        }

        Ok(CompressedImage {
            width: best.width,
            height: best.height,
            quality: best.quality,
            bytes: best.bytes,
            format,
            target_bytes: Some(budget),
            strategy: StrategyKind::SizeTargeting,
        })
    }
}

/// Fallback strategy: exact planned resize, one encode at the requested quality.
#[derive(Debug, Clone)]
pub struct RasterFallbackStrategy {
    planner: DimensionPlanner,
    alpha_threshold: u8,
}

impl RasterFallbackStrategy {
    /// Create the strategy.
    pub fn new(planner: DimensionPlanner, alpha_threshold: u8) -> Self {
        Self {
            planner,
            alpha_threshold,
        }
    }
}

impl CompressionStrategy for RasterFallbackStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::RasterFallback
    }

    fn compress(&self, request: &CompressionRequest<'_>) -> Result<CompressedImage> {
        let settings = request.settings;
        settings.validate()?;

        let input_format = resolve_format(request.mime, request.bytes)?;
        let format = output_format(input_format, settings.quality);

        let decoded = decode(request.name, request.bytes)?;
        let (width, height) = self
            .planner
            .plan_for(decoded.width(), decoded.height(), request.tier, settings);

        let mut surface = if (width, height) == (decoded.width(), decoded.height()) {
            decoded
        } else {
            decoded.resize_exact(width, height, FilterType::CatmullRom)
        };

        if input_format.is_lossless() && !format.supports_transparency() && has_transparent_pixels(&surface) {
            surface = flatten_transparency(&surface, self.alpha_threshold, WHITE);
        }

        let bytes = encode_image(request.name, &surface, format, settings.quality)?;
        Ok(CompressedImage {
            bytes,
            format,
            width,
            height,
            quality: settings.quality,
            target_bytes: None,
            strategy: StrategyKind::RasterFallback,
        })
    }
}

/// Primary strategy with a fallback.
pub struct CompressionEngine {
    primary: Box<dyn CompressionStrategy>,
    fallback: Box<dyn CompressionStrategy>,
}

impl Default for CompressionEngine {
    fn default() -> Self {
        Self::new(&FreemiumLimits::default(), SearchTuning::default(), 255)
    }
}

impl std::fmt::Debug for CompressionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressionEngine")
            .field("primary", &self.primary.kind())
            .field("fallback", &self.fallback.kind())
            .finish()
    }
}

impl CompressionEngine {
    /// Engine with the standard strategies.
    pub fn new(limits: &FreemiumLimits, tuning: SearchTuning, alpha_threshold: u8) -> Self {
        let planner = DimensionPlanner::from_limits(limits);
        Self::with_strategies(
            Box::new(SizeTargetingStrategy::new(planner, tuning)),
            Box::new(RasterFallbackStrategy::new(planner, alpha_threshold)),
        )
    }

    /// Engine with custom strategies.
    pub fn with_strategies(
        primary: Box<dyn CompressionStrategy>,
        fallback: Box<dyn CompressionStrategy>,
    ) -> Self {
        Self { primary, fallback }
    }

    /// Compress one image, falling back when the primary strategy fails.
    pub fn compress(&self, request: &CompressionRequest<'_>) -> Result<CompressedImage> {
        let result = match self.primary.compress(request) {
            Ok(out) => Ok(out),
            Err(primary_err) => {
                tracing::warn!(
                    image = request.name,
                    error = %primary_err,
                    "primary compression failed, using fallback"
                );
                self.fallback.compress(request)
            }
        };

        if let Ok(out) = &result {
            tracing::info!(
                image = request.name,
                original_bytes = request.bytes.len(),
                compressed_bytes = out.byte_length(),
                savings = savings_percent(request.bytes.len() as u64, out.byte_length() as u64),
                strategy = ?out.strategy,
                "compressed"
            );
        }
        result
    }
}

/// Compress with the shipped limits and default tuning.
pub fn compress(
    name: &str,
    bytes: &[u8],
    mime: &str,
    settings: &CompressionSettings,
    tier: Tier,
) -> Result<CompressedImage> {
    CompressionEngine::default().compress(&CompressionRequest {
        name,
        bytes,
        mime,
        settings,
        tier,
    })
}

/// Rounded percentage saved, 0 for an empty original.
pub fn savings_percent(original: u64, compressed: u64) -> i64 {
    if original == 0 {
        return 0;
    }
    ((original as f64 - compressed as f64) / original as f64 * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ImageError;
    use image::{Rgba, RgbaImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// A noisy photo-like image; noise keeps JPEG from compressing it to nothing.
    fn photo(width: u32, height: u32) -> DynamicImage {
        let mut seed: u32 = 0x1234_5678;
        let img = RgbaImage::from_fn(width, height, |x, y| {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            let noise = (seed & 0x3F) as u8;
            Rgba([
                ((x * 200 / width) as u8).saturating_add(noise),
                ((y * 200 / height) as u8).saturating_add(noise / 2),
                noise.saturating_mul(3),
                255,
            ])
        });
        DynamicImage::ImageRgba8(img)
    }

    fn as_jpeg(img: &DynamicImage) -> Vec<u8> {
        encode_image("fixture", img, ImageFormat::Jpeg, 98).unwrap()
    }

    fn as_png(img: &DynamicImage) -> Vec<u8> {
        encode_image("fixture", img, ImageFormat::Png, 100).unwrap()
    }

    fn request<'a>(bytes: &'a [u8], mime: &'a str, settings: &'a CompressionSettings, tier: Tier) -> CompressionRequest<'a> {
        CompressionRequest {
            name: "photo",
            bytes,
            mime,
            settings,
            tier,
        }
    }

    #[test]
    fn test_output_format_switch() {
        assert_eq!(output_format(ImageFormat::Png, 80), ImageFormat::Jpeg);
        assert_eq!(output_format(ImageFormat::Png, 95), ImageFormat::Png);
        assert_eq!(output_format(ImageFormat::Jpeg, 50), ImageFormat::Jpeg);
        assert_eq!(output_format(ImageFormat::WebP, 50), ImageFormat::WebP);
    }

    #[test]
    fn test_jpeg_output_smaller_and_decodable() {
        let original = as_jpeg(&photo(400, 300));
        let settings = CompressionSettings::with_quality(60);

        let out = CompressionEngine::default()
            .compress(&request(&original, "image/jpeg", &settings, Tier::Free))
            .unwrap();

        assert!(out.byte_length() <= original.len());
        assert_eq!(out.mime_type(), "image/jpeg");
        assert_eq!(out.strategy, StrategyKind::SizeTargeting);
        let decoded = decode("out", &out.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (out.width, out.height));
    }

    #[test]
    fn test_free_tier_clamps_longest_edge() {
        let original = as_jpeg(&photo(1600, 800));
        let settings = CompressionSettings::with_quality(80);

        let out = compress("wide", &original, "image/jpeg", &settings, Tier::Free).unwrap();
        assert!(out.width <= 1280 && out.height <= 640);
    }

    #[test]
    fn test_user_cap_applies_to_premium() {
        let original = as_jpeg(&photo(600, 400));
        let settings = CompressionSettings::with_quality(90).with_max_dimensions(300, 0);

        let out = compress("capped", &original, "image/jpeg", &settings, Tier::Premium).unwrap();
        assert!(out.width <= 300);
    }

    #[test]
    fn test_png_converted_to_jpeg_below_95() {
        let original = as_png(&photo(200, 200));
        let settings = CompressionSettings::with_quality(70);

        let out = compress("icon", &original, "image/png", &settings, Tier::Free).unwrap();
        assert_eq!(out.format, ImageFormat::Jpeg);
        assert_eq!(crate::detect_format(&out.bytes).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_png_kept_at_high_quality() {
        let original = as_png(&photo(64, 64));
        let settings = CompressionSettings::with_quality(98);

        let out = compress("icon", &original, "image/png", &settings, Tier::Premium).unwrap();
        assert_eq!(out.format, ImageFormat::Png);
    }

    #[test]
    fn test_inputs_not_mutated() {
        let original = as_jpeg(&photo(120, 90));
        let snapshot = original.clone();
        let settings = CompressionSettings::with_quality(50);

        let _ = compress("same", &original, "image/jpeg", &settings, Tier::Free).unwrap();
        assert_eq!(original, snapshot);
        assert_eq!(settings, CompressionSettings::with_quality(50));
    }

    #[test]
    fn test_corrupt_input_fails_in_both_strategies() {
        let garbage = vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3, 4, 5, 6];
        let settings = CompressionSettings::with_quality(60);

        let err = compress("corrupt.jpg", &garbage, "image/jpeg", &settings, Tier::Free).unwrap_err();
        assert!(err.is_decode_class());
        assert!(err.to_string().contains("corrupt.jpg"));
    }

    #[test]
    fn test_fallback_flattens_and_plans_exact_dimensions() {
        let mut img = RgbaImage::from_pixel(1500, 1000, Rgba([10, 20, 30, 255]));
        for x in 0..40 {
            for y in 0..40 {
                img.put_pixel(x, y, Rgba([0, 0, 0, 0]));
            }
        }
        let original = as_png(&DynamicImage::ImageRgba8(img));
        let settings = CompressionSettings::with_quality(60);

        let fallback = RasterFallbackStrategy::new(DimensionPlanner::default(), 255);
        let out = fallback
            .compress(&request(&original, "image/png", &settings, Tier::Free))
            .unwrap();

        assert_eq!((out.width, out.height), (1280, 853));
        assert_eq!(out.format, ImageFormat::Jpeg);
        assert_eq!(out.strategy, StrategyKind::RasterFallback);
        assert_eq!(out.target_bytes, None);

        let pixels = decode("out", &out.bytes).unwrap().to_rgb8();
        let corner = pixels.get_pixel(0, 0);
        assert!(corner.0.iter().all(|&c| c >= 230), "corner was {corner:?}");
        let body = pixels.get_pixel(640, 400);
        assert!(body.0.iter().all(|&c| c <= 60), "body was {body:?}");
    }

    #[test]
    fn test_search_returns_highest_fitting_quality() {
        let img = photo(200, 150);
        let budget = encode_image("fixture", &img, ImageFormat::Jpeg, 40).unwrap().len() as u64;
        let strategy = SizeTargetingStrategy::new(DimensionPlanner::default(), SearchTuning::default());

        let mut iterations = 0;
        let attempt = strategy
            .search_quality("photo", &img, ImageFormat::Jpeg, 80, budget, &mut iterations)
            .unwrap();

        assert!(attempt.fits(budget));
        assert!(attempt.quality >= 40 && attempt.quality < 80);
        assert!(iterations <= SearchTuning::default().max_iterations);
        let above = encode_image("fixture", &img, ImageFormat::Jpeg, attempt.quality + 1).unwrap();
        assert!(above.len() as u64 > budget);
    }

    #[test]
    fn test_reachable_budget_is_met() {
        let original = as_jpeg(&photo(400, 300));
        let settings = CompressionSettings::with_quality(80);

        let out = compress("photo", &original, "image/jpeg", &settings, Tier::Free).unwrap();
        let target = out.target_bytes.unwrap();
        assert_eq!(target, target_size_bytes(original.len(), 80));
        assert!(out.byte_length() as u64 <= target);
    }

    #[test]
    fn test_shrinks_when_quality_alone_cannot_fit() {
        let original = as_jpeg(&photo(800, 600));
        let settings = CompressionSettings::with_quality(30);
        // Pinning the search to one quality leaves shrinking as the only lever.
        let strategy = SizeTargetingStrategy::new(
            DimensionPlanner::default(),
            SearchTuning {
                max_iterations: 40,
                min_quality: 30,
            },
        );

        let out = strategy
            .compress(&request(&original, "image/jpeg", &settings, Tier::Premium))
            .unwrap();

        assert_eq!(out.quality, 30);
        assert!(out.byte_length() as u64 <= out.target_bytes.unwrap());
        assert!(out.width < 800 && out.height < 600);
        let ratio = out.width as f64 / out.height as f64;
        assert!((ratio - 800.0 / 600.0).abs() < 0.05);
    }

    #[test]
    fn test_webp_input_shrinks_and_stays_webp() {
        let original = encode_image("fixture", &photo(400, 300), ImageFormat::WebP, 95).unwrap();
        let settings = CompressionSettings::with_quality(60);

        let out = compress("photo.webp", &original, "image/webp", &settings, Tier::Free).unwrap();

        assert_eq!(out.format, ImageFormat::WebP);
        assert_eq!(crate::detect_format(&out.bytes).unwrap(), ImageFormat::WebP);
        assert!(out.byte_length() < original.len());
        assert!(out.quality <= 60);
    }

    struct FailingStrategy(Arc<AtomicUsize>);

    impl CompressionStrategy for FailingStrategy {
        fn kind(&self) -> StrategyKind {
            StrategyKind::SizeTargeting
        }

        fn compress(&self, request: &CompressionRequest<'_>) -> Result<CompressedImage> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(ImageError::encode(request.name, "worker unavailable"))
        }
    }

    #[test]
    fn test_engine_uses_fallback_on_primary_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = CompressionEngine::with_strategies(
            Box::new(FailingStrategy(calls.clone())),
            Box::new(RasterFallbackStrategy::new(DimensionPlanner::default(), 255)),
        );
        let original = as_jpeg(&photo(100, 100));
        let settings = CompressionSettings::with_quality(70);

        let out = engine
            .compress(&request(&original, "image/jpeg", &settings, Tier::Free))
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(out.strategy, StrategyKind::RasterFallback);
    }

    #[test]
    fn test_search_respects_iteration_cap() {
        // A budget far below anything reachable forces the search to give up
        // and return its smallest attempt.
        let original = as_jpeg(&photo(300, 300));
        let settings = CompressionSettings::with_quality(20);
        let strategy = SizeTargetingStrategy::new(
            DimensionPlanner::default(),
            SearchTuning {
                max_iterations: 3,
                min_quality: 10,
            },
        );

        let out = strategy
            .compress(&request(&original, "image/jpeg", &settings, Tier::Premium))
            .unwrap();
        assert!(out.byte_length() > 0);
        assert!(out.quality >= 10 && out.quality <= 20);
    }

    #[test]
    fn test_invalid_quality_rejected() {
        let original = as_jpeg(&photo(10, 10));
        let settings = CompressionSettings::with_quality(0);
        let err = compress("q0", &original, "image/jpeg", &settings, Tier::Premium).unwrap_err();
        assert!(matches!(err, ImageError::InvalidSettings(_)));
    }

    #[test]
    fn test_savings_percent() {
        assert_eq!(savings_percent(0, 10), 0);
        assert_eq!(savings_percent(1000, 250), 75);
        assert_eq!(savings_percent(1000, 1200), -20);
    }
}
