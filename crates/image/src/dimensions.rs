//! Output dimension planning.
//!
//! Every step scales both axes by the same factor, so the aspect ratio is
//! preserved up to the final rounding to whole pixels. Dimensions never grow.

use crate::CompressionSettings;
use slimsnap_core::{FreemiumLimits, Tier};

/// Computes output dimensions from the tier ceiling and the user's caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionPlanner {
    /// Longest edge allowed for the free tier
    pub max_resolution: u32,
}

impl Default for DimensionPlanner {
    fn default() -> Self {
        Self::from_limits(&FreemiumLimits::default())
    }
}

impl DimensionPlanner {
    /// Planner using the free-tier resolution from a limit table.
    pub fn from_limits(limits: &FreemiumLimits) -> Self {
        Self {
            max_resolution: limits.max_resolution,
        }
    }

    /// Plan output dimensions.
    ///
    /// A zero `max_width` or `max_height` leaves that axis unconstrained.
    ///
    /// # Example
    /// ```
    /// use slimsnap_image::DimensionPlanner;
    /// use slimsnap_core::Tier;
    ///
    /// let planner = DimensionPlanner::default();
    /// // Free tier clamps the longest edge to 1280
    /// assert_eq!(planner.plan(4000, 3000, Tier::Free, 0, 0), (1280, 960));
    /// // Premium keeps the original unless the user asks otherwise
    /// assert_eq!(planner.plan(4000, 3000, Tier::Premium, 0, 0), (4000, 3000));
    /// ```
    pub fn plan(
        &self,
        original_width: u32,
        original_height: u32,
        tier: Tier,
        max_width: u32,
        max_height: u32,
    ) -> (u32, u32) {
        let mut width = original_width as f64;
        let mut height = original_height as f64;

        if !tier.is_premium() {
            let max_res = self.max_resolution as f64;
            if width > max_res || height > max_res {
                if width > height {
                    height = height * max_res / width;
                    width = max_res;
                } else {
                    width = width * max_res / height;
                    height = max_res;
                }
            }
        }

        if max_width > 0 && width > max_width as f64 {
            height = height * max_width as f64 / width;
            width = max_width as f64;
        }

        if max_height > 0 && height > max_height as f64 {
            width = width * max_height as f64 / height;
            height = max_height as f64;
        }

        (round_px(width), round_px(height))
    }

    /// Plan output dimensions from a settings value.
    pub fn plan_for(
        &self,
        original_width: u32,
        original_height: u32,
        tier: Tier,
        settings: &CompressionSettings,
    ) -> (u32, u32) {
        self.plan(
            original_width,
            original_height,
            tier,
            settings.max_width,
            settings.max_height,
        )
    }

    /// Single longest-edge bound: the smallest of the tier ceiling (free
    /// tier only) and the user's width and height caps.
    ///
    /// Returns `None` when nothing constrains the output.
    pub fn longest_edge_ceiling(&self, tier: Tier, settings: &CompressionSettings) -> Option<u32> {
        let tier_ceiling = (!tier.is_premium()).then_some(self.max_resolution);
        [tier_ceiling, settings.width_cap(), settings.height_cap()]
            .into_iter()
            .flatten()
            .min()
    }
}

/// Scale `(width, height)` so the longest edge is at most `ceiling`.
pub fn fit_longest_edge(width: u32, height: u32, ceiling: u32) -> (u32, u32) {
    let longest = width.max(height);
    if ceiling == 0 || longest <= ceiling {
        return (width, height);
    }

    let ratio = ceiling as f64 / longest as f64;
    (round_px(width as f64 * ratio), round_px(height as f64 * ratio))
}

/// Plan with the shipped free-tier limits.
pub fn plan_dimensions(
    original_width: u32,
    original_height: u32,
    tier: Tier,
    max_width: u32,
    max_height: u32,
) -> (u32, u32) {
    DimensionPlanner::default().plan(original_width, original_height, tier, max_width, max_height)
}

fn round_px(value: f64) -> u32 {
    (value.round() as u32).max(1)
}
