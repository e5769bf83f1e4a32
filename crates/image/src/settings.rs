//! User-facing compression settings.

use crate::{ImageError, Result};
use serde::{Deserialize, Serialize};

/// Settings for a single compression call, reused across a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionSettings {
    /// Quality percentage (1-100)
    pub quality: u8,
    /// Maximum output width, 0 for no cap
    #[serde(default)]
    pub max_width: u32,
    /// Maximum output height, 0 for no cap
    #[serde(default)]
    pub max_height: u32,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            quality: 80,
            max_width: 0,
            max_height: 0,
        }
    }
}

impl CompressionSettings {
    /// Settings with a quality and no dimension caps.
    pub fn with_quality(quality: u8) -> Self {
        Self {
            quality,
            ..Self::default()
        }
    }

    /// Cap both dimensions.
    pub fn with_max_dimensions(mut self, max_width: u32, max_height: u32) -> Self {
        self.max_width = max_width;
        self.max_height = max_height;
        self
    }

    /// Width cap, `None` when unconstrained.
    pub fn width_cap(&self) -> Option<u32> {
        (self.max_width > 0).then_some(self.max_width)
    }

    /// Height cap, `None` when unconstrained.
    pub fn height_cap(&self) -> Option<u32> {
        (self.max_height > 0).then_some(self.max_height)
    }

    /// Check the quality lies within 1..=100.
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.quality) {
            return Err(ImageError::InvalidSettings(format!(
                "quality {} must lie within 1..=100",
                self.quality
            )));
        }
        Ok(())
    }
}
