//! Configuration schema definitions

use crate::error::{Error, Result};
use crate::limits::{FreemiumLimits, UsageLimits};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration schema
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigSchema {
    #[serde(default)]
    pub freemium: FreemiumLimits,

    #[serde(default)]
    pub usage: UsageLimits,

    #[serde(default)]
    pub compression: CompressionConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub telemetry: TelemetrySection,
}

impl ConfigSchema {
    /// Reject configurations that would make every request fail or panic.
    pub fn validate(&self) -> Result<()> {
        let f = &self.freemium;
        if f.min_quality == 0 || f.max_quality > 100 || f.min_quality > f.max_quality {
            return Err(Error::config_validation(format!(
                "freemium quality band {}..={} must lie within 1..=100",
                f.min_quality, f.max_quality
            )));
        }
        if f.max_images == 0 || f.max_resolution == 0 {
            return Err(Error::config_validation(
                "freemium.max_images and freemium.max_resolution must be positive",
            ));
        }

        let u = &self.usage;
        if u.max_concurrent_uploads == 0 {
            return Err(Error::config_validation("usage.max_concurrent_uploads must be positive"));
        }

        let c = &self.compression;
        if c.max_iterations == 0 {
            return Err(Error::config_validation("compression.max_iterations must be positive"));
        }
        if c.min_search_quality == 0 || c.min_search_quality > 100 {
            return Err(Error::config_validation(
                "compression.min_search_quality must lie within 1..=100",
            ));
        }
        Ok(())
    }
}

/// Tuning for the size-targeting search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Maximum encode attempts before giving up on the size budget
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Lowest quality the search may fall to
    #[serde(default = "default_min_search_quality")]
    pub min_search_quality: u8,

    /// Alpha at or above which the fallback keeps a pixel's colour
    #[serde(default = "default_alpha_threshold")]
    pub alpha_threshold: u8,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            min_search_quality: default_min_search_quality(),
            alpha_threshold: default_alpha_threshold(),
        }
    }
}

fn default_max_iterations() -> u32 {
    10
}

fn default_min_search_quality() -> u8 {
    10
}

fn default_alpha_threshold() -> u8 {
    255
}

/// Where quota state is persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Explicit path to the usage file (platform data dir when unset)
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Persist usage across runs
    #[serde(default = "default_true")]
    pub persist: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            persist: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySection {
    /// Default log filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}
