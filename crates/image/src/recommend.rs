//! Recommended settings by intended use and file size.

use crate::CompressionSettings;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MB: usize = 1024 * 1024;

/// What the compressed image will be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UseCase {
    /// Web pages
    #[default]
    Web,
    /// Email attachments
    Email,
    /// Archival storage
    Storage,
    /// Printing
    Print,
}

impl FromStr for UseCase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "web" => Ok(UseCase::Web),
            "email" => Ok(UseCase::Email),
            "storage" => Ok(UseCase::Storage),
            "print" => Ok(UseCase::Print),
            other => Err(format!("unknown use case: {other}")),
        }
    }
}

impl fmt::Display for UseCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UseCase::Web => "web",
            UseCase::Email => "email",
            UseCase::Storage => "storage",
            UseCase::Print => "print",
        };
        f.write_str(name)
    }
}

/// Recommend settings for a file of `size_bytes` bytes.
///
/// # Example
/// ```
/// use slimsnap_image::{recommend_settings, UseCase};
///
/// // 6MB photo for the web
/// let settings = recommend_settings(6 * 1024 * 1024, UseCase::Web);
/// assert_eq!((settings.quality, settings.max_width, settings.max_height), (75, 1920, 1080));
/// ```
pub fn recommend_settings(size_bytes: usize, use_case: UseCase) -> CompressionSettings {
    let (quality, max_width, max_height) = match use_case {
        UseCase::Web if size_bytes > 5 * MB => (75, 1920, 1080),
        UseCase::Web if size_bytes > 2 * MB => (80, 1920, 1080),
        UseCase::Web => (85, 0, 0),
        UseCase::Email => (70, 800, 600),
        UseCase::Storage => (60, 1280, 720),
        UseCase::Print => (95, 3000, 2000),
    };

    CompressionSettings {
        quality,
        max_width,
        max_height,
    }
}
