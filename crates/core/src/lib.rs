//! Core types for SlimSnap
//!
//! This crate provides the pieces shared by every other SlimSnap crate:
//!
//! - **Error handling**: errors with codes, context, and recovery suggestions
//! - **Tiers and limits**: the free/premium split and the static policy tables
//! - **Configuration**: TOML-based configuration with validation
//!
//! # Example
//!
//! ```rust
//! use slimsnap_core::{config::Config, Tier};
//!
//! let config = Config::defaults();
//! assert_eq!(config.schema.freemium.max_resolution, 1280);
//! assert!(!Tier::Free.is_premium());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
#[allow(missing_docs)]
pub mod error;
pub mod limits;

pub use error::{Error, ErrorCode, Result, ResultExt};
pub use limits::{FreemiumLimits, Tier, UsageLimits, FREEMIUM_LIMITS, FREE_USAGE_LIMITS};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{Config, ConfigSchema};
    pub use crate::error::{exit_codes, Error, ErrorCode, Result, ResultExt};
    pub use crate::limits::{FreemiumLimits, Tier, UsageLimits};
}
