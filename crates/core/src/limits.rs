//! Account tiers and the static freemium policy tables.

use serde::{Deserialize, Serialize};

/// Account tier, the only axis of policy differentiation.
///
/// Supplied by the account/subscription system as a point-in-time value and
/// passed explicitly into every policy decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Free tier, subject to every limit
    #[default]
    Free,
    /// Paid tier, exempt from every limit
    Premium,
}

impl Tier {
    /// Build a tier from the oracle's boolean flag.
    pub fn from_premium_flag(is_premium: bool) -> Self {
        if is_premium { Tier::Premium } else { Tier::Free }
    }

    /// Whether this is the premium tier
    pub fn is_premium(self) -> bool {
        matches!(self, Tier::Premium)
    }
}

/// Limits on what a free user may ask the compressor to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreemiumLimits {
    /// Images per batch action
    pub max_images: u32,
    /// Lowest allowed quality percentage
    pub min_quality: u8,
    /// Highest allowed quality percentage
    pub max_quality: u8,
    /// Longest allowed output edge in pixels
    pub max_resolution: u32,
}

/// Freemium limits shipped with the application.
pub const FREEMIUM_LIMITS: FreemiumLimits = FreemiumLimits {
    max_images: 3,
    min_quality: 50,
    max_quality: 80,
    max_resolution: 1280,
};

impl Default for FreemiumLimits {
    fn default() -> Self {
        FREEMIUM_LIMITS
    }
}

/// Usage limits for free users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageLimits {
    /// Images that may be loaded in the working set at once
    pub max_concurrent_uploads: u32,
    /// Compressions per session
    pub max_processing_per_session: u32,
    /// Compressions per day
    pub max_daily_processing: u32,
}

/// Usage limits shipped with the application.
pub const FREE_USAGE_LIMITS: UsageLimits = UsageLimits {
    max_concurrent_uploads: 3,
    max_processing_per_session: 3,
    max_daily_processing: 10,
};

impl Default for UsageLimits {
    fn default() -> Self {
        FREE_USAGE_LIMITS
    }
}

impl UsageLimits {
    /// The tighter of the session and daily caps.
    pub fn effective_cap(&self) -> u32 {
        self.max_processing_per_session.min(self.max_daily_processing)
    }
}
