//! Freemium policy evaluation.
//!
//! Pure checks of a requested batch against the static freemium limits.
//! Premium requests are always allowed.

use serde::Serialize;
use slimsnap_core::{Error, FreemiumLimits, Result, Tier};

/// Outcome of a policy or quota check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Human-readable explanation; empty when allowed
    pub reason: String,
}

impl Decision {
    /// An allowing decision.
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: String::new(),
        }
    }

    /// A denying decision.
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }

    /// Convert a denial into a `PolicyDenied` error.
    pub fn into_result(self) -> Result<()> {
        if self.allowed {
            Ok(())
        } else {
            Err(Error::policy_denied(self.reason))
        }
    }
}

/// Evaluates batches against a set of freemium limits.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyEvaluator {
    limits: FreemiumLimits,
}

impl PolicyEvaluator {
    /// Evaluator for the given limits.
    pub fn new(limits: FreemiumLimits) -> Self {
        Self { limits }
    }

    /// The limits in force.
    pub fn limits(&self) -> &FreemiumLimits {
        &self.limits
    }

    /// Check a batch of `image_count` images with the given settings.
    ///
    /// For free users the first failing rule wins: image count, then
    /// quality band, then resolution cap. A zero dimension means "no cap"
    /// and is never a violation.
    pub fn evaluate(
        &self,
        image_count: usize,
        quality: u8,
        max_width: u32,
        max_height: u32,
        tier: Tier,
    ) -> Decision {
        if tier.is_premium() {
            return Decision::allow();
        }

        let limits = &self.limits;
        if image_count > limits.max_images as usize {
            return Decision::deny(format!(
                "Free users can only upload {} images at once. You're trying to process {} images. Upgrade to Premium for unlimited uploads.",
                limits.max_images, image_count
            ));
        }

        if quality < limits.min_quality || quality > limits.max_quality {
            return Decision::deny(format!(
                "Free users can only use quality between {}% and {}%. Upgrade to Premium for full quality control.",
                limits.min_quality, limits.max_quality
            ));
        }

        let cap = limits.max_resolution;
        if (max_width > 0 && max_width > cap) || (max_height > 0 && max_height > cap) {
            return Decision::deny(format!(
                "Free users are limited to {cap}x{cap} resolution. Upgrade to Premium for unlimited resolution."
            ));
        }

        Decision::allow()
    }
}

/// Evaluate against the shipped freemium limits.
pub fn evaluate(image_count: usize, quality: u8, max_width: u32, max_height: u32, tier: Tier) -> Decision {
    PolicyEvaluator::default().evaluate(image_count, quality, max_width, max_height, tier)
}
