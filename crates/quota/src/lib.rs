//! Freemium policy and usage quotas for SlimSnap.
//!
//! - [`PolicyEvaluator`] checks a batch against the static freemium limits.
//! - [`QuotaTracker`] counts processed images per scope with session and
//!   daily caps, persisting through a [`UsageStore`].
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use slimsnap_core::{Tier, UsageLimits};
//! use slimsnap_quota::{evaluate, ManualClock, MemoryStore, QuotaTracker, Scope};
//!
//! assert!(evaluate(2, 70, 0, 0, Tier::Free).allowed);
//!
//! let mut tracker = QuotaTracker::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(ManualClock::new(0)),
//!     Scope::Anonymous,
//!     UsageLimits::default(),
//! );
//! tracker.track_processed(3);
//! assert!(!tracker.can_process(Tier::Free, 1).allowed);
//! ```

#![warn(missing_docs)]

pub mod clock;
mod policy;
pub mod store;
mod tracker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use policy::{evaluate, Decision, PolicyEvaluator};
pub use store::{JsonFileStore, MemoryStore, Scope, UsageRecord, UsageStore};
pub use tracker::{QuotaTracker, Remaining};
