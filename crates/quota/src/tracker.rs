//! Session and daily processing quotas.

use crate::clock::{advance_boundary, next_midnight, Clock};
use crate::policy::Decision;
use crate::store::{Scope, UsageRecord, UsageStore};
use serde::Serialize;
use slimsnap_core::{Tier, UsageLimits};
use std::fmt;
use std::sync::Arc;

/// How many more images may be processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "count")]
pub enum Remaining {
    /// No limit applies
    Unlimited,
    /// At most this many
    Limited(u32),
}

impl fmt::Display for Remaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Remaining::Unlimited => f.write_str("unlimited"),
            Remaining::Limited(n) => write!(f, "{n}"),
        }
    }
}

/// Tracks processed-image counters for one scope.
///
/// The in-memory record is authoritative for the life of the tracker.
/// Store failures are logged and otherwise ignored, so a broken store
/// degrades to per-process counting.
pub struct QuotaTracker {
    store: Arc<dyn UsageStore>,
    clock: Arc<dyn Clock>,
    scope: Scope,
    limits: UsageLimits,
    usage: UsageRecord,
}

impl fmt::Debug for QuotaTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuotaTracker")
            .field("scope", &self.scope)
            .field("limits", &self.limits)
            .field("usage", &self.usage)
            .finish()
    }
}

impl QuotaTracker {
    /// Create and initialize a tracker.
    pub fn new(store: Arc<dyn UsageStore>, clock: Arc<dyn Clock>, scope: Scope, limits: UsageLimits) -> Self {
        let now = clock.now_millis();
        let mut tracker = Self {
            store,
            clock,
            scope,
            limits,
            usage: UsageRecord::fresh(now, next_midnight(now)),
        };
        tracker.initialize();
        tracker
    }

    /// Load the stored record, apply a pending daily reset and persist.
    pub fn initialize(&mut self) {
        let now = self.clock.now_millis();
        let key = self.scope.storage_key();

        let loaded = match self.store.load(&key) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(scope = %self.scope, error = %e, "failed to load usage record, starting fresh");
                None
            }
        };

        let mut record = loaded.unwrap_or_else(|| UsageRecord::fresh(now, next_midnight(now)));
        if now >= record.daily_reset_time {
            tracing::debug!(
                scope = %self.scope,
                previous = record.images_processed,
                "daily usage reset"
            );
            record.images_processed = 0;
            record.daily_reset_time = advance_boundary(record.daily_reset_time, now);
        }

        self.usage = record;
        self.persist();
    }

    /// Whether `requested` more images may be loaded next to `loaded` ones.
    pub fn can_upload(&self, tier: Tier, requested: usize, loaded: usize) -> Decision {
        if tier.is_premium() {
            return Decision::allow();
        }

        let max = self.limits.max_concurrent_uploads as usize;
        if loaded.saturating_add(requested) > max {
            return Decision::deny(format!(
                "To avoid running out of memory, you can only have {max} images loaded at once. \
                 You have {loaded} loaded and are adding {requested}. \
                 Process or remove some images first, or upgrade to Premium."
            ));
        }
        Decision::allow()
    }

    /// Whether `requested` more images may be processed.
    pub fn can_process(&self, tier: Tier, requested: usize) -> Decision {
        if tier.is_premium() {
            return Decision::allow();
        }

        let processed = u64::from(self.usage.images_processed);
        let total = processed.saturating_add(requested as u64);

        let session = self.limits.max_processing_per_session;
        if total > u64::from(session) {
            return Decision::deny(format!(
                "Free users can only compress {session} images per session. \
                 You've compressed {processed} images so far. \
                 Start a new session, or upgrade to Premium for unlimited processing."
            ));
        }

        let daily = self.limits.max_daily_processing;
        if total > u64::from(daily) {
            return Decision::deny(format!(
                "Free users can only compress {daily} images per day. \
                 You've compressed {processed} images today. \
                 Try again tomorrow or upgrade to Premium."
            ));
        }

        Decision::allow()
    }

    /// Count `count` newly processed images and persist.
    pub fn track_processed(&mut self, count: u32) {
        if count == 0 {
            return;
        }
        self.usage.images_processed = self.usage.images_processed.saturating_add(count);
        tracing::debug!(
            scope = %self.scope,
            count,
            total = self.usage.images_processed,
            "tracked processed images"
        );
        self.persist();
    }

    /// Images that may still be processed.
    pub fn remaining_processing(&self, tier: Tier) -> Remaining {
        if tier.is_premium() {
            return Remaining::Unlimited;
        }
        Remaining::Limited(self.limits.effective_cap().saturating_sub(self.usage.images_processed))
    }

    /// Snapshot of the current record.
    pub fn usage(&self) -> UsageRecord {
        self.usage
    }

    /// Scope being tracked.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Limits in force.
    pub fn limits(&self) -> &UsageLimits {
        &self.limits
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.scope.storage_key(), &self.usage) {
            tracing::warn!(scope = %self.scope, error = %e, "failed to persist usage record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, DAY_MS};
    use crate::store::MemoryStore;
    use slimsnap_core::{Error, Result};

    // 2024-03-10T15:30:00Z
    const NOW: i64 = 1_710_084_600_000;

    fn tracker_with(store: Arc<dyn UsageStore>, clock: Arc<ManualClock>) -> QuotaTracker {
        QuotaTracker::new(store, clock, Scope::Anonymous, UsageLimits::default())
    }

    fn fresh() -> (QuotaTracker, Arc<MemoryStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(NOW));
        (tracker_with(store.clone(), clock.clone()), store, clock)
    }

    struct BrokenStore;

    impl UsageStore for BrokenStore {
        fn load(&self, _key: &str) -> Result<Option<UsageRecord>> {
            Err(Error::store_read("disk on fire"))
        }

        fn save(&self, _key: &str, _record: &UsageRecord) -> Result<()> {
            Err(Error::store_write("disk on fire"))
        }
    }

    #[test]
    fn test_initialize_creates_and_persists() {
        let (tracker, store, _) = fresh();
        let usage = tracker.usage();
        assert_eq!(usage.images_processed, 0);
        assert_eq!(usage.session_start, NOW);
        assert_eq!(usage.daily_reset_time, next_midnight(NOW));
        assert_eq!(store.load(&Scope::Anonymous.storage_key()).unwrap(), Some(usage));
    }

    #[test]
    fn test_can_upload() {
        let (tracker, _, _) = fresh();
        assert!(tracker.can_upload(Tier::Free, 3, 0).allowed);
        assert!(tracker.can_upload(Tier::Free, 1, 2).allowed);

        let denied = tracker.can_upload(Tier::Free, 2, 2);
        assert!(!denied.allowed);
        assert!(denied.reason.contains('3'));
        assert!(tracker.can_upload(Tier::Premium, 50, 50).allowed);
    }

    #[test]
    fn test_session_cap() {
        let (mut tracker, _, _) = fresh();
        tracker.track_processed(2);

        assert!(tracker.can_process(Tier::Free, 1).allowed);
        let denied = tracker.can_process(Tier::Free, 2);
        assert!(!denied.allowed);
        assert!(denied.reason.contains("per session"));
        assert!(denied.reason.contains("compressed 2"));
        assert_eq!(tracker.remaining_processing(Tier::Free), Remaining::Limited(1));
    }

    #[test]
    fn test_daily_cap_reason() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(NOW));
        let limits = UsageLimits {
            max_processing_per_session: 50,
            ..UsageLimits::default()
        };
        let mut tracker = QuotaTracker::new(store, clock, Scope::Anonymous, limits);
        tracker.track_processed(9);

        let denied = tracker.can_process(Tier::Free, 2);
        assert!(!denied.allowed);
        assert!(denied.reason.contains("per day"));
        assert_eq!(tracker.remaining_processing(Tier::Free), Remaining::Limited(1));
    }

    #[test]
    fn test_premium_unlimited() {
        let (mut tracker, _, _) = fresh();
        tracker.track_processed(100);
        assert!(tracker.can_process(Tier::Premium, 1000).allowed);
        assert_eq!(tracker.remaining_processing(Tier::Premium), Remaining::Unlimited);
        assert_eq!(tracker.remaining_processing(Tier::Free), Remaining::Limited(0));
    }

    #[test]
    fn test_counter_persists_across_trackers() {
        let (mut tracker, store, clock) = fresh();
        tracker.track_processed(2);

        let reopened = tracker_with(store, clock);
        assert_eq!(reopened.usage().images_processed, 2);
        assert!(!reopened.can_process(Tier::Free, 2).allowed);
    }

    #[test]
    fn test_daily_reset_advances_boundary() {
        let (mut tracker, store, clock) = fresh();
        tracker.track_processed(3);
        let boundary = tracker.usage().daily_reset_time;

        clock.set(boundary + 1);
        let reopened = tracker_with(store, clock);
        let usage = reopened.usage();
        assert_eq!(usage.images_processed, 0);
        assert_eq!(usage.session_start, NOW);
        assert_eq!(usage.daily_reset_time, boundary + DAY_MS);
    }

    #[test]
    fn test_no_reset_before_boundary() {
        let (mut tracker, store, clock) = fresh();
        tracker.track_processed(1);
        clock.set(tracker.usage().daily_reset_time - 1);

        let reopened = tracker_with(store, clock);
        assert_eq!(reopened.usage().images_processed, 1);
    }

    #[test]
    fn test_broken_store_degrades_to_memory() {
        let clock = Arc::new(ManualClock::new(NOW));
        let mut tracker = tracker_with(Arc::new(BrokenStore), clock);

        assert_eq!(tracker.usage().images_processed, 0);
        tracker.track_processed(2);
        assert_eq!(tracker.usage().images_processed, 2);
        assert!(!tracker.can_process(Tier::Free, 2).allowed);
    }

    #[test]
    fn test_counter_saturates() {
        let (mut tracker, _, _) = fresh();
        tracker.track_processed(u32::MAX);
        tracker.track_processed(5);
        assert_eq!(tracker.usage().images_processed, u32::MAX);
        assert!(!tracker.can_process(Tier::Free, usize::MAX).allowed);
    }

    #[test]
    fn test_remaining_display() {
        assert_eq!(Remaining::Unlimited.to_string(), "unlimited");
        assert_eq!(Remaining::Limited(4).to_string(), "4");
    }
}
