//! Wall-clock abstraction.
//!
//! Times are epoch milliseconds, the unit the usage record persists. Day
//! boundaries are UTC midnights.

use std::sync::atomic::{AtomicI64, Ordering};

/// Milliseconds in one day.
pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current time in epoch milliseconds
    fn now_millis(&self) -> i64;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Clock frozen at `now_millis`.
    pub fn new(now_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(now_millis),
        }
    }

    /// Jump to an absolute time.
    pub fn set(&self, now_millis: i64) {
        self.now.store(now_millis, Ordering::SeqCst);
    }

    /// Move forward by `millis`.
    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// The first UTC midnight strictly after `now_millis`.
pub fn next_midnight(now_millis: i64) -> i64 {
    (now_millis.div_euclid(DAY_MS) + 1) * DAY_MS
}

/// Advance `boundary` in whole days until it lies after `now_millis`.
///
/// A boundary crossed less than a day ago moves forward by exactly one day.
pub fn advance_boundary(boundary: i64, now_millis: i64) -> i64 {
    if now_millis < boundary {
        return boundary;
    }
    let elapsed_days = (now_millis - boundary).div_euclid(DAY_MS);
    boundary + (elapsed_days + 1) * DAY_MS
}

/// Render epoch milliseconds for humans.
pub fn format_millis(millis: i64) -> String {
    use chrono::TimeZone;
    match chrono::Utc.timestamp_millis_opt(millis).single() {
        Some(at) => at.format("%Y-%m-%d %H:%M UTC").to_string(),
        None => millis.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-03-10T15:30:00Z
    const AFTERNOON: i64 = 1_710_084_600_000;

    #[test]
    fn test_next_midnight() {
        assert_eq!(next_midnight(AFTERNOON), 1_710_115_200_000);
        assert_eq!(next_midnight(1_710_115_200_000), 1_710_115_200_000 + DAY_MS);
        assert_eq!(next_midnight(0), DAY_MS);
    }

    #[test]
    fn test_advance_boundary_by_one_day() {
        let boundary = next_midnight(AFTERNOON);
        assert_eq!(advance_boundary(boundary, boundary), boundary + DAY_MS);
        assert_eq!(advance_boundary(boundary, boundary + 1000), boundary + DAY_MS);
        assert_eq!(advance_boundary(boundary, boundary - 1), boundary);
    }

    #[test]
    fn test_advance_boundary_after_long_absence() {
        let boundary = next_midnight(AFTERNOON);
        let now = boundary + 3 * DAY_MS + 5;
        let advanced = advance_boundary(boundary, now);
        assert!(advanced > now);
        assert_eq!(advanced, boundary + 4 * DAY_MS);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(100);
        clock.advance(50);
        assert_eq!(clock.now_millis(), 150);
        clock.set(7);
        assert_eq!(clock.now_millis(), 7);
    }

    #[test]
    fn test_format_millis() {
        assert_eq!(format_millis(AFTERNOON), "2024-03-10 15:30 UTC");
    }
}
