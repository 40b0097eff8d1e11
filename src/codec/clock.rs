//! # Timestamp Reconciler
//!
//! Converts locally-monotonic uptime stamps into absolute epoch milliseconds.
//!
//! The offset is `epoch_s * 1000 - uptime_at_sync_ms`, recomputed from the
//! latest epoch/uptime pair on every encode call. All encoders go through
//! [`ClockOffset`] so documents produced in the same cycle agree.

use chrono::{DateTime, Utc};
use std::time::Instant;

/// Most recent pairing of wall-clock time with device uptime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeSync {
    /// Epoch seconds at the moment of synchronization
    pub epoch_s: i64,
    /// Device uptime in milliseconds at the same moment
    pub uptime_at_sync_ms: i64,
}

impl TimeSync {
    pub fn new(epoch_s: i64, uptime_at_sync_ms: i64) -> Self {
        Self {
            epoch_s,
            uptime_at_sync_ms,
        }
    }

    pub fn offset(&self) -> ClockOffset {
        ClockOffset::from_sync(self)
    }
}

/// Translation constant from local uptime to epoch milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockOffset(i64);

impl ClockOffset {
    pub fn from_sync(sync: &TimeSync) -> Self {
        ClockOffset(
            sync.epoch_s
                .saturating_mul(1000)
                .saturating_sub(sync.uptime_at_sync_ms),
        )
    }

    pub fn delta_ms(&self) -> i64 {
        self.0
    }

    /// Absolute epoch milliseconds for a local uptime stamp
    pub fn to_epoch_ms(&self, local_ms: i64) -> i64 {
        self.0.saturating_add(local_ms)
    }

    /// Same as [`to_epoch_ms`](Self::to_epoch_ms), as a UTC date-time
    pub fn to_datetime(&self, local_ms: i64) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(self.to_epoch_ms(local_ms))
    }
}

/// Source of epoch/uptime pairs and current uptime
pub trait ClockSource {
    /// Latest epoch/uptime synchronization point
    fn time_sync(&self) -> TimeSync;

    /// Current device uptime in milliseconds
    fn uptime_ms(&self) -> i64;

    /// Offset computed from the latest synchronization point
    fn offset(&self) -> ClockOffset {
        self.time_sync().offset()
    }
}

/// Host clock: uptime counts from construction, epoch from the system clock
#[derive(Debug, Clone)]
pub struct SystemClock {
    started: Instant,
    sync: TimeSync,
}

impl SystemClock {
    pub fn new() -> Self {
        let started = Instant::now();
        let sync = TimeSync::new(Utc::now().timestamp(), 0);
        Self { started, sync }
    }

    /// Re-pair the system epoch with the current uptime
    pub fn resync(&mut self) {
        let uptime = self.uptime_ms();
        self.sync = TimeSync::new(Utc::now().timestamp(), uptime);
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for SystemClock {
    fn time_sync(&self) -> TimeSync {
        self.sync
    }

    fn uptime_ms(&self) -> i64 {
        i64::try_from(self.started.elapsed().as_millis()).unwrap_or(i64::MAX)
    }
}

/// Clock with fixed readings, for deterministic encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FixedClock {
    pub sync: TimeSync,
    pub uptime_ms: i64,
}

impl FixedClock {
    pub fn new(epoch_s: i64, uptime_at_sync_ms: i64, uptime_ms: i64) -> Self {
        Self {
            sync: TimeSync::new(epoch_s, uptime_at_sync_ms),
            uptime_ms,
        }
    }
}

impl ClockSource for FixedClock {
    fn time_sync(&self) -> TimeSync {
        self.sync
    }

    fn uptime_ms(&self) -> i64 {
        self.uptime_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_formula() {
        let sync = TimeSync::new(1_600_000_000, 5_000);
        let offset = sync.offset();
        assert_eq!(offset.delta_ms(), 1_600_000_000_000 - 5_000);
    }

    #[test]
    fn test_sync_instant_maps_to_epoch() {
        let sync = TimeSync::new(1_600_000_000, 5_000);
        let offset = sync.offset();
        // The uptime at which the epoch was captured maps back to that epoch
        assert_eq!(offset.to_epoch_ms(5_000), 1_600_000_000_000);
        assert_eq!(offset.to_epoch_ms(6_500), 1_600_000_001_500);
    }

    #[test]
    fn test_to_datetime() {
        let offset = TimeSync::new(0, 0).offset();
        let dt = offset.to_datetime(86_400_000).unwrap();
        assert_eq!(dt.to_rfc3339(), "1970-01-02T00:00:00+00:00");
    }

    #[test]
    fn test_fixed_clock_offset_matches_sync() {
        let clock = FixedClock::new(100, 2_000, 9_000);
        assert_eq!(clock.offset().delta_ms(), 98_000);
        assert_eq!(clock.uptime_ms(), 9_000);
    }

    #[test]
    fn test_system_clock_uptime_monotonic() {
        let clock = SystemClock::new();
        let a = clock.uptime_ms();
        let b = clock.uptime_ms();
        assert!(b >= a);
        assert!(clock.time_sync().epoch_s > 0);
    }
}
