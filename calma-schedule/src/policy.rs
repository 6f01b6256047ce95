use calma_core::{EngineError, EngineResult};
use calma_core::time::TimeWindow;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Business-wide scheduling tunables. Loaded from configuration; the
/// defaults match the values used throughout the tests.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SchedulingPolicy {
    /// Grid step for candidate slots, also the capacity bucket width.
    pub slot_granularity_minutes: i64,
    /// Earliest a booking may start, relative to "now".
    pub min_lead_minutes: i64,
    /// How far ahead the booking horizon extends.
    pub advance_booking_days: i64,
    /// Cap on persons per service selection. A policy constant, not an
    /// engine invariant.
    pub max_party_size: i32,
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        Self {
            slot_granularity_minutes: 15,
            min_lead_minutes: 30,
            advance_booking_days: 60,
            max_party_size: 4,
        }
    }
}

impl SchedulingPolicy {
    pub fn granularity(&self) -> Duration {
        Duration::minutes(self.slot_granularity_minutes)
    }

    /// Round an instant up to the next grid point (identity when already
    /// aligned to a whole grid second).
    pub fn round_up_to_grid(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        let step = self.slot_granularity_minutes * 60;
        let mut secs = t.timestamp();
        if t.timestamp_subsec_nanos() > 0 {
            secs += 1;
        }
        let rem = secs.rem_euclid(step);
        let aligned = if rem == 0 { secs } else { secs - rem + step };
        DateTime::from_timestamp(aligned, 0).unwrap_or(t)
    }

    /// Floor an instant to the start of its capacity bucket.
    pub fn bucket_start(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        let step = self.slot_granularity_minutes * 60;
        let secs = t.timestamp();
        let aligned = secs - secs.rem_euclid(step);
        DateTime::from_timestamp(aligned, 0).unwrap_or(t)
    }

    /// Start times of every bucket a window touches.
    pub fn buckets_spanning(&self, window: &TimeWindow) -> Vec<DateTime<Utc>> {
        let mut buckets = Vec::new();
        let mut cursor = self.bucket_start(window.start());
        while cursor < window.end() {
            buckets.push(cursor);
            cursor += self.granularity();
        }
        buckets
    }

    pub fn earliest_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.round_up_to_grid(now + Duration::minutes(self.min_lead_minutes))
    }

    pub fn horizon_end(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::days(self.advance_booking_days)
    }

    pub fn validate_party_size(&self, quantity: i32, selection_index: usize) -> EngineResult<()> {
        if quantity < 1 || quantity > self.max_party_size {
            return Err(EngineError::Validation(format!(
                "selection {}: quantity {} outside 1..={}",
                selection_index, quantity, self.max_party_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, s).unwrap()
    }

    #[test]
    fn test_round_up_to_grid() {
        let policy = SchedulingPolicy::default();
        assert_eq!(policy.round_up_to_grid(at(9, 0, 0)), at(9, 0, 0));
        assert_eq!(policy.round_up_to_grid(at(9, 0, 1)), at(9, 15, 0));
        assert_eq!(policy.round_up_to_grid(at(9, 14, 59)), at(9, 15, 0));
        assert_eq!(policy.round_up_to_grid(at(9, 46, 0)), at(10, 0, 0));
    }

    #[test]
    fn test_buckets_spanning_half_open_window() {
        let policy = SchedulingPolicy::default();
        let window = TimeWindow::new(at(9, 0, 0), at(9, 30, 0)).unwrap();
        assert_eq!(policy.buckets_spanning(&window), vec![at(9, 0, 0), at(9, 15, 0)]);

        // An unaligned window still covers the bucket it starts in.
        let window = TimeWindow::new(at(9, 5, 0), at(9, 20, 0)).unwrap();
        assert_eq!(policy.buckets_spanning(&window), vec![at(9, 0, 0), at(9, 15, 0)]);
    }

    #[test]
    fn test_validate_party_size_bounds() {
        let policy = SchedulingPolicy::default();
        assert!(policy.validate_party_size(1, 0).is_ok());
        assert!(policy.validate_party_size(4, 0).is_ok());
        assert!(policy.validate_party_size(0, 0).is_err());
        assert!(policy.validate_party_size(5, 0).is_err());
    }
}
