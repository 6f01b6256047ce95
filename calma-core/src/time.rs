use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{EngineError, EngineResult};

/// Half-open interval `[start, end)`. The only way to obtain one is through
/// `new`, so every window in the system is well-formed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> EngineResult<Self> {
        if end <= start {
            return Err(EngineError::InvalidRange(format!(
                "end {} is not after start {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Half-open overlap: `[a, b)` and `[c, d)` overlap iff `a < d && c < b`.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
    }

    #[test]
    fn test_rejects_inverted_range() {
        let result = TimeWindow::new(at(10, 0), at(9, 0));
        assert!(matches!(result, Err(EngineError::InvalidRange(_))));
    }

    #[test]
    fn test_rejects_empty_range() {
        let result = TimeWindow::new(at(10, 0), at(10, 0));
        assert!(matches!(result, Err(EngineError::InvalidRange(_))));
    }

    #[test]
    fn test_adjacent_windows_do_not_overlap() {
        let a = TimeWindow::new(at(9, 0), at(10, 0)).unwrap();
        let b = TimeWindow::new(at(10, 0), at(11, 0)).unwrap();
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
    }

    #[test]
    fn test_partial_overlap() {
        let a = TimeWindow::new(at(9, 0), at(10, 0)).unwrap();
        let b = TimeWindow::new(at(9, 30), at(10, 30)).unwrap();
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
    }

    #[test]
    fn test_contains_is_half_open() {
        let w = TimeWindow::new(at(9, 0), at(10, 0)).unwrap();
        assert!(w.contains(at(9, 0)));
        assert!(w.contains(at(9, 59)));
        assert!(!w.contains(at(10, 0)));
    }
}
