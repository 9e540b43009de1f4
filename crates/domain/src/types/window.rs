//! Time windows and buffered-interval arithmetic.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Half-open interval `[start, end)` derived from a start time and a
/// duration in minutes. Not persisted standalone; computed per entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Build a window from a start time and duration.
    pub fn from_start(start: DateTime<Utc>, duration_minutes: i64) -> Self {
        Self { start, end: start + Duration::minutes(duration_minutes) }
    }

    /// Expand the window by the configured before/after buffer minutes.
    pub fn buffered(&self, before_min: i64, after_min: i64) -> Self {
        Self {
            start: self.start - Duration::minutes(before_min),
            end: self.end + Duration::minutes(after_min),
        }
    }

    /// Two windows conflict when their intervals intersect.
    pub fn intersects(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }
}
