//! Professional-level scheduling policy.

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_HOLD_MINUTES;

/// Per-professional booking rules applied when validating a slot.
///
/// Buffers are added before/after every interval prior to conflict checking
/// so back-to-back bookings keep breathing room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferPolicy {
    pub buffer_before_min: i64,
    pub buffer_after_min: i64,
    pub max_appointments_per_day: u32,
    pub min_notice_hours: i64,
    pub reservation_hold_minutes: i64,
}

impl Default for BufferPolicy {
    fn default() -> Self {
        Self {
            buffer_before_min: 0,
            buffer_after_min: 0,
            max_appointments_per_day: 12,
            min_notice_hours: 2,
            reservation_hold_minutes: DEFAULT_HOLD_MINUTES,
        }
    }
}
