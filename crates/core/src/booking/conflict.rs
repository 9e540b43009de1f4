//! Slot conflict rules.
//!
//! Buffered-overlap, day-cap, notice, and hold-validity checks shared by the
//! hold and finalize transactions. Store implementations call these inside
//! the transaction that performs the corresponding write, so a passing check
//! holds at commit time.

use chrono::{DateTime, Duration, Utc};
use slotbook_domain::{
    Appointment, BufferPolicy, Reservation, Result, SlotbookError, TimeWindow,
};

/// Validate a requested window against the professional's current bookings.
///
/// `appointments` holds the professional's appointments overlapping the
/// affected day, `reservations` the hold candidates; canceled appointments
/// and dead holds are filtered here, so callers may pass supersets.
pub fn check_slot_free(
    window: TimeWindow,
    policy: &BufferPolicy,
    appointments: &[Appointment],
    reservations: &[Reservation],
    now: DateTime<Utc>,
) -> Result<()> {
    let requested = window.buffered(policy.buffer_before_min, policy.buffer_after_min);

    for appointment in appointments.iter().filter(|a| a.is_active()) {
        let occupied =
            appointment.window().buffered(policy.buffer_before_min, policy.buffer_after_min);
        if occupied.intersects(&requested) {
            return Err(SlotbookError::Conflict("slot already booked".into()));
        }
    }

    for hold in reservations.iter().filter(|r| r.is_live(now)) {
        let held = hold.window().buffered(policy.buffer_before_min, policy.buffer_after_min);
        if held.intersects(&requested) {
            return Err(SlotbookError::Conflict("slot temporarily held".into()));
        }
    }

    Ok(())
}

/// Enforce the professional's daily appointment cap.
///
/// `appointments` holds the day's appointments; only active ones count.
pub fn check_day_cap(policy: &BufferPolicy, appointments: &[Appointment]) -> Result<()> {
    let active = appointments.iter().filter(|a| a.is_active()).count();
    if active >= policy.max_appointments_per_day as usize {
        return Err(SlotbookError::ResourceExhausted("daily appointment cap reached".into()));
    }
    Ok(())
}

/// Validate that a hold can still be finalized.
pub fn check_hold_usable(reservation: &Reservation, now: DateTime<Utc>) -> Result<()> {
    if reservation.used {
        return Err(SlotbookError::PreconditionFailed("reservation already used".into()));
    }
    if reservation.is_expired(now) {
        return Err(SlotbookError::PreconditionFailed("reservation expired".into()));
    }
    Ok(())
}

/// Validate the minimum-notice precondition for a new hold.
pub fn check_min_notice(
    date_time: DateTime<Utc>,
    policy: &BufferPolicy,
    now: DateTime<Utc>,
) -> Result<()> {
    if date_time < now + Duration::hours(policy.min_notice_hours) {
        return Err(SlotbookError::PreconditionFailed("insufficient notice".into()));
    }
    Ok(())
}
