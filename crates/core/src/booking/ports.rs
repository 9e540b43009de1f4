//! Port interfaces for booking
//!
//! These traits define the boundaries between core business logic
//! and infrastructure implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use slotbook_domain::{Appointment, BufferPolicy, HoldRequest, Reservation, Result};

/// Trait for the transactional reservation/appointment store
///
/// Both mutating operations carry a transactional contract: the
/// read-check-write cycle runs inside a single store transaction, with the
/// checks from [`crate::booking::conflict`] applied to the rows read in
/// that same transaction. A successful return therefore proves the slot was
/// free of conflicting bookings and live holds at commit time.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Atomically validate and insert a hold.
    ///
    /// Implementations load the day's appointments and live holds, apply
    /// `check_day_cap` and `check_slot_free`, then insert a hold expiring
    /// `policy.reservation_hold_minutes` from now.
    async fn create_hold(
        &self,
        request: &HoldRequest,
        policy: &BufferPolicy,
    ) -> Result<Reservation>;

    /// Atomically convert a still-valid hold into an appointment.
    ///
    /// Implementations re-read the hold (`NotFound` when absent), apply
    /// `check_hold_usable`, re-run the overlap check against current
    /// appointments, derive the paid state from `payment_status` or the
    /// hold's stored status, insert the appointment (`Confirmed` when paid,
    /// `Scheduled` otherwise), and mark the hold used with the new
    /// appointment linked.
    async fn finalize_hold(
        &self,
        professional_id: &str,
        reservation_id: &str,
        payment_status: Option<&str>,
    ) -> Result<Appointment>;

    /// Fetch one hold (diagnostics and tests).
    async fn find_hold(&self, reservation_id: &str) -> Result<Option<Reservation>>;

    /// Delete unused holds that expired before `cutoff`.
    ///
    /// Returns the number of purged holds.
    async fn purge_expired_holds(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

/// Trait for loading per-professional booking rules
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Booking rules for one professional; defaults when unconfigured.
    async fn policy_for(&self, professional_id: &str) -> Result<BufferPolicy>;
}
