//! Port interfaces for reminder sweeps
//!
//! These traits define the boundaries between core business logic
//! and infrastructure implementations.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use slotbook_domain::{Appointment, ReminderKind, Result};

/// Result of a lease-acquisition transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseOutcome {
    /// Lease written; this sweep owns the send.
    Acquired,
    /// Marker already `sent` for this reminder kind.
    AlreadySent,
    /// A live `sending` lease is held by a concurrent sweep.
    Busy,
}

/// Trait for the reminder side of the appointment store
#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// Appointments whose `date_time` falls in `[start, end)`.
    ///
    /// Served by an indexed range query where available; implementations
    /// may degrade to an exhaustive scan.
    async fn find_in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Appointment>>;

    /// Attempt to acquire the per-(appointment, kind) sending lease.
    ///
    /// Runs as one transaction: abort when the `sent` marker is present or
    /// a `sending` lease younger than `lease_ttl` is live, else write a
    /// `sending` lease stamped `now`. A lease older than `lease_ttl` is
    /// treated as abandoned and re-acquired.
    async fn acquire_reminder_lease(
        &self,
        appointment_id: &str,
        kind: ReminderKind,
        now: DateTime<Utc>,
        lease_ttl: Duration,
    ) -> Result<LeaseOutcome>;

    /// Record a successful send: set `sent`, clear the lease and any
    /// previous error.
    async fn complete_reminder(&self, appointment_id: &str, kind: ReminderKind) -> Result<()>;

    /// Clear the lease after a failed send, recording the error so the
    /// next scheduled run can retry.
    async fn release_reminder_lease(
        &self,
        appointment_id: &str,
        kind: ReminderKind,
        error: &str,
    ) -> Result<()>;
}
