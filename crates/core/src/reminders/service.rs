//! Reminder sweep - core business logic
//!
//! A sweep scans one look-ahead window and sends at most one reminder per
//! (appointment, kind). The lease transaction in the store is the sole
//! synchronization point between overlapping sweep executions; the send
//! itself happens outside any lock and failures only release the lease so
//! the next scheduled run retries.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use slotbook_domain::{Appointment, ReminderConfig, ReminderKind, Result};
use tracing::{debug, info, warn};

use super::ports::{LeaseOutcome, ReminderStore};
use crate::notify::ports::EmailSender;
use crate::notify::templates;

/// Counters for one sweep run, logged by the scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub examined: usize,
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Periodic reminder sweeper
pub struct ReminderService {
    store: Arc<dyn ReminderStore>,
    sender: Arc<dyn EmailSender>,
    config: ReminderConfig,
}

impl ReminderService {
    /// Create a new reminder service
    pub fn new(
        store: Arc<dyn ReminderStore>,
        sender: Arc<dyn EmailSender>,
        config: ReminderConfig,
    ) -> Self {
        Self { store, sender, config }
    }

    /// Run one sweep for `kind` anchored at the current time.
    pub async fn run_sweep(&self, kind: ReminderKind) -> Result<SweepSummary> {
        self.run_sweep_at(kind, Utc::now()).await
    }

    /// Run one sweep for `kind` anchored at `now` (injectable for tests).
    pub async fn run_sweep_at(
        &self,
        kind: ReminderKind,
        now: DateTime<Utc>,
    ) -> Result<SweepSummary> {
        let window = match kind {
            ReminderKind::TwentyFourHour => &self.config.twenty_four_hour,
            ReminderKind::ThreeHour => &self.config.three_hour,
        };
        let start = now + Duration::minutes(window.start_offset_minutes);
        let end = now + Duration::minutes(window.end_offset_minutes);
        let lease_ttl = Duration::minutes(self.config.lease_ttl_minutes);

        let candidates = self.store.find_in_window(start, end).await?;
        let mut summary = SweepSummary::default();

        for appointment in candidates {
            summary.examined += 1;

            if let Some(reason) = skip_reason(kind, &appointment) {
                debug!(
                    appointment_id = %appointment.id,
                    kind = kind.label(),
                    reason,
                    "reminder candidate skipped"
                );
                summary.skipped += 1;
                continue;
            }

            match self
                .store
                .acquire_reminder_lease(&appointment.id, kind, now, lease_ttl)
                .await
            {
                Ok(LeaseOutcome::Acquired) => {
                    if self.deliver(kind, &appointment).await {
                        summary.sent += 1;
                    } else {
                        summary.failed += 1;
                    }
                }
                Ok(outcome) => {
                    debug!(
                        appointment_id = %appointment.id,
                        kind = kind.label(),
                        ?outcome,
                        "reminder lease not acquired"
                    );
                    summary.skipped += 1;
                }
                Err(err) => {
                    warn!(
                        appointment_id = %appointment.id,
                        kind = kind.label(),
                        error = %err,
                        "reminder lease transaction failed"
                    );
                    summary.failed += 1;
                }
            }
        }

        info!(
            kind = kind.label(),
            examined = summary.examined,
            sent = summary.sent,
            skipped = summary.skipped,
            failed = summary.failed,
            "reminder sweep finished"
        );
        Ok(summary)
    }

    /// Send outside the lease transaction; bookkeep the outcome.
    async fn deliver(&self, kind: ReminderKind, appointment: &Appointment) -> bool {
        // skip_reason guarantees a recipient exists once the lease is held.
        let Some(email) = appointment.client_email.as_deref() else {
            return false;
        };

        let rendered = templates::reminder_email(kind, appointment);
        match self
            .sender
            .send(email, &appointment.client_name, &rendered.subject, &rendered.html)
            .await
        {
            Ok(message_id) => {
                if let Err(err) = self.store.complete_reminder(&appointment.id, kind).await {
                    warn!(
                        appointment_id = %appointment.id,
                        kind = kind.label(),
                        error = %err,
                        "reminder sent but completion write failed"
                    );
                    return false;
                }
                info!(
                    appointment_id = %appointment.id,
                    kind = kind.label(),
                    message_id = %message_id,
                    "reminder sent"
                );
                true
            }
            Err(err) => {
                let message = err.to_string();
                if let Err(release_err) = self
                    .store
                    .release_reminder_lease(&appointment.id, kind, &message)
                    .await
                {
                    warn!(
                        appointment_id = %appointment.id,
                        kind = kind.label(),
                        error = %release_err,
                        "failed to release reminder lease after send failure"
                    );
                }
                warn!(
                    appointment_id = %appointment.id,
                    kind = kind.label(),
                    error = %message,
                    "reminder send failed; next run retries"
                );
                false
            }
        }
    }
}

/// Why a candidate is ineligible, or `None` when it should be reminded.
fn skip_reason(kind: ReminderKind, appointment: &Appointment) -> Option<&'static str> {
    if appointment.notification.reminder_sent(kind) {
        return Some("already sent");
    }
    if !appointment.status.is_reminder_eligible() {
        return Some("status not eligible");
    }
    if appointment.client_email.is_none() {
        return Some("no recipient");
    }
    None
}
