//! SQLite-backed appointment repository.
//!
//! Implements the notifier's patch store and the reminder store. Semantic
//! writes (insert, status change, reschedule) and notification patches are
//! published to the change feed as `{before, after}` pairs; reminder lease
//! bookkeeping stays off-feed because it never carries a semantic change.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, Row, ToSql, TransactionBehavior};
use slotbook_core::notify::ports::NotificationPatchStore;
use slotbook_core::reminders::ports::{LeaseOutcome, ReminderStore};
use slotbook_domain::{
    Appointment, AppointmentChange, AppointmentStatus, ChannelStatus, NotificationPatch,
    NotificationState, ReminderKind, Result as DomainResult, SlotbookError,
};
use tokio::task;
use tracing::warn;

use super::manager::{map_sql_error, DbManager};
use super::{bool_to_int, from_epoch, int_to_bool, to_epoch};
use crate::notify::ChangeFeed;

/// SQLite-backed appointment repository.
pub struct SqliteAppointmentRepository {
    db: Arc<DbManager>,
    changes: Arc<ChangeFeed>,
}

pub(crate) const APPOINTMENT_COLUMNS: &str = "id, professional_id, client_name, client_email, \
     service, date_time, duration_minutes, status, payment_status, \
     confirmationEmailStatus, professionalNotificationStatus, updateEmailStatus, \
     welcomeEmailAttemptCount, emailUpdateCount, \
     reminder24hSent, reminder24hSending, reminder24hError, \
     reminder3hSent, reminder3hSending, reminder3hError, \
     created_at, updated_at";

const APPOINTMENT_INSERT_SQL: &str = "INSERT INTO appointments (
        id, professional_id, client_name, client_email, service, date_time, duration_minutes,
        status, payment_status, confirmationEmailStatus, professionalNotificationStatus,
        updateEmailStatus, welcomeEmailAttemptCount, emailUpdateCount,
        reminder24hSent, reminder24hSending, reminder24hError,
        reminder3hSent, reminder3hSending, reminder3hError, created_at, updated_at
    ) VALUES (
        ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
        ?16, ?17, ?18, ?19, ?20, ?21, ?22
    )";

struct ReminderSql {
    select: &'static str,
    acquire: &'static str,
    complete: &'static str,
    release: &'static str,
}

const REMINDER_24H_SQL: ReminderSql = ReminderSql {
    select: "SELECT reminder24hSent, reminder24hSending FROM appointments WHERE id = ?1",
    acquire: "UPDATE appointments SET reminder24hSending = ?1 WHERE id = ?2",
    complete: "UPDATE appointments SET reminder24hSent = 1, reminder24hSending = NULL, \
               reminder24hError = NULL, updated_at = ?1 WHERE id = ?2",
    release: "UPDATE appointments SET reminder24hSending = NULL, reminder24hError = ?1, \
              updated_at = ?2 WHERE id = ?3",
};

const REMINDER_3H_SQL: ReminderSql = ReminderSql {
    select: "SELECT reminder3hSent, reminder3hSending FROM appointments WHERE id = ?1",
    acquire: "UPDATE appointments SET reminder3hSending = ?1 WHERE id = ?2",
    complete: "UPDATE appointments SET reminder3hSent = 1, reminder3hSending = NULL, \
               reminder3hError = NULL, updated_at = ?1 WHERE id = ?2",
    release: "UPDATE appointments SET reminder3hSending = NULL, reminder3hError = ?1, \
              updated_at = ?2 WHERE id = ?3",
};

fn reminder_sql(kind: ReminderKind) -> &'static ReminderSql {
    match kind {
        ReminderKind::TwentyFourHour => &REMINDER_24H_SQL,
        ReminderKind::ThreeHour => &REMINDER_3H_SQL,
    }
}

impl SqliteAppointmentRepository {
    /// Construct a repository backed by the shared manager.
    pub fn new(db: Arc<DbManager>, changes: Arc<ChangeFeed>) -> Self {
        Self { db, changes }
    }

    /// Insert one appointment directly (the unguarded creation path).
    pub async fn insert(&self, appointment: &Appointment) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let to_insert = appointment.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            insert_appointment(&conn, &to_insert).map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)??;

        self.changes.publish(AppointmentChange { before: None, after: appointment.clone() });
        Ok(())
    }

    /// Fetch one appointment.
    pub async fn get(&self, appointment_id: &str) -> DomainResult<Option<Appointment>> {
        let db = Arc::clone(&self.db);
        let id = appointment_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<Appointment>> {
            let conn = db.get_connection()?;
            fetch_appointment(&conn, &id).map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    /// Professional-facing status mutation (cancel, confirm, finish).
    pub async fn set_status(
        &self,
        appointment_id: &str,
        status: AppointmentStatus,
    ) -> DomainResult<Appointment> {
        let sql = "UPDATE appointments SET status = ?1, updated_at = ?2 WHERE id = ?3";
        let status_text = status.to_string();
        self.mutate_and_publish(appointment_id, move |tx, id, now| {
            tx.execute(sql, params![status_text, to_epoch(now), id])?;
            Ok(())
        })
        .await
    }

    /// Professional-facing reschedule.
    pub async fn reschedule(
        &self,
        appointment_id: &str,
        date_time: DateTime<Utc>,
        duration_minutes: i64,
    ) -> DomainResult<Appointment> {
        let sql =
            "UPDATE appointments SET date_time = ?1, duration_minutes = ?2, updated_at = ?3 WHERE id = ?4";
        self.mutate_and_publish(appointment_id, move |tx, id, now| {
            tx.execute(sql, params![to_epoch(date_time), duration_minutes, to_epoch(now), id])?;
            Ok(())
        })
        .await
    }

    /// Run one mutation inside a transaction, returning the post-write
    /// document and publishing the `{before, after}` pair.
    async fn mutate_and_publish<F>(
        &self,
        appointment_id: &str,
        mutate: F,
    ) -> DomainResult<Appointment>
    where
        F: FnOnce(&rusqlite::Transaction<'_>, &str, DateTime<Utc>) -> rusqlite::Result<()>
            + Send
            + 'static,
    {
        let db = Arc::clone(&self.db);
        let id = appointment_id.to_string();

        let (before, after) = task::spawn_blocking(
            move || -> DomainResult<(Appointment, Appointment)> {
                let mut conn = db.get_connection()?;
                let tx = conn
                    .transaction_with_behavior(TransactionBehavior::Immediate)
                    .map_err(map_sql_error)?;

                let before = fetch_appointment(&tx, &id)
                    .map_err(map_sql_error)?
                    .ok_or_else(|| SlotbookError::NotFound(format!("appointment {id}")))?;

                mutate(&tx, &id, Utc::now()).map_err(map_sql_error)?;

                let after = fetch_appointment(&tx, &id)
                    .map_err(map_sql_error)?
                    .ok_or_else(|| SlotbookError::NotFound(format!("appointment {id}")))?;

                tx.commit().map_err(map_sql_error)?;
                Ok((before, after))
            },
        )
        .await
        .map_err(map_join_error)??;

        self.changes
            .publish(AppointmentChange { before: Some(before), after: after.clone() });
        Ok(after)
    }
}

#[async_trait]
impl NotificationPatchStore for SqliteAppointmentRepository {
    async fn apply_notification_patch(
        &self,
        appointment_id: &str,
        patch: &NotificationPatch,
    ) -> DomainResult<()> {
        if patch.is_empty() {
            return Ok(());
        }

        let patch = patch.clone();
        self.mutate_and_publish(appointment_id, move |tx, id, now| {
            apply_patch(tx, id, &patch, now)
        })
        .await
        .map(|_| ())
    }
}

fn apply_patch(
    tx: &rusqlite::Transaction<'_>,
    id: &str,
    patch: &NotificationPatch,
    now: DateTime<Utc>,
) -> rusqlite::Result<()> {
    // Accumulated single write: only the provided fields are touched.
    let confirmation = patch.confirmation_email_status.as_ref().map(ToString::to_string);
    let professional = patch.professional_notification_status.as_ref().map(ToString::to_string);
    let update = patch.update_email_status.as_ref().map(ToString::to_string);
    let welcome = patch.welcome_email_attempt_count.map(i64::from);
    let updates = patch.email_update_count.map(i64::from);
    let updated_at = to_epoch(now);

    let mut sets: Vec<&'static str> = Vec::new();
    let mut params: Vec<&dyn ToSql> = Vec::new();

    if let Some(value) = confirmation.as_ref() {
        sets.push("confirmationEmailStatus = ?");
        params.push(value);
    }
    if let Some(value) = professional.as_ref() {
        sets.push("professionalNotificationStatus = ?");
        params.push(value);
    }
    if let Some(value) = update.as_ref() {
        sets.push("updateEmailStatus = ?");
        params.push(value);
    }
    if let Some(value) = welcome.as_ref() {
        sets.push("welcomeEmailAttemptCount = ?");
        params.push(value);
    }
    if let Some(value) = updates.as_ref() {
        sets.push("emailUpdateCount = ?");
        params.push(value);
    }
    sets.push("updated_at = ?");
    params.push(&updated_at);
    params.push(&id);

    let sql = format!("UPDATE appointments SET {} WHERE id = ?", sets.join(", "));
    tx.execute(&sql, params.as_slice())?;
    Ok(())
}

#[async_trait]
impl ReminderStore for SqliteAppointmentRepository {
    async fn find_in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DomainResult<Vec<Appointment>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Vec<Appointment>> {
            let conn = db.get_connection()?;
            let sql = format!(
                "SELECT {APPOINTMENT_COLUMNS} FROM appointments \
                 WHERE date_time >= ?1 AND date_time < ?2 ORDER BY date_time ASC"
            );
            let mut stmt = conn.prepare(&sql).map_err(map_sql_error)?;
            let rows = stmt
                .query_map(params![to_epoch(start), to_epoch(end)], map_appointment_row)
                .map_err(map_sql_error)?;

            // Rows that no longer parse are skipped rather than failing the
            // whole sweep.
            let mut appointments = Vec::new();
            for row in rows {
                match row {
                    Ok(appointment) => appointments.push(appointment),
                    Err(err) => {
                        warn!(error = %err, "skipping unreadable appointment row");
                    }
                }
            }
            Ok(appointments)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn acquire_reminder_lease(
        &self,
        appointment_id: &str,
        kind: ReminderKind,
        now: DateTime<Utc>,
        lease_ttl: Duration,
    ) -> DomainResult<LeaseOutcome> {
        let db = Arc::clone(&self.db);
        let id = appointment_id.to_string();
        let sql = reminder_sql(kind);

        task::spawn_blocking(move || -> DomainResult<LeaseOutcome> {
            let mut conn = db.get_connection()?;
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(map_sql_error)?;

            let (sent, sending): (i64, Option<i64>) = tx
                .query_row(sql.select, params![id], |row| Ok((row.get(0)?, row.get(1)?)))
                .map_err(map_sql_error)?;

            if int_to_bool(sent) {
                return Ok(LeaseOutcome::AlreadySent);
            }

            if let Some(stamp) = sending.and_then(from_epoch) {
                // A young lease belongs to a live sweep; an old one is
                // abandoned and may be re-acquired.
                if now.signed_duration_since(stamp) < lease_ttl {
                    return Ok(LeaseOutcome::Busy);
                }
            }

            tx.execute(sql.acquire, params![to_epoch(now), id]).map_err(map_sql_error)?;
            tx.commit().map_err(map_sql_error)?;
            Ok(LeaseOutcome::Acquired)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn complete_reminder(
        &self,
        appointment_id: &str,
        kind: ReminderKind,
    ) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let id = appointment_id.to_string();
        let sql = reminder_sql(kind);

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(sql.complete, params![to_epoch(Utc::now()), id])
                .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn release_reminder_lease(
        &self,
        appointment_id: &str,
        kind: ReminderKind,
        error: &str,
    ) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let id = appointment_id.to_string();
        let message = error.to_string();
        let sql = reminder_sql(kind);

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(sql.release, params![message, to_epoch(Utc::now()), id])
                .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

pub(crate) fn insert_appointment(
    conn: &Connection,
    appointment: &Appointment,
) -> rusqlite::Result<()> {
    let state = &appointment.notification;
    conn.execute(
        APPOINTMENT_INSERT_SQL,
        params![
            appointment.id,
            appointment.professional_id,
            appointment.client_name,
            appointment.client_email,
            appointment.service,
            to_epoch(appointment.date_time),
            appointment.duration_minutes,
            appointment.status.to_string(),
            appointment.payment_status,
            state.confirmation_email_status.to_string(),
            state.professional_notification_status.to_string(),
            state.update_email_status.to_string(),
            i64::from(state.welcome_email_attempt_count),
            i64::from(state.email_update_count),
            bool_to_int(state.reminder_24h_sent),
            state.reminder_24h_sending.map(to_epoch),
            state.reminder_24h_error,
            bool_to_int(state.reminder_3h_sent),
            state.reminder_3h_sending.map(to_epoch),
            state.reminder_3h_error,
            to_epoch(appointment.created_at),
            to_epoch(appointment.updated_at),
        ],
    )?;
    Ok(())
}

pub(crate) fn fetch_appointment(
    conn: &Connection,
    id: &str,
) -> rusqlite::Result<Option<Appointment>> {
    let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(params![id], map_appointment_row)?;
    rows.next().transpose()
}

pub(crate) fn map_appointment_row(row: &Row<'_>) -> rusqlite::Result<Appointment> {
    let id: String = row.get(0)?;
    let status_raw: String = row.get(7)?;
    let status = parse_status(&id, &status_raw);

    let notification = NotificationState {
        confirmation_email_status: channel_status(row.get::<_, String>(9)?),
        professional_notification_status: channel_status(row.get::<_, String>(10)?),
        update_email_status: channel_status(row.get::<_, String>(11)?),
        welcome_email_attempt_count: row.get::<_, i64>(12)?.max(0) as u32,
        email_update_count: row.get::<_, i64>(13)?.max(0) as u32,
        reminder_24h_sent: int_to_bool(row.get(14)?),
        reminder_24h_sending: row.get::<_, Option<i64>>(15)?.and_then(from_epoch),
        reminder_24h_error: row.get(16)?,
        reminder_3h_sent: int_to_bool(row.get(17)?),
        reminder_3h_sending: row.get::<_, Option<i64>>(18)?.and_then(from_epoch),
        reminder_3h_error: row.get(19)?,
    };

    Ok(Appointment {
        professional_id: row.get(1)?,
        client_name: row.get(2)?,
        client_email: row.get(3)?,
        service: row.get(4)?,
        date_time: epoch_column(row, 5)?,
        duration_minutes: row.get(6)?,
        status,
        payment_status: row.get(8)?,
        notification,
        created_at: epoch_column(row, 20)?,
        updated_at: epoch_column(row, 21)?,
        id,
    })
}

fn epoch_column(row: &Row<'_>, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: i64 = row.get(index)?;
    from_epoch(raw).ok_or(rusqlite::Error::IntegralValueOutOfRange(index, raw))
}

fn channel_status(raw: String) -> ChannelStatus {
    ChannelStatus::from(raw)
}

fn parse_status(id: &str, raw: &str) -> AppointmentStatus {
    match AppointmentStatus::from_str(raw) {
        Ok(status) => status,
        Err(err) => {
            warn!(
                appointment_id = %id,
                raw_status = %raw,
                error = %err,
                "invalid appointment status in store - defaulting to Problem"
            );
            AppointmentStatus::Problem
        }
    }
}

pub(crate) fn map_join_error(err: task::JoinError) -> SlotbookError {
    if err.is_cancelled() {
        SlotbookError::Internal("database task cancelled".into())
    } else {
        SlotbookError::Internal(format!("database task panic: {err}"))
    }
}
