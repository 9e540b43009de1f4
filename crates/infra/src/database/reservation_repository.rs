//! SQLite-backed reservation repository.
//!
//! Implements the hold-create and finalize transactions. Both run under
//! `BEGIN IMMEDIATE` so the conflict checks hold at commit time: the write
//! lock is taken before the candidate rows are read, and a concurrent
//! writer waits on the busy timeout instead of interleaving.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use rusqlite::{params, Connection, Row, TransactionBehavior};
use slotbook_core::booking::conflict;
use slotbook_core::booking::ports::ReservationStore;
use slotbook_domain::payment::is_paid_status;
use slotbook_domain::{
    Appointment, AppointmentChange, AppointmentStatus, BufferPolicy, HoldRequest,
    NotificationState, Reservation, Result as DomainResult, SlotbookError,
};
use tokio::task;
use uuid::Uuid;

use super::appointment_repository::{
    insert_appointment, map_appointment_row, map_join_error, APPOINTMENT_COLUMNS,
};
use super::manager::{map_sql_error, DbManager};
use super::policy_repository::load_policy;
use super::{from_epoch, int_to_bool, to_epoch};
use crate::notify::ChangeFeed;

/// SQLite-backed reservation repository.
pub struct SqliteReservationRepository {
    db: Arc<DbManager>,
    changes: Arc<ChangeFeed>,
}

const RESERVATION_COLUMNS: &str = "id, professional_id, service_id, client_name, client_email, \
     date_time, duration_minutes, payment_gateway, payment_status, used, expires_at, \
     appointment_id, created_at";

const RESERVATION_INSERT_SQL: &str = "INSERT INTO reservations (
        id, professional_id, service_id, client_name, client_email, date_time, duration_minutes,
        payment_gateway, payment_status, used, expires_at, appointment_id, created_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)";

impl SqliteReservationRepository {
    /// Construct a repository backed by the shared manager.
    pub fn new(db: Arc<DbManager>, changes: Arc<ChangeFeed>) -> Self {
        Self { db, changes }
    }

    /// Appointments of one professional whose start falls in `[start, end)`.
    fn load_appointments(
        conn: &Connection,
        professional_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> rusqlite::Result<Vec<Appointment>> {
        let sql = format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments \
             WHERE professional_id = ?1 AND date_time >= ?2 AND date_time < ?3"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![professional_id, to_epoch(start), to_epoch(end)],
            map_appointment_row,
        )?;
        rows.collect()
    }

    /// Unused, unexpired holds of one professional in `[start, end)`.
    fn load_live_holds(
        conn: &Connection,
        professional_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> rusqlite::Result<Vec<Reservation>> {
        let sql = format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations \
             WHERE professional_id = ?1 AND used = 0 AND expires_at > ?2 \
               AND date_time >= ?3 AND date_time < ?4"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![professional_id, to_epoch(now), to_epoch(start), to_epoch(end)],
            map_reservation_row,
        )?;
        rows.collect()
    }
}

#[async_trait]
impl ReservationStore for SqliteReservationRepository {
    async fn create_hold(
        &self,
        request: &HoldRequest,
        policy: &BufferPolicy,
    ) -> DomainResult<Reservation> {
        let db = Arc::clone(&self.db);
        let request = request.clone();
        let policy = policy.clone();

        task::spawn_blocking(move || -> DomainResult<Reservation> {
            let mut conn = db.get_connection()?;
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(map_sql_error)?;
            let now = Utc::now();

            // The day bounds drive the cap; the scan range is widened by a
            // day on each side so buffered windows crossing midnight are
            // still candidates.
            let day_start = request.date_time.date_naive().and_time(NaiveTime::MIN).and_utc();
            let day_end = day_start + Duration::days(1);
            let scan_start = day_start - Duration::days(1);
            let scan_end = day_end + Duration::days(1);

            let appointments = Self::load_appointments(
                &tx,
                &request.professional_id,
                scan_start,
                scan_end,
            )
            .map_err(map_sql_error)?;

            let day: Vec<Appointment> = appointments
                .iter()
                .filter(|a| a.date_time >= day_start && a.date_time < day_end)
                .cloned()
                .collect();
            conflict::check_day_cap(&policy, &day)?;

            let holds = Self::load_live_holds(
                &tx,
                &request.professional_id,
                scan_start,
                scan_end,
                now,
            )
            .map_err(map_sql_error)?;

            conflict::check_slot_free(request.window(), &policy, &appointments, &holds, now)?;

            let reservation = Reservation {
                id: Uuid::new_v4().to_string(),
                professional_id: request.professional_id.clone(),
                service_id: request.service_id.clone(),
                client_name: request.client_name.clone(),
                client_email: request.client_email.clone(),
                date_time: request.date_time,
                duration_minutes: request.duration_minutes,
                payment_gateway: request.payment_gateway.clone(),
                payment_status: None,
                used: false,
                expires_at: now + Duration::minutes(policy.reservation_hold_minutes),
                appointment_id: None,
                created_at: now,
            };

            insert_reservation(&tx, &reservation).map_err(map_sql_error)?;
            tx.commit().map_err(map_sql_error)?;
            Ok(reservation)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn finalize_hold(
        &self,
        professional_id: &str,
        reservation_id: &str,
        payment_status: Option<&str>,
    ) -> DomainResult<Appointment> {
        let db = Arc::clone(&self.db);
        let professional_id = professional_id.to_string();
        let reservation_id = reservation_id.to_string();
        let caller_status = payment_status.map(str::to_string);

        let appointment = task::spawn_blocking(move || -> DomainResult<Appointment> {
            let mut conn = db.get_connection()?;
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(map_sql_error)?;
            let now = Utc::now();

            let reservation = fetch_reservation(&tx, &reservation_id)
                .map_err(map_sql_error)?
                .filter(|r| r.professional_id == professional_id)
                .ok_or_else(|| {
                    SlotbookError::NotFound(format!("reservation {reservation_id}"))
                })?;

            conflict::check_hold_usable(&reservation, now)?;

            // Re-validate against appointments committed since the hold was
            // taken; a sibling hold that finalized first now occupies the
            // slot.
            let policy = load_policy(&tx, &professional_id).map_err(map_sql_error)?;
            let scan_start = reservation.date_time - Duration::days(1);
            let scan_end = reservation.date_time + Duration::days(1);
            let appointments =
                Self::load_appointments(&tx, &professional_id, scan_start, scan_end)
                    .map_err(map_sql_error)?;
            conflict::check_slot_free(reservation.window(), &policy, &appointments, &[], now)?;

            let paid = is_paid_status(caller_status.as_deref())
                || is_paid_status(reservation.payment_status.as_deref());

            let appointment = Appointment {
                id: Uuid::new_v4().to_string(),
                professional_id: reservation.professional_id.clone(),
                client_name: reservation.client_name.clone(),
                client_email: reservation.client_email.clone(),
                service: reservation.service_id.clone(),
                date_time: reservation.date_time,
                duration_minutes: reservation.duration_minutes,
                status: if paid {
                    AppointmentStatus::Confirmed
                } else {
                    AppointmentStatus::Scheduled
                },
                payment_status: caller_status.clone().or_else(|| reservation.payment_status.clone()),
                notification: NotificationState::default(),
                created_at: now,
                updated_at: now,
            };

            insert_appointment(&tx, &appointment).map_err(map_sql_error)?;
            tx.execute(
                "UPDATE reservations SET used = 1, appointment_id = ?1 WHERE id = ?2",
                params![appointment.id, reservation.id],
            )
            .map_err(map_sql_error)?;

            tx.commit().map_err(map_sql_error)?;
            Ok(appointment)
        })
        .await
        .map_err(map_join_error)??;

        self.changes.publish(AppointmentChange { before: None, after: appointment.clone() });
        Ok(appointment)
    }

    async fn find_hold(&self, reservation_id: &str) -> DomainResult<Option<Reservation>> {
        let db = Arc::clone(&self.db);
        let id = reservation_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<Reservation>> {
            let conn = db.get_connection()?;
            fetch_reservation(&conn, &id).map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn purge_expired_holds(&self, cutoff: DateTime<Utc>) -> DomainResult<usize> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<usize> {
            let conn = db.get_connection()?;
            conn.execute(
                "DELETE FROM reservations WHERE used = 0 AND expires_at < ?1",
                params![to_epoch(cutoff)],
            )
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

fn insert_reservation(conn: &Connection, reservation: &Reservation) -> rusqlite::Result<()> {
    conn.execute(
        RESERVATION_INSERT_SQL,
        params![
            reservation.id,
            reservation.professional_id,
            reservation.service_id,
            reservation.client_name,
            reservation.client_email,
            to_epoch(reservation.date_time),
            reservation.duration_minutes,
            reservation.payment_gateway,
            reservation.payment_status,
            super::bool_to_int(reservation.used),
            to_epoch(reservation.expires_at),
            reservation.appointment_id,
            to_epoch(reservation.created_at),
        ],
    )?;
    Ok(())
}

fn fetch_reservation(conn: &Connection, id: &str) -> rusqlite::Result<Option<Reservation>> {
    let sql = format!("SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(params![id], map_reservation_row)?;
    rows.next().transpose()
}

fn map_reservation_row(row: &Row<'_>) -> rusqlite::Result<Reservation> {
    let date_time = epoch_field(row, 5)?;
    let expires_at = epoch_field(row, 10)?;
    let created_at = epoch_field(row, 12)?;

    Ok(Reservation {
        id: row.get(0)?,
        professional_id: row.get(1)?,
        service_id: row.get(2)?,
        client_name: row.get(3)?,
        client_email: row.get(4)?,
        date_time,
        duration_minutes: row.get(6)?,
        payment_gateway: row.get(7)?,
        payment_status: row.get(8)?,
        used: int_to_bool(row.get(9)?),
        expires_at,
        appointment_id: row.get(11)?,
        created_at,
    })
}

fn epoch_field(row: &Row<'_>, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: i64 = row.get(index)?;
    from_epoch(raw).ok_or(rusqlite::Error::IntegralValueOutOfRange(index, raw))
}
