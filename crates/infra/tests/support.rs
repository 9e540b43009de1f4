//! Shared helpers for infra integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use slotbook_domain::{
    Appointment, AppointmentStatus, BufferPolicy, HoldRequest, NotificationState,
};
use slotbook_infra::database::{
    DbManager, SqliteAppointmentRepository, SqlitePolicyRepository, SqliteProfessionalRepository,
    SqliteReservationRepository,
};
use slotbook_infra::notify::ChangeFeed;
use tempfile::TempDir;

pub struct TestEnv {
    pub db: Arc<DbManager>,
    pub changes: Arc<ChangeFeed>,
    pub reservations: Arc<SqliteReservationRepository>,
    pub appointments: Arc<SqliteAppointmentRepository>,
    pub policies: Arc<SqlitePolicyRepository>,
    pub professionals: Arc<SqliteProfessionalRepository>,
    _temp_dir: TempDir,
}

pub fn setup() -> TestEnv {
    let temp_dir = TempDir::new().expect("temp dir created");
    let db = Arc::new(
        DbManager::new(temp_dir.path().join("test.db"), 8).expect("manager created"),
    );
    db.run_migrations().expect("migrations applied");

    let changes = Arc::new(ChangeFeed::new());
    let reservations =
        Arc::new(SqliteReservationRepository::new(Arc::clone(&db), Arc::clone(&changes)));
    let appointments =
        Arc::new(SqliteAppointmentRepository::new(Arc::clone(&db), Arc::clone(&changes)));
    let policies = Arc::new(SqlitePolicyRepository::new(Arc::clone(&db)));
    let professionals = Arc::new(SqliteProfessionalRepository::new(Arc::clone(&db)));

    TestEnv {
        db,
        changes,
        reservations,
        appointments,
        policies,
        professionals,
        _temp_dir: temp_dir,
    }
}

/// Fixed future date so notice checks and day caps stay deterministic.
pub fn slot(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 6, 3, h, m, 0).single().expect("valid timestamp")
}

pub fn hold_request(professional_id: &str, date_time: DateTime<Utc>) -> HoldRequest {
    HoldRequest {
        professional_id: professional_id.into(),
        service_id: "consultation".into(),
        date_time,
        duration_minutes: 50,
        client_name: "Ana".into(),
        client_email: Some("ana@example.com".into()),
        payment_gateway: Some("stripe".into()),
    }
}

pub fn appointment(id: &str, professional_id: &str, date_time: DateTime<Utc>) -> Appointment {
    Appointment {
        id: id.into(),
        professional_id: professional_id.into(),
        client_name: "Bia".into(),
        client_email: Some("bia@example.com".into()),
        service: "consultation".into(),
        date_time,
        duration_minutes: 50,
        status: AppointmentStatus::Confirmed,
        payment_status: Some("paid".into()),
        notification: NotificationState::default(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// Policy without notice requirements so tests can book fixed dates freely.
pub fn relaxed_policy(buffer_min: i64, max_per_day: u32) -> BufferPolicy {
    BufferPolicy {
        buffer_before_min: buffer_min,
        buffer_after_min: buffer_min,
        max_appointments_per_day: max_per_day,
        min_notice_hours: 0,
        reservation_hold_minutes: 30,
    }
}
