//! SQLite document store.
//!
//! Timestamps are persisted as epoch seconds so range queries stay indexed;
//! the notification columns keep the historical store's field names.

use chrono::{DateTime, TimeZone, Utc};

pub mod appointment_repository;
pub mod manager;
pub mod policy_repository;
pub mod professional_repository;
pub mod reservation_repository;

pub use appointment_repository::SqliteAppointmentRepository;
pub use manager::DbManager;
pub use policy_repository::SqlitePolicyRepository;
pub use professional_repository::SqliteProfessionalRepository;
pub use reservation_repository::SqliteReservationRepository;

/// Epoch seconds for storage.
pub(crate) fn to_epoch(value: DateTime<Utc>) -> i64 {
    value.timestamp()
}

/// Parse stored epoch seconds; `None` for out-of-range values.
pub(crate) fn from_epoch(value: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(value, 0).single()
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn int_to_bool(value: i64) -> bool {
    value != 0
}
