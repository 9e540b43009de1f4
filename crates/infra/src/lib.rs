//! # Slotbook Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - SQLite document store (pooled connections, one write transaction per
//!   atomic operation)
//! - Change feed + listener wiring store writes to the notifier
//! - HTTP email delivery client
//! - Cron schedulers for reminder sweeps and maintenance
//! - Configuration loading
//!
//! ## Architecture
//! - Implements traits defined in `slotbook-core`
//! - Depends on `slotbook-domain` and `slotbook-core`
//! - Contains all "impure" code (I/O, network, timers)

pub mod config;
pub mod database;
pub mod email;
pub mod errors;
pub mod notify;
pub mod scheduling;

// Re-export commonly used items
pub use database::{
    DbManager, SqliteAppointmentRepository, SqlitePolicyRepository,
    SqliteProfessionalRepository, SqliteReservationRepository,
};
pub use email::HttpEmailSender;
pub use errors::InfraError;
pub use notify::{ChangeFeed, ChangeListener};
