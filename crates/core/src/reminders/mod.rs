//! Periodic reminder sweeps over upcoming appointments.

pub mod ports;
pub mod service;

pub use service::{ReminderService, SweepSummary};
