//! Cron-based schedulers with explicit lifecycle management.
//!
//! Join handles are tracked, cancellation is explicit, and every
//! asynchronous operation is wrapped in a timeout.

pub mod error;
pub mod maintenance_scheduler;
pub mod reminder_scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use maintenance_scheduler::{MaintenanceScheduler, MaintenanceSchedulerConfig};
pub use reminder_scheduler::{ReminderScheduler, ReminderSchedulerConfig};
