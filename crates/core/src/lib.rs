//! # Slotbook Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Booking rules and the reservation/finalization service
//! - The change-triggered notifier and its guards
//! - Reminder sweep logic
//! - Plan-based quota checks
//! - Port/adapter interfaces (traits)
//!
//! ## Architecture Principles
//! - Only depends on `slotbook-common` and `slotbook-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod booking;
pub mod notify;
pub mod quota;
pub mod reminders;

// Re-export specific items to avoid ambiguity
pub use booking::ports::{PolicyStore, ReservationStore};
pub use booking::ReservationService;
pub use notify::ports::{Contact, EmailSender, NotificationPatchStore, ProfessionalDirectory};
pub use notify::NotifierService;
pub use quota::ports::{PlanDirectory, UsageSource};
pub use quota::{QuotaLimits, QuotaService};
pub use reminders::ports::{LeaseOutcome, ReminderStore};
pub use reminders::{ReminderService, SweepSummary};
