//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

/// Payment-status spellings treated as a paid state.
///
/// The upstream gateways report "paid" with several literal spellings; the
/// set is matched verbatim, never canonicalised. An unseen spelling does not
/// confirm the appointment.
pub const PAID_STATUS_SYNONYMS: &[&str] = &["paid", "Paid", "Pago"];

/// Hard ceiling for update-notification executions per appointment.
pub const EMAIL_UPDATE_CEILING: u32 = 10;
/// Hard ceiling for confirmation-email attempts per appointment.
pub const WELCOME_EMAIL_ATTEMPT_CEILING: u32 = 10;

/// Default minutes a reservation hold stays valid.
pub const DEFAULT_HOLD_MINUTES: i64 = 30;
/// Age after which a stale reminder `sending` lease may be reclaimed.
pub const DEFAULT_REMINDER_LEASE_TTL_MINUTES: i64 = 10;

// Rate limiter defaults
pub const DEFAULT_RATE_WINDOW_SECS: u64 = 60;
pub const DEFAULT_RATE_MAX_REQUESTS: u64 = 100;

/// Plan tiers treat this limit value as "unlimited".
pub const QUOTA_UNLIMITED: i64 = -1;
