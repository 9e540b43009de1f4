//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Slotbook
///
/// The variants mirror the operation contract: synchronous booking calls
/// surface the precise kind to the caller, asynchronous components record
/// failures in document fields instead of propagating them.
#[derive(Error, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum SlotbookError {
    /// Caller mistake; not retried.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Stale, expired, or already-consumed state; caller must re-request.
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// Lost a race for the slot; caller retries with a new slot choice.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Quota, rate, or day-cap exceeded; caller backs off.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Email delivery failure; recorded, never surfaced to end users.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Slotbook operations
pub type Result<T> = std::result::Result<T, SlotbookError>;
