//! Port interfaces for notifications
//!
//! These traits define the boundaries between core business logic
//! and infrastructure implementations.

use async_trait::async_trait;
use slotbook_domain::{NotificationPatch, Result};

/// Trait for delivering one email message
///
/// Transport mechanics (SMTP, HTTP API) live behind this boundary; the
/// notifier only consumes the result.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Deliver a message; returns the transport's message id.
    async fn send(&self, to_email: &str, to_name: &str, subject: &str, html: &str)
        -> Result<String>;
}

/// Trait for applying the notifier's single accumulated write
#[async_trait]
pub trait NotificationPatchStore: Send + Sync {
    /// Apply `patch` to the appointment document. `None` fields stay
    /// untouched. The write is published back to the change feed like any
    /// other document write.
    async fn apply_notification_patch(
        &self,
        appointment_id: &str,
        patch: &NotificationPatch,
    ) -> Result<()>;
}

/// Contact details for one notification recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub name: String,
    pub email: String,
}

/// Trait for resolving a professional's notification contact
#[async_trait]
pub trait ProfessionalDirectory: Send + Sync {
    /// Contact for `professional_id`, or `None` when the professional has
    /// no notification address configured.
    async fn contact_for(&self, professional_id: &str) -> Result<Option<Contact>>;
}
