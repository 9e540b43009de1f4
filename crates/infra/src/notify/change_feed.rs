//! Broadcast feed of appointment document writes.
//!
//! The in-process stand-in for store triggers: repositories publish a
//! `{before, after}` pair for every appointment write, including the
//! notifier's own patches. Subscribers that fall behind see a lag error and
//! miss events rather than blocking writers.

use slotbook_domain::AppointmentChange;
use tokio::sync::broadcast;
use tracing::debug;

const DEFAULT_CAPACITY: usize = 256;

/// Fan-out channel carrying appointment changes.
pub struct ChangeFeed {
    tx: broadcast::Sender<AppointmentChange>,
}

impl ChangeFeed {
    /// Create a feed with the default buffer capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a feed with a custom buffer capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish one document write.
    ///
    /// A send error only means no subscriber is currently attached; writes
    /// must never fail because nobody is listening.
    pub fn publish(&self, change: AppointmentChange) {
        let id = change.after.id.clone();
        let created = change.before.is_none();
        match self.tx.send(change) {
            Ok(receivers) => {
                debug!(appointment_id = %id, created, receivers, "appointment change published");
            }
            Err(_) => {
                debug!(appointment_id = %id, created, "appointment change dropped (no subscribers)");
            }
        }
    }

    /// Attach a new subscriber.
    pub fn subscribe(&self) -> broadcast::Receiver<AppointmentChange> {
        self.tx.subscribe()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
