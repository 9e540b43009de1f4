//! Change-triggered notifier - core business logic
//!
//! Reacts to appointment creation/update events published by the store.
//! Every document write re-enters this handler, including the notifier's
//! own patch writes, so the update path is double-guarded:
//!
//! 1. Semantic diff: an update whose before/after views are equal once the
//!    notifier-owned bookkeeping is stripped is the notifier's own
//!    write-back and is skipped.
//! 2. Safety-net counter: `emailUpdateCount` rides in the same patch as the
//!    status transitions; at the ceiling the handler halts unconditionally,
//!    whatever the diff guard concluded.
//!
//! The handler has no caller: failures are recorded in the patch and
//! logged, never propagated.

use std::sync::Arc;

use slotbook_domain::constants::{EMAIL_UPDATE_CEILING, WELCOME_EMAIL_ATTEMPT_CEILING};
use slotbook_domain::{Appointment, AppointmentChange, ChannelStatus, NotificationPatch};
use tracing::{debug, info, warn};

use super::ports::{EmailSender, NotificationPatchStore, ProfessionalDirectory};
use super::templates;

/// Change-triggered notifier
pub struct NotifierService {
    sender: Arc<dyn EmailSender>,
    patches: Arc<dyn NotificationPatchStore>,
    professionals: Arc<dyn ProfessionalDirectory>,
}

impl NotifierService {
    /// Create a new notifier
    pub fn new(
        sender: Arc<dyn EmailSender>,
        patches: Arc<dyn NotificationPatchStore>,
        professionals: Arc<dyn ProfessionalDirectory>,
    ) -> Self {
        Self { sender, patches, professionals }
    }

    /// Entry point for one observed document write.
    pub async fn handle_change(&self, change: &AppointmentChange) {
        let patch = match &change.before {
            None => self.handle_created(&change.after).await,
            Some(before) => self.handle_updated(before, &change.after).await,
        };

        let Some(patch) = patch else { return };
        if patch.is_empty() {
            return;
        }

        // One accumulated write per handled event; its re-trigger is caught
        // by the guards above.
        if let Err(err) = self.patches.apply_notification_patch(&change.after.id, &patch).await {
            warn!(
                appointment_id = %change.after.id,
                error = %err,
                "failed to persist notification state"
            );
        }
    }

    /// Creation: confirmation to the client, heads-up to the professional.
    /// Both channels independent, best-effort, at most once each.
    async fn handle_created(&self, appointment: &Appointment) -> Option<NotificationPatch> {
        let state = &appointment.notification;

        if state.confirmation_email_status.is_sent()
            && state.professional_notification_status.is_sent()
        {
            debug!(appointment_id = %appointment.id, "creation already fully notified, skipping");
            return None;
        }

        if state.welcome_email_attempt_count >= WELCOME_EMAIL_ATTEMPT_CEILING {
            warn!(
                appointment_id = %appointment.id,
                attempts = state.welcome_email_attempt_count,
                "welcome attempt ceiling reached, halting"
            );
            return None;
        }

        let mut patch = NotificationPatch {
            welcome_email_attempt_count: Some(state.welcome_email_attempt_count + 1),
            ..NotificationPatch::default()
        };

        if !state.confirmation_email_status.is_terminal() {
            patch.confirmation_email_status = Some(self.send_client_confirmation(appointment).await);
        }

        if !state.professional_notification_status.is_terminal() {
            patch.professional_notification_status =
                Some(self.send_professional_notification(appointment).await);
        }

        Some(patch)
    }

    /// Update: guarded against the notifier's own write-backs, then the
    /// client update email is attempted when not already sent.
    async fn handle_updated(
        &self,
        before: &Appointment,
        after: &Appointment,
    ) -> Option<NotificationPatch> {
        if before.semantic_view() == after.semantic_view() {
            debug!(appointment_id = %after.id, "no semantic change, own write-back skipped");
            return None;
        }

        let state = &after.notification;
        if state.email_update_count >= EMAIL_UPDATE_CEILING {
            warn!(
                appointment_id = %after.id,
                count = state.email_update_count,
                "update notification ceiling reached, halting"
            );
            return None;
        }

        let mut patch = NotificationPatch {
            email_update_count: Some(state.email_update_count + 1),
            ..NotificationPatch::default()
        };

        if !state.update_email_status.is_sent() {
            patch.update_email_status = Some(self.send_client_update(after).await);
        }

        Some(patch)
    }

    async fn send_client_confirmation(&self, appointment: &Appointment) -> ChannelStatus {
        let Some(email) = appointment.client_email.as_deref() else {
            return ChannelStatus::Skipped("no client email".into());
        };

        let rendered = templates::confirmation_email(appointment);
        match self
            .sender
            .send(email, &appointment.client_name, &rendered.subject, &rendered.html)
            .await
        {
            Ok(message_id) => {
                info!(appointment_id = %appointment.id, message_id = %message_id, "confirmation email sent");
                ChannelStatus::Sent
            }
            Err(err) => {
                warn!(appointment_id = %appointment.id, error = %err, "confirmation email failed");
                ChannelStatus::Error(err.to_string())
            }
        }
    }

    async fn send_professional_notification(&self, appointment: &Appointment) -> ChannelStatus {
        let contact = match self.professionals.contact_for(&appointment.professional_id).await {
            Ok(Some(contact)) => contact,
            Ok(None) => return ChannelStatus::Skipped("professional contact missing".into()),
            Err(err) => {
                warn!(
                    appointment_id = %appointment.id,
                    error = %err,
                    "professional contact lookup failed"
                );
                return ChannelStatus::Error(err.to_string());
            }
        };

        let rendered = templates::professional_notification(appointment);
        match self.sender.send(&contact.email, &contact.name, &rendered.subject, &rendered.html).await
        {
            Ok(message_id) => {
                info!(appointment_id = %appointment.id, message_id = %message_id, "professional notified");
                ChannelStatus::Sent
            }
            Err(err) => {
                warn!(appointment_id = %appointment.id, error = %err, "professional notification failed");
                ChannelStatus::Error(err.to_string())
            }
        }
    }

    async fn send_client_update(&self, appointment: &Appointment) -> ChannelStatus {
        let Some(email) = appointment.client_email.as_deref() else {
            return ChannelStatus::Skipped("no client email".into());
        };

        let rendered = templates::update_email(appointment);
        match self
            .sender
            .send(email, &appointment.client_name, &rendered.subject, &rendered.html)
            .await
        {
            Ok(message_id) => {
                info!(appointment_id = %appointment.id, message_id = %message_id, "update email sent");
                ChannelStatus::Sent
            }
            Err(err) => {
                warn!(appointment_id = %appointment.id, error = %err, "update email failed");
                ChannelStatus::Error(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use slotbook_domain::{AppointmentStatus, NotificationState, Result, SlotbookError};

    use super::super::ports::Contact;
    use super::*;

    #[derive(Default)]
    struct MockSender {
        sent: Mutex<Vec<(String, String)>>, // (to, subject)
        fail: bool,
    }

    impl MockSender {
        fn failing() -> Self {
            Self { sent: Mutex::new(Vec::new()), fail: true }
        }

        fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EmailSender for MockSender {
        async fn send(
            &self,
            to_email: &str,
            _to_name: &str,
            subject: &str,
            _html: &str,
        ) -> Result<String> {
            if self.fail {
                return Err(SlotbookError::Transport("connection refused".into()));
            }
            self.sent.lock().unwrap().push((to_email.to_string(), subject.to_string()));
            Ok("msg-1".into())
        }
    }

    #[derive(Default)]
    struct MockPatchStore {
        patches: Mutex<Vec<(String, NotificationPatch)>>,
        applied: AtomicUsize,
    }

    impl MockPatchStore {
        fn patches(&self) -> Vec<(String, NotificationPatch)> {
            self.patches.lock().unwrap().clone()
        }

        fn applied(&self) -> usize {
            self.applied.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl NotificationPatchStore for MockPatchStore {
        async fn apply_notification_patch(
            &self,
            appointment_id: &str,
            patch: &NotificationPatch,
        ) -> Result<()> {
            self.applied.fetch_add(1, Ordering::SeqCst);
            self.patches.lock().unwrap().push((appointment_id.to_string(), patch.clone()));
            Ok(())
        }
    }

    struct MockDirectory {
        contact: Option<Contact>,
    }

    #[async_trait]
    impl ProfessionalDirectory for MockDirectory {
        async fn contact_for(&self, _professional_id: &str) -> Result<Option<Contact>> {
            Ok(self.contact.clone())
        }
    }

    fn appointment() -> Appointment {
        Appointment {
            id: "appt-1".into(),
            professional_id: "prof-1".into(),
            client_name: "Ana".into(),
            client_email: Some("ana@example.com".into()),
            service: "Consultation".into(),
            date_time: Utc.with_ymd_and_hms(2025, 6, 2, 14, 0, 0).single().unwrap(),
            duration_minutes: 50,
            status: AppointmentStatus::Confirmed,
            payment_status: Some("paid".into()),
            notification: NotificationState::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn notifier(
        sender: Arc<MockSender>,
        patches: Arc<MockPatchStore>,
        contact: Option<Contact>,
    ) -> NotifierService {
        NotifierService::new(sender, patches, Arc::new(MockDirectory { contact }))
    }

    fn professional_contact() -> Option<Contact> {
        Some(Contact { name: "Dr. Bruno".into(), email: "bruno@example.com".into() })
    }

    #[tokio::test]
    async fn creation_notifies_both_channels_in_one_patch() {
        let sender = Arc::new(MockSender::default());
        let patches = Arc::new(MockPatchStore::default());
        let svc = notifier(Arc::clone(&sender), Arc::clone(&patches), professional_contact());

        svc.handle_change(&AppointmentChange { before: None, after: appointment() }).await;

        let sent = sender.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, "ana@example.com");
        assert_eq!(sent[1].0, "bruno@example.com");

        let recorded = patches.patches();
        assert_eq!(recorded.len(), 1, "exactly one accumulated write");
        let patch = &recorded[0].1;
        assert_eq!(patch.confirmation_email_status, Some(ChannelStatus::Sent));
        assert_eq!(patch.professional_notification_status, Some(ChannelStatus::Sent));
        assert_eq!(patch.welcome_email_attempt_count, Some(1));
    }

    #[tokio::test]
    async fn creation_already_notified_is_skipped() {
        let sender = Arc::new(MockSender::default());
        let patches = Arc::new(MockPatchStore::default());
        let svc = notifier(Arc::clone(&sender), Arc::clone(&patches), professional_contact());

        let mut after = appointment();
        after.notification.confirmation_email_status = ChannelStatus::Sent;
        after.notification.professional_notification_status = ChannelStatus::Sent;

        svc.handle_change(&AppointmentChange { before: None, after }).await;

        assert!(sender.sent().is_empty());
        assert_eq!(patches.applied(), 0);
    }

    #[tokio::test]
    async fn missing_client_email_is_skipped_not_failed() {
        let sender = Arc::new(MockSender::default());
        let patches = Arc::new(MockPatchStore::default());
        let svc = notifier(Arc::clone(&sender), Arc::clone(&patches), professional_contact());

        let mut after = appointment();
        after.client_email = None;

        svc.handle_change(&AppointmentChange { before: None, after }).await;

        // Only the professional is notified; the client channel records why.
        assert_eq!(sender.sent().len(), 1);
        let patch = &patches.patches()[0].1;
        assert!(matches!(
            patch.confirmation_email_status,
            Some(ChannelStatus::Skipped(ref reason)) if reason.contains("email")
        ));
        assert_eq!(patch.professional_notification_status, Some(ChannelStatus::Sent));
    }

    #[tokio::test]
    async fn send_failure_is_recorded_per_channel_and_not_propagated() {
        let sender = Arc::new(MockSender::failing());
        let patches = Arc::new(MockPatchStore::default());
        let svc = notifier(Arc::clone(&sender), Arc::clone(&patches), professional_contact());

        svc.handle_change(&AppointmentChange { before: None, after: appointment() }).await;

        let patch = &patches.patches()[0].1;
        assert!(matches!(patch.confirmation_email_status, Some(ChannelStatus::Error(_))));
        assert!(matches!(patch.professional_notification_status, Some(ChannelStatus::Error(_))));
        // Attempt counter advanced so a persistently failing entity
        // eventually halts.
        assert_eq!(patch.welcome_email_attempt_count, Some(1));
    }

    #[tokio::test]
    async fn own_write_back_does_not_resend() {
        let sender = Arc::new(MockSender::default());
        let patches = Arc::new(MockPatchStore::default());
        let svc = notifier(Arc::clone(&sender), Arc::clone(&patches), professional_contact());

        // Simulate the notifier's own write: only bookkeeping changed.
        let before = appointment();
        let mut after = before.clone();
        after.notification.update_email_status = ChannelStatus::Sent;
        after.notification.email_update_count = 1;
        after.updated_at = after.updated_at + Duration::seconds(2);

        svc.handle_change(&AppointmentChange { before: Some(before), after }).await;

        assert!(sender.sent().is_empty());
        assert_eq!(patches.applied(), 0);
    }

    #[tokio::test]
    async fn semantic_change_sends_update_email() {
        let sender = Arc::new(MockSender::default());
        let patches = Arc::new(MockPatchStore::default());
        let svc = notifier(Arc::clone(&sender), Arc::clone(&patches), professional_contact());

        let before = appointment();
        let mut after = before.clone();
        after.date_time = after.date_time + Duration::hours(2);

        svc.handle_change(&AppointmentChange { before: Some(before), after }).await;

        let sent = sender.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("updated"));

        let patch = &patches.patches()[0].1;
        assert_eq!(patch.update_email_status, Some(ChannelStatus::Sent));
        assert_eq!(patch.email_update_count, Some(1));
    }

    #[tokio::test]
    async fn counter_ceiling_halts_even_with_semantic_change() {
        let sender = Arc::new(MockSender::default());
        let patches = Arc::new(MockPatchStore::default());
        let svc = notifier(Arc::clone(&sender), Arc::clone(&patches), professional_contact());

        let before = appointment();
        let mut after = before.clone();
        after.date_time = after.date_time + Duration::hours(2);
        after.notification.email_update_count = EMAIL_UPDATE_CEILING;

        svc.handle_change(&AppointmentChange { before: Some(before), after }).await;

        assert!(sender.sent().is_empty());
        assert_eq!(patches.applied(), 0);
    }

    #[tokio::test]
    async fn already_sent_update_channel_still_counts_the_execution() {
        let sender = Arc::new(MockSender::default());
        let patches = Arc::new(MockPatchStore::default());
        let svc = notifier(Arc::clone(&sender), Arc::clone(&patches), professional_contact());

        let before = appointment();
        let mut after = before.clone();
        after.status = AppointmentStatus::Canceled;
        after.notification.update_email_status = ChannelStatus::Sent;
        after.notification.email_update_count = 2;

        svc.handle_change(&AppointmentChange { before: Some(before), after }).await;

        assert!(sender.sent().is_empty());
        let patch = &patches.patches()[0].1;
        assert_eq!(patch.update_email_status, None);
        assert_eq!(patch.email_update_count, Some(3));
    }
}
