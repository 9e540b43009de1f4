//! Reminder sweep tests against the SQLite store.
//!
//! Exercises the lease protocol with real transactions: overlapping sweeps,
//! stale-lease reclaim, and failure-then-retry bookkeeping.

mod support;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use slotbook_core::notify::ports::EmailSender;
use slotbook_core::reminders::ports::ReminderStore;
use slotbook_core::ReminderService;
use slotbook_domain::{ReminderConfig, ReminderKind, Result as DomainResult, SlotbookError};
use support::{appointment, setup};

/// Sender that counts deliveries; optionally slow or failing.
struct CountingSender {
    sent: AtomicUsize,
    delay: Option<StdDuration>,
    fail: AtomicBool,
}

impl CountingSender {
    fn new() -> Self {
        Self { sent: AtomicUsize::new(0), delay: None, fail: AtomicBool::new(false) }
    }

    fn slow(delay: StdDuration) -> Self {
        Self { sent: AtomicUsize::new(0), delay: Some(delay), fail: AtomicBool::new(false) }
    }

    fn failing() -> Self {
        Self { sent: AtomicUsize::new(0), delay: None, fail: AtomicBool::new(true) }
    }

    fn count(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmailSender for CountingSender {
    async fn send(
        &self,
        _to_email: &str,
        _to_name: &str,
        _subject: &str,
        _html: &str,
    ) -> DomainResult<String> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(SlotbookError::Transport("smtp unavailable".into()));
        }
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok("msg".into())
    }
}

fn reminder_service(env: &support::TestEnv, sender: Arc<CountingSender>) -> Arc<ReminderService> {
    Arc::new(ReminderService::new(
        Arc::clone(&env.appointments) as Arc<dyn ReminderStore>,
        sender,
        ReminderConfig::default(),
    ))
}

#[tokio::test(flavor = "multi_thread")]
async fn eligible_appointment_is_reminded_once() {
    let env = setup();
    let now = Utc::now();
    let appt = appointment("appt-1", "prof-1", now + Duration::minutes(23 * 60 + 30));
    env.appointments.insert(&appt).await.unwrap();

    let sender = Arc::new(CountingSender::new());
    let svc = reminder_service(&env, Arc::clone(&sender));

    let summary = svc.run_sweep_at(ReminderKind::TwentyFourHour, now).await.unwrap();
    assert_eq!(summary.sent, 1);
    assert_eq!(sender.count(), 1);

    let stored = env.appointments.get("appt-1").await.unwrap().unwrap();
    assert!(stored.notification.reminder_24h_sent);
    assert_eq!(stored.notification.reminder_24h_sending, None);

    // The next run sees the marker and skips.
    let summary = svc.run_sweep_at(ReminderKind::TwentyFourHour, now).await.unwrap();
    assert_eq!(summary.sent, 0);
    assert_eq!(summary.skipped, 1);
    assert_eq!(sender.count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn overlapping_sweeps_send_exactly_once() {
    let env = setup();
    let now = Utc::now();
    let appt = appointment("appt-1", "prof-1", now + Duration::minutes(23 * 60 + 30));
    env.appointments.insert(&appt).await.unwrap();

    // A slow transport keeps the first sweep inside its send long enough
    // for the second sweep to observe the live lease.
    let sender = Arc::new(CountingSender::slow(StdDuration::from_millis(300)));
    let svc = reminder_service(&env, Arc::clone(&sender));

    let (a, b) = tokio::join!(
        svc.run_sweep_at(ReminderKind::TwentyFourHour, now),
        svc.run_sweep_at(ReminderKind::TwentyFourHour, now),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.sent + b.sent, 1, "exactly one sweep sends");
    assert_eq!(a.skipped + b.skipped, 1, "the other observes the lease and skips");
    assert_eq!(sender.count(), 1);

    let stored = env.appointments.get("appt-1").await.unwrap().unwrap();
    assert!(stored.notification.reminder_24h_sent);
}

#[tokio::test(flavor = "multi_thread")]
async fn the_two_reminder_kinds_are_independent() {
    let env = setup();
    let now = Utc::now();
    // In both windows at once is impossible; use two appointments.
    let day_before = appointment("appt-24", "prof-1", now + Duration::minutes(23 * 60 + 30));
    let soon = appointment("appt-3", "prof-1", now + Duration::minutes(150));
    env.appointments.insert(&day_before).await.unwrap();
    env.appointments.insert(&soon).await.unwrap();

    let sender = Arc::new(CountingSender::new());
    let svc = reminder_service(&env, Arc::clone(&sender));

    let (day, hours) = tokio::join!(
        svc.run_sweep_at(ReminderKind::TwentyFourHour, now),
        svc.run_sweep_at(ReminderKind::ThreeHour, now),
    );
    assert_eq!(day.unwrap().sent, 1);
    assert_eq!(hours.unwrap().sent, 1);
    assert_eq!(sender.count(), 2);

    let stored = env.appointments.get("appt-24").await.unwrap().unwrap();
    assert!(stored.notification.reminder_24h_sent);
    assert!(!stored.notification.reminder_3h_sent);
}

#[tokio::test(flavor = "multi_thread")]
async fn abandoned_lease_is_reclaimed_after_ttl() {
    let env = setup();
    let now = Utc::now();
    let appt = appointment("appt-1", "prof-1", now + Duration::minutes(23 * 60 + 30));
    env.appointments.insert(&appt).await.unwrap();

    // A crashed sweep left a lease 30 minutes ago and never cleared it.
    let crash_time = now - Duration::minutes(30);
    env.appointments
        .acquire_reminder_lease("appt-1", ReminderKind::TwentyFourHour, crash_time, Duration::minutes(10))
        .await
        .unwrap();

    let sender = Arc::new(CountingSender::new());
    let svc = reminder_service(&env, Arc::clone(&sender));

    let summary = svc.run_sweep_at(ReminderKind::TwentyFourHour, now).await.unwrap();
    assert_eq!(summary.sent, 1, "stale lease must not block the reminder forever");
    assert_eq!(sender.count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_send_is_retried_on_the_next_run() {
    let env = setup();
    let now = Utc::now();
    let appt = appointment("appt-1", "prof-1", now + Duration::minutes(150));
    env.appointments.insert(&appt).await.unwrap();

    let sender = Arc::new(CountingSender::failing());
    let svc = reminder_service(&env, Arc::clone(&sender));

    let summary = svc.run_sweep_at(ReminderKind::ThreeHour, now).await.unwrap();
    assert_eq!(summary.failed, 1);

    let stored = env.appointments.get("appt-1").await.unwrap().unwrap();
    assert!(!stored.notification.reminder_3h_sent);
    assert_eq!(stored.notification.reminder_3h_sending, None, "lease released on failure");
    assert!(stored.notification.reminder_3h_error.as_deref().unwrap().contains("smtp"));

    // Transport recovers; the next scheduled run retries and succeeds.
    sender.fail.store(false, Ordering::SeqCst);
    let summary = svc.run_sweep_at(ReminderKind::ThreeHour, now).await.unwrap();
    assert_eq!(summary.sent, 1);

    let stored = env.appointments.get("appt-1").await.unwrap().unwrap();
    assert!(stored.notification.reminder_3h_sent);
    assert_eq!(stored.notification.reminder_3h_error, None);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_recipient_is_skipped() {
    let env = setup();
    let now = Utc::now();
    let mut appt = appointment("appt-1", "prof-1", now + Duration::minutes(150));
    appt.client_email = None;
    env.appointments.insert(&appt).await.unwrap();

    let sender = Arc::new(CountingSender::new());
    let svc = reminder_service(&env, Arc::clone(&sender));

    let summary = svc.run_sweep_at(ReminderKind::ThreeHour, now).await.unwrap();
    assert_eq!(summary.skipped, 1);
    assert_eq!(sender.count(), 0);
}
