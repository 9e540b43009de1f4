//! End-to-end booking tests against the SQLite store.

mod support;

use std::sync::Arc;

use slotbook_core::booking::ports::{PolicyStore, ReservationStore};
use slotbook_core::ReservationService;
use slotbook_domain::{AppointmentStatus, SlotbookError};
use support::{appointment, hold_request, relaxed_policy, setup, slot};

fn booking_service(env: &support::TestEnv) -> ReservationService {
    ReservationService::new(
        Arc::clone(&env.reservations) as Arc<dyn ReservationStore>,
        Arc::clone(&env.policies) as Arc<dyn PolicyStore>,
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn buffered_overlap_is_rejected() {
    let env = setup();
    env.policies.upsert_policy("prof-1", &relaxed_policy(10, 12)).await.unwrap();

    // Existing 14:00-14:50 with 10/10 buffers occupies 13:50-15:00.
    env.appointments.insert(&appointment("appt-1", "prof-1", slot(14, 0))).await.unwrap();

    let svc = booking_service(&env);
    let err = svc.create_reservation(&hold_request("prof-1", slot(14, 55))).await.unwrap_err();
    assert!(matches!(err, SlotbookError::Conflict(msg) if msg.contains("booked")));

    // Outside the buffered interval the slot is free.
    svc.create_reservation(&hold_request("prof-1", slot(15, 10))).await.expect("free slot");
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_holds_for_the_same_slot_yield_one_winner() {
    let env = setup();
    env.policies.upsert_policy("prof-1", &relaxed_policy(0, 12)).await.unwrap();
    let svc = Arc::new(booking_service(&env));

    let first_req = hold_request("prof-1", slot(10, 0));
    let second_req = hold_request("prof-1", slot(10, 30));
    let first = svc.create_reservation(&first_req);
    let second = svc.create_reservation(&second_req);

    // The requests overlap (10:00-10:50 vs 10:30-11:20); at most one may
    // commit.
    let (a, b) = tokio::join!(first, second);
    let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(successes, 1, "exactly one concurrent hold wins");

    let loser = if a.is_ok() { b } else { a };
    assert!(matches!(loser.unwrap_err(), SlotbookError::Conflict(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn expired_hold_cannot_be_finalized() {
    let env = setup();
    let mut policy = relaxed_policy(0, 12);
    policy.reservation_hold_minutes = 0; // expires immediately
    env.policies.upsert_policy("prof-1", &policy).await.unwrap();

    let svc = booking_service(&env);
    let receipt = svc.create_reservation(&hold_request("prof-1", slot(10, 0))).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(1500)).await;

    let err = svc
        .finalize_reservation("prof-1", &receipt.reservation_id, Some("paid"))
        .await
        .unwrap_err();
    assert!(matches!(err, SlotbookError::PreconditionFailed(msg) if msg.contains("expired")));
}

#[tokio::test(flavor = "multi_thread")]
async fn finalize_consumes_the_hold_exactly_once() {
    let env = setup();
    env.policies.upsert_policy("prof-1", &relaxed_policy(0, 12)).await.unwrap();
    let svc = booking_service(&env);

    let receipt = svc.create_reservation(&hold_request("prof-1", slot(10, 0))).await.unwrap();
    let appointment = svc
        .finalize_reservation("prof-1", &receipt.reservation_id, Some("paid"))
        .await
        .expect("first finalize succeeds");
    assert_eq!(appointment.status, AppointmentStatus::Confirmed);

    let hold = env.reservations.find_hold(&receipt.reservation_id).await.unwrap().unwrap();
    assert!(hold.used);
    assert_eq!(hold.appointment_id.as_deref(), Some(appointment.id.as_str()));

    let err = svc
        .finalize_reservation("prof-1", &receipt.reservation_id, Some("paid"))
        .await
        .unwrap_err();
    assert!(matches!(err, SlotbookError::PreconditionFailed(msg) if msg.contains("used")));
}

#[tokio::test(flavor = "multi_thread")]
async fn unpaid_finalization_schedules_instead_of_confirming() {
    let env = setup();
    env.policies.upsert_policy("prof-1", &relaxed_policy(0, 12)).await.unwrap();
    let svc = booking_service(&env);

    let receipt = svc.create_reservation(&hold_request("prof-1", slot(10, 0))).await.unwrap();
    let appointment =
        svc.finalize_reservation("prof-1", &receipt.reservation_id, None).await.unwrap();
    assert_eq!(appointment.status, AppointmentStatus::Scheduled);

    // A recognised paid spelling confirms.
    let receipt = svc.create_reservation(&hold_request("prof-1", slot(16, 0))).await.unwrap();
    let appointment = svc
        .finalize_reservation("prof-1", &receipt.reservation_id, Some("Pago"))
        .await
        .unwrap();
    assert_eq!(appointment.status, AppointmentStatus::Confirmed);

    // An unknown spelling deliberately does not confirm.
    let receipt = svc.create_reservation(&hold_request("prof-1", slot(18, 0))).await.unwrap();
    let appointment = svc
        .finalize_reservation("prof-1", &receipt.reservation_id, Some("PAID"))
        .await
        .unwrap();
    assert_eq!(appointment.status, AppointmentStatus::Scheduled);
}

#[tokio::test(flavor = "multi_thread")]
async fn finalize_loses_to_an_appointment_that_appeared_meanwhile() {
    let env = setup();
    env.policies.upsert_policy("prof-1", &relaxed_policy(0, 12)).await.unwrap();
    let svc = booking_service(&env);

    let receipt = svc.create_reservation(&hold_request("prof-1", slot(10, 0))).await.unwrap();

    // An unguarded write occupies the slot between hold and finalize.
    env.appointments.insert(&appointment("squatter", "prof-1", slot(10, 0))).await.unwrap();

    let err = svc
        .finalize_reservation("prof-1", &receipt.reservation_id, Some("paid"))
        .await
        .unwrap_err();
    assert!(matches!(err, SlotbookError::Conflict(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn day_cap_rejects_the_next_free_slot() {
    let env = setup();
    env.policies.upsert_policy("prof-1", &relaxed_policy(0, 3)).await.unwrap();

    for (id, hour) in [("a", 9), ("b", 10), ("c", 11)] {
        env.appointments.insert(&appointment(id, "prof-1", slot(hour, 0))).await.unwrap();
    }

    let svc = booking_service(&env);
    // 15:00 is free, but the day already carries three active appointments.
    let err = svc.create_reservation(&hold_request("prof-1", slot(15, 0))).await.unwrap_err();
    assert!(matches!(err, SlotbookError::ResourceExhausted(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn canceled_appointments_free_their_day_cap_slot() {
    let env = setup();
    env.policies.upsert_policy("prof-1", &relaxed_policy(0, 3)).await.unwrap();

    for (id, hour) in [("a", 9), ("b", 10), ("c", 11)] {
        env.appointments.insert(&appointment(id, "prof-1", slot(hour, 0))).await.unwrap();
    }
    env.appointments.set_status("b", AppointmentStatus::Canceled).await.unwrap();

    let svc = booking_service(&env);
    svc.create_reservation(&hold_request("prof-1", slot(15, 0)))
        .await
        .expect("slot admitted after cancellation");
}

#[tokio::test(flavor = "multi_thread")]
async fn expired_holds_are_purged_by_maintenance() {
    let env = setup();
    let mut policy = relaxed_policy(0, 12);
    policy.reservation_hold_minutes = 0;
    env.policies.upsert_policy("prof-1", &policy).await.unwrap();

    let svc = booking_service(&env);
    svc.create_reservation(&hold_request("prof-1", slot(10, 0))).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(1500)).await;

    let purged = env.reservations.purge_expired_holds(chrono::Utc::now()).await.unwrap();
    assert_eq!(purged, 1);
}
