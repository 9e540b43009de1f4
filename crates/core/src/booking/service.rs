//! Reservation manager and appointment finalizer - core business logic

use std::sync::Arc;

use chrono::Utc;
use slotbook_common::resilience::SlidingWindowLimiter;
use slotbook_domain::{Appointment, HoldReceipt, HoldRequest, Result, SlotbookError};
use tracing::info;

use super::conflict;
use super::ports::{PolicyStore, ReservationStore};

/// Booking service: creates holds and finalizes them into appointments
pub struct ReservationService {
    store: Arc<dyn ReservationStore>,
    policies: Arc<dyn PolicyStore>,
    limiter: Option<SlidingWindowLimiter>,
}

impl ReservationService {
    /// Create a new reservation service
    pub fn new(store: Arc<dyn ReservationStore>, policies: Arc<dyn PolicyStore>) -> Self {
        Self { store, policies, limiter: None }
    }

    /// Guard hold creation with a sliding-window rate limiter.
    ///
    /// Disabled by default so tests and trusted internal callers can opt
    /// out.
    pub fn with_rate_limiter(mut self, limiter: SlidingWindowLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Place a temporary hold on a slot.
    ///
    /// Validates the request and the minimum-notice precondition, then
    /// delegates the atomic read-check-write cycle to the store. On success
    /// the interval was provably free of conflicting bookings and live
    /// holds at commit time.
    pub async fn create_reservation(&self, request: &HoldRequest) -> Result<HoldReceipt> {
        if let Some(limiter) = &self.limiter {
            let actor = request
                .client_email
                .as_deref()
                .unwrap_or(request.client_name.as_str());
            limiter
                .check(actor, "create_reservation")
                .map_err(|err| SlotbookError::ResourceExhausted(err.to_string()))?;
        }

        validate_request(request)?;

        let policy = self.policies.policy_for(&request.professional_id).await?;
        conflict::check_min_notice(request.date_time, &policy, Utc::now())?;

        let reservation = self.store.create_hold(request, &policy).await?;

        info!(
            reservation_id = %reservation.id,
            professional_id = %reservation.professional_id,
            date_time = %reservation.date_time,
            expires_at = %reservation.expires_at,
            "reservation hold created"
        );

        Ok(HoldReceipt { reservation_id: reservation.id, expires_at: reservation.expires_at })
    }

    /// Convert a still-valid hold into a confirmed appointment.
    ///
    /// `payment_status` is the gateway-reported state; the stored hold
    /// status is consulted as a fallback inside the store transaction.
    pub async fn finalize_reservation(
        &self,
        professional_id: &str,
        reservation_id: &str,
        payment_status: Option<&str>,
    ) -> Result<Appointment> {
        if professional_id.is_empty() {
            return Err(SlotbookError::InvalidArgument("professional_id is required".into()));
        }
        if reservation_id.is_empty() {
            return Err(SlotbookError::InvalidArgument("reservation_id is required".into()));
        }

        let appointment =
            self.store.finalize_hold(professional_id, reservation_id, payment_status).await?;

        info!(
            appointment_id = %appointment.id,
            reservation_id = %reservation_id,
            status = %appointment.status,
            "reservation finalized"
        );

        Ok(appointment)
    }
}

fn validate_request(request: &HoldRequest) -> Result<()> {
    if request.professional_id.is_empty() {
        return Err(SlotbookError::InvalidArgument("professional_id is required".into()));
    }
    if request.service_id.is_empty() {
        return Err(SlotbookError::InvalidArgument("service_id is required".into()));
    }
    if request.client_name.is_empty() {
        return Err(SlotbookError::InvalidArgument("client_name is required".into()));
    }
    if request.duration_minutes <= 0 {
        return Err(SlotbookError::InvalidArgument("duration_minutes must be positive".into()));
    }
    Ok(())
}
