//! Reservation holds: provisional, time-bounded claims on a slot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::window::TimeWindow;

/// A temporary hold on a time window, pending payment confirmation.
///
/// Created by the reservation manager; mutated only by the finalizer
/// (`used = true`, `appointment_id` linked); never deleted explicitly —
/// expired unused holds are garbage-collected by a maintenance job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: String,
    pub professional_id: String,
    pub service_id: String,
    pub client_name: String,
    pub client_email: Option<String>,
    pub date_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub payment_gateway: Option<String>,
    pub payment_status: Option<String>,
    pub used: bool,
    pub expires_at: DateTime<Utc>,
    pub appointment_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    /// The unbuffered interval this hold claims.
    pub fn window(&self) -> TimeWindow {
        TimeWindow::from_start(self.date_time, self.duration_minutes)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// A live hold still blocks the slot: unused and not yet expired.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.used && !self.is_expired(now)
    }
}

/// Input to `create_reservation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldRequest {
    pub professional_id: String,
    pub service_id: String,
    pub date_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub client_name: String,
    pub client_email: Option<String>,
    pub payment_gateway: Option<String>,
}

impl HoldRequest {
    /// The unbuffered interval the request asks for.
    pub fn window(&self) -> TimeWindow {
        TimeWindow::from_start(self.date_time, self.duration_minutes)
    }
}

/// Returned to the caller on a successful hold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldReceipt {
    pub reservation_id: String,
    pub expires_at: DateTime<Utc>,
}
