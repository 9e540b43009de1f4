//! Appointments and their notification bookkeeping.
//!
//! The notification fields keep the persisted names used by the historical
//! document store (`confirmationEmailStatus`, `reminder24hSent`, ...) so
//! existing documents remain readable.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::window::TimeWindow;

/// Lifecycle states of a confirmed booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Finished,
    Canceled,
    Problem,
}

impl AppointmentStatus {
    /// Canceled appointments release their slot; everything else blocks it.
    pub fn is_active(self) -> bool {
        !matches!(self, AppointmentStatus::Canceled)
    }

    /// Only upcoming, non-terminal appointments receive reminders.
    pub fn is_reminder_eligible(self) -> bool {
        matches!(self, AppointmentStatus::Scheduled | AppointmentStatus::Confirmed)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AppointmentStatus::Scheduled => "Scheduled",
            AppointmentStatus::Confirmed => "Confirmed",
            AppointmentStatus::Finished => "Finished",
            AppointmentStatus::Canceled => "Canceled",
            AppointmentStatus::Problem => "Problem",
        };
        f.write_str(s)
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Scheduled" => Ok(AppointmentStatus::Scheduled),
            "Confirmed" => Ok(AppointmentStatus::Confirmed),
            "Finished" => Ok(AppointmentStatus::Finished),
            "Canceled" => Ok(AppointmentStatus::Canceled),
            "Problem" => Ok(AppointmentStatus::Problem),
            other => Err(format!("unknown appointment status: {other}")),
        }
    }
}

/// Terminal-once state of a single notification channel-event pair.
///
/// Transitions `Unset -> {Sent | Error | Skipped}` at most once per logical
/// event; the notifier checks this directly instead of diffing documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChannelStatus {
    Unset,
    Sent,
    Error(String),
    Skipped(String),
}

impl ChannelStatus {
    pub fn is_sent(&self) -> bool {
        matches!(self, ChannelStatus::Sent)
    }

    /// A terminal status is never overwritten by the notifier.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ChannelStatus::Unset)
    }
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelStatus::Unset => f.write_str("unset"),
            ChannelStatus::Sent => f.write_str("sent"),
            ChannelStatus::Error(msg) => write!(f, "error:{msg}"),
            ChannelStatus::Skipped(reason) => write!(f, "skipped:{reason}"),
        }
    }
}

impl From<ChannelStatus> for String {
    fn from(value: ChannelStatus) -> Self {
        value.to_string()
    }
}

impl From<String> for ChannelStatus {
    fn from(value: String) -> Self {
        value.as_str().into()
    }
}

impl Default for ChannelStatus {
    fn default() -> Self {
        ChannelStatus::Unset
    }
}

impl From<&str> for ChannelStatus {
    fn from(value: &str) -> Self {
        match value {
            "sent" => ChannelStatus::Sent,
            other => {
                if let Some(msg) = other.strip_prefix("error:") {
                    ChannelStatus::Error(msg.to_string())
                } else if let Some(reason) = other.strip_prefix("skipped:") {
                    ChannelStatus::Skipped(reason.to_string())
                } else {
                    ChannelStatus::Unset
                }
            }
        }
    }
}

/// The two reminder sweeps, distinguished by look-ahead window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReminderKind {
    TwentyFourHour,
    ThreeHour,
}

impl ReminderKind {
    pub const ALL: [ReminderKind; 2] = [ReminderKind::TwentyFourHour, ReminderKind::ThreeHour];

    pub fn label(self) -> &'static str {
        match self {
            ReminderKind::TwentyFourHour => "24h",
            ReminderKind::ThreeHour => "3h",
        }
    }
}

/// Notification bookkeeping embedded in every appointment document.
///
/// Serialized names are bit-exact for store compatibility.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationState {
    #[serde(rename = "confirmationEmailStatus", default)]
    pub confirmation_email_status: ChannelStatus,
    #[serde(rename = "professionalNotificationStatus", default)]
    pub professional_notification_status: ChannelStatus,
    #[serde(rename = "updateEmailStatus", default)]
    pub update_email_status: ChannelStatus,
    #[serde(rename = "welcomeEmailAttemptCount", default)]
    pub welcome_email_attempt_count: u32,
    #[serde(rename = "emailUpdateCount", default)]
    pub email_update_count: u32,
    #[serde(rename = "reminder24hSent", default)]
    pub reminder_24h_sent: bool,
    #[serde(rename = "reminder24hSending", default)]
    pub reminder_24h_sending: Option<DateTime<Utc>>,
    #[serde(rename = "reminder24hError", default)]
    pub reminder_24h_error: Option<String>,
    #[serde(rename = "reminder3hSent", default)]
    pub reminder_3h_sent: bool,
    #[serde(rename = "reminder3hSending", default)]
    pub reminder_3h_sending: Option<DateTime<Utc>>,
    #[serde(rename = "reminder3hError", default)]
    pub reminder_3h_error: Option<String>,
}

impl NotificationState {
    pub fn reminder_sent(&self, kind: ReminderKind) -> bool {
        match kind {
            ReminderKind::TwentyFourHour => self.reminder_24h_sent,
            ReminderKind::ThreeHour => self.reminder_3h_sent,
        }
    }

    /// Timestamp of a live `sending` lease, if one is held.
    pub fn reminder_sending_at(&self, kind: ReminderKind) -> Option<DateTime<Utc>> {
        match kind {
            ReminderKind::TwentyFourHour => self.reminder_24h_sending,
            ReminderKind::ThreeHour => self.reminder_3h_sending,
        }
    }
}

/// A confirmed booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub professional_id: String,
    pub client_name: String,
    pub client_email: Option<String>,
    pub service: String,
    pub date_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub status: AppointmentStatus,
    pub payment_status: Option<String>,
    #[serde(flatten)]
    pub notification: NotificationState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// The unbuffered interval this appointment occupies.
    pub fn window(&self) -> TimeWindow {
        TimeWindow::from_start(self.date_time, self.duration_minutes)
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Projection of the fields a recipient cares about.
    ///
    /// Notification bookkeeping and timestamps are deliberately absent: two
    /// appointments with equal views differ only by notifier-owned writes.
    pub fn semantic_view(&self) -> SemanticView<'_> {
        SemanticView {
            professional_id: &self.professional_id,
            client_name: &self.client_name,
            client_email: self.client_email.as_deref(),
            service: &self.service,
            date_time: self.date_time,
            duration_minutes: self.duration_minutes,
            status: self.status,
            payment_status: self.payment_status.as_deref(),
        }
    }
}

/// See [`Appointment::semantic_view`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemanticView<'a> {
    pub professional_id: &'a str,
    pub client_name: &'a str,
    pub client_email: Option<&'a str>,
    pub service: &'a str,
    pub date_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub status: AppointmentStatus,
    pub payment_status: Option<&'a str>,
}

/// The single accumulated write the notifier applies after handling an
/// event. `None` fields are left untouched by the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationPatch {
    pub confirmation_email_status: Option<ChannelStatus>,
    pub professional_notification_status: Option<ChannelStatus>,
    pub update_email_status: Option<ChannelStatus>,
    pub welcome_email_attempt_count: Option<u32>,
    pub email_update_count: Option<u32>,
}

impl NotificationPatch {
    pub fn is_empty(&self) -> bool {
        self.confirmation_email_status.is_none()
            && self.professional_notification_status.is_none()
            && self.update_email_status.is_none()
            && self.welcome_email_attempt_count.is_none()
            && self.email_update_count.is_none()
    }
}

/// A document write observed on the appointment collection.
///
/// `before` is `None` for creations. Every write is published, including
/// the notifier's own patches — the handlers must detect and skip those.
#[derive(Debug, Clone)]
pub struct AppointmentChange {
    pub before: Option<Appointment>,
    pub after: Appointment,
}
