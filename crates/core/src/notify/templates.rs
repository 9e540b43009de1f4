//! Minimal notification rendering.
//!
//! Template *content* is an external concern; these renderers produce the
//! subject/body pairs the send paths need without any templating engine.

use slotbook_domain::{Appointment, ReminderKind};

/// A rendered message ready for the email sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

fn format_when(appointment: &Appointment) -> String {
    appointment.date_time.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// Confirmation sent to the client when an appointment is created.
pub fn confirmation_email(appointment: &Appointment) -> RenderedEmail {
    RenderedEmail {
        subject: format!("Your {} appointment is booked", appointment.service),
        html: format!(
            "<p>Hi {},</p><p>Your <strong>{}</strong> appointment is booked for {}.</p>",
            appointment.client_name,
            appointment.service,
            format_when(appointment)
        ),
    }
}

/// Heads-up sent to the professional when an appointment is created.
pub fn professional_notification(appointment: &Appointment) -> RenderedEmail {
    RenderedEmail {
        subject: format!("New booking: {}", appointment.service),
        html: format!(
            "<p>{} booked <strong>{}</strong> for {}.</p>",
            appointment.client_name,
            appointment.service,
            format_when(appointment)
        ),
    }
}

/// Sent to the client when an appointment changes.
pub fn update_email(appointment: &Appointment) -> RenderedEmail {
    RenderedEmail {
        subject: format!("Your {} appointment was updated", appointment.service),
        html: format!(
            "<p>Hi {},</p><p>Your <strong>{}</strong> appointment is now {} on {}.</p>",
            appointment.client_name,
            appointment.service,
            appointment.status,
            format_when(appointment)
        ),
    }
}

/// Time-based reminder for an upcoming appointment.
pub fn reminder_email(kind: ReminderKind, appointment: &Appointment) -> RenderedEmail {
    let lead = match kind {
        ReminderKind::TwentyFourHour => "tomorrow",
        ReminderKind::ThreeHour => "in a few hours",
    };
    RenderedEmail {
        subject: format!("Reminder: {} {}", appointment.service, lead),
        html: format!(
            "<p>Hi {},</p><p>Reminder: your <strong>{}</strong> appointment is {} ({}).</p>",
            appointment.client_name,
            appointment.service,
            lead,
            format_when(appointment)
        ),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono::Utc;
    use slotbook_domain::{AppointmentStatus, NotificationState};

    use super::*;

    fn sample() -> Appointment {
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

    #[test]
    fn confirmation_mentions_service_and_time() {
        let rendered = confirmation_email(&sample());
        assert!(rendered.subject.contains("Consultation"));
        assert!(rendered.html.contains("2025-06-02 14:00 UTC"));
        assert!(rendered.html.contains("Ana"));
    }

    #[test]
    fn reminder_lead_matches_kind() {
        let day = reminder_email(ReminderKind::TwentyFourHour, &sample());
        assert!(day.subject.contains("tomorrow"));
        let soon = reminder_email(ReminderKind::ThreeHour, &sample());
        assert!(soon.subject.contains("in a few hours"));
    }
}
