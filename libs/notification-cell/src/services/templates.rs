use crate::models::{NotificationKind, RenderedMessage, TemplateData};

const SIGNATURE: &str = "Scheduling Team";

/// Renders subject, HTML and plain-text bodies for one notification kind.
pub fn render(kind: NotificationKind, data: &TemplateData) -> RenderedMessage {
    let (subject, heading, intro, accent) = match kind {
        NotificationKind::AppointmentConfirmation => (
            format!("Appointment Confirmed - {}", data.counterpart_name),
            "Appointment Confirmed",
            "Your appointment has been successfully booked. Here are the details:".to_string(),
            "#2563eb",
        ),
        NotificationKind::AppointmentCancellation => (
            format!("Appointment Cancelled - {}", data.counterpart_name),
            "Appointment Cancelled",
            match &data.cancelled_by {
                Some(who) => format!("Your appointment has been cancelled by the {}.", who),
                None => "Your appointment has been cancelled.".to_string(),
            },
            "#dc2626",
        ),
        NotificationKind::AppointmentReminder => (
            format!("Reminder: Appointment Tomorrow - {}", data.counterpart_name),
            "Appointment Reminder",
            "This is a friendly reminder about your upcoming appointment:".to_string(),
            "#f59e0b",
        ),
        NotificationKind::ProviderAlert => (
            format!("New Appointment Booked - {}", data.counterpart_name),
            "New Appointment",
            format!("{} has booked one of your slots:", data.counterpart_name),
            "#059669",
        ),
    };

    let date = data.date.format("%A, %B %-d, %Y").to_string();
    let time = format!(
        "{} - {}",
        data.start_time.format("%H:%M"),
        data.end_time.format("%H:%M")
    );
    let mode = meeting_mode_label(&data.meeting_mode);

    let mut details = vec![
        ("With", data.counterpart_name.clone()),
        ("Date", date),
        ("Time", time),
        ("Mode", mode.to_string()),
    ];
    if let Some(notes) = data.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        details.push(("Notes", notes.to_string()));
    }

    let html_rows: String = details
        .iter()
        .map(|(label, value)| format!("<p><strong>{}:</strong> {}</p>", label, escape_html(value)))
        .collect();
    let text_rows: String = details
        .iter()
        .map(|(label, value)| format!("{}: {}\n", label, value))
        .collect();

    let html = format!(
        concat!(
            "<div style=\"font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;\">",
            "<h2 style=\"color: {accent};\">{heading}</h2>",
            "<p>Dear {name},</p>",
            "<p>{intro}</p>",
            "<div style=\"background-color: #f3f4f6; padding: 20px; border-radius: 8px;\">{rows}</div>",
            "<p>Best regards,<br>{signature}</p>",
            "</div>"
        ),
        accent = accent,
        heading = heading,
        name = escape_html(&data.recipient_name),
        intro = escape_html(&intro),
        rows = html_rows,
        signature = SIGNATURE,
    );

    let text = format!(
        "{heading}\n\nDear {name},\n\n{intro}\n\n{rows}\nBest regards,\n{signature}\n",
        heading = heading,
        name = data.recipient_name,
        intro = intro,
        rows = text_rows,
        signature = SIGNATURE,
    );

    RenderedMessage { subject, html, text }
}

fn meeting_mode_label(mode: &str) -> &str {
    match mode {
        "online" => "Online",
        "face_to_face" => "Face to face",
        other => other,
    }
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn data() -> TemplateData {
        TemplateData {
            recipient_name: "Ada".to_string(),
            counterpart_name: "Dr. Grace".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            meeting_mode: "online".to_string(),
            notes: Some("<bring notes>".to_string()),
            cancelled_by: None,
        }
    }

    #[test]
    fn test_confirmation_contains_details() {
        let message = render(NotificationKind::AppointmentConfirmation, &data());

        assert_eq!(message.subject, "Appointment Confirmed - Dr. Grace");
        assert!(message.text.contains("Date: Monday, January 1, 2024"));
        assert!(message.text.contains("Time: 09:00 - 09:30"));
        assert!(message.text.contains("Mode: Online"));
        assert!(message.html.contains("&lt;bring notes&gt;"));
    }

    #[test]
    fn test_cancellation_names_who_cancelled() {
        let mut data = data();
        data.cancelled_by = Some("provider".to_string());

        let message = render(NotificationKind::AppointmentCancellation, &data);
        assert!(message.text.contains("cancelled by the provider"));
    }
}
