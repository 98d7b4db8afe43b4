//! HTML bodies for the transactional emails the server sends.

use chrono::{DateTime, Utc};

use super::EmailMessage;

/// Escape text for inclusion in HTML element content or attribute values.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn otp_email(to: &str, name: &str, code: &str, ttl_minutes: u64) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        to_name: name.to_string(),
        subject: "Your verification code".to_string(),
        html: format!(
            "<p>Hello {},</p>\
             <p>Your verification code is <strong>{}</strong>.</p>\
             <p>It expires in {ttl_minutes} minutes. If you did not sign up, ignore this email.</p>",
            escape_html(name),
            escape_html(code),
        ),
    }
}

/// Sent to the administrator when a new club signs up and awaits approval.
pub fn admin_club_alert(admin_email: &str, club_name: &str, club_email: &str) -> EmailMessage {
    EmailMessage {
        to: admin_email.to_string(),
        to_name: "Administrator".to_string(),
        subject: format!("New club registration: {club_name}"),
        html: format!(
            "<p>A new club has registered and is waiting for approval.</p>\
             <ul><li>Name: {}</li><li>Email: {}</li></ul>",
            escape_html(club_name),
            escape_html(club_email),
        ),
    }
}

/// What students are told about a newly published event.
#[derive(Debug, Clone)]
pub struct EventNotice {
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    pub location: String,
    pub club_name: String,
}

pub fn event_notification(to: &str, student_name: &str, event: &EventNotice) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        to_name: student_name.to_string(),
        subject: format!("New event: {}", event.title),
        html: format!(
            "<p>Hello {},</p>\
             <p>{} has published a new event.</p>\
             <h2>{}</h2>\
             <p>{}</p>\
             <p><strong>When:</strong> {}<br><strong>Where:</strong> {}</p>",
            escape_html(student_name),
            escape_html(&event.club_name),
            escape_html(&event.title),
            escape_html(&event.description),
            event.date.format("%A, %d %B %Y %H:%M UTC"),
            escape_html(&event.location),
        ),
    }
}
