//! Rows as the JSON API exposes them: camelCase fields, ids under `_id`,
//! password hashes never included.

use campus_common::form::FormField;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::Row as _;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Club {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub email: String,
    pub logo: String,
    pub members_count: i32,
    pub is_approved: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl Club {
    pub const COLUMNS: &'static str =
        "id, name, description, email, logo, members_count, is_approved, is_verified, created_at";

    pub fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            email: row.try_get("email")?,
            logo: row.try_get("logo")?,
            members_count: row.try_get("members_count")?,
            is_approved: row.try_get("is_approved")?,
            is_verified: row.try_get("is_verified")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub sapid: i64,
    pub department: String,
    pub division: String,
    pub rollno: String,
    pub year: i16,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl Student {
    pub const COLUMNS: &'static str =
        "id, name, email, sapid, department, division, rollno, year, is_verified, created_at";

    pub fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            sapid: row.try_get("sapid")?,
            department: row.try_get("department")?,
            division: row.try_get("division")?,
            rollno: row.try_get("rollno")?,
            year: row.try_get("year")?,
            is_verified: row.try_get("is_verified")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Public view of the club that organizes an event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Organizer {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub members_count: i32,
    pub logo: String,
    pub is_verified: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "_id")]
    pub id: Uuid,
    /// `None` when the organizer is hidden from this listing.
    pub organizer: Option<Organizer>,
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    pub location: String,
    pub poster: String,
    pub registration_form: Vec<FormField>,
    pub created_at: DateTime<Utc>,
}

/// Event columns plus the organizer's, which are NULL when the join filters
/// the organizer out. `$join_filter` extends the organizer join condition.
macro_rules! event_select {
    ($join_filter:literal) => {
        concat!(
            "SELECT e.id, e.title, e.description, e.date, e.location, \
             e.poster, e.registration_form, e.created_at, \
             c.id AS club_id, c.name AS club_name, c.email AS club_email, \
             c.members_count AS club_members_count, c.logo AS club_logo, \
             c.is_verified AS club_is_verified \
             FROM events e LEFT JOIN clubs c ON c.id = e.organizer_id",
            $join_filter
        )
    };
}

/// Events joined with their organizing club.
pub const EVENT_SELECT: &str = event_select!("");

/// Like [`EVENT_SELECT`], but the organizer columns are null unless the club
/// has verified its email. The event row itself is always returned.
pub const PUBLIC_EVENT_SELECT: &str = event_select!(" AND c.is_verified");

impl Event {
    pub fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let club_id: Option<Uuid> = row.try_get("club_id")?;
        let organizer = match club_id {
            Some(id) => Some(Organizer {
                id,
                name: row.try_get("club_name")?,
                email: row.try_get("club_email")?,
                members_count: row.try_get("club_members_count")?,
                logo: row.try_get("club_logo")?,
                is_verified: row.try_get("club_is_verified")?,
            }),
            None => None,
        };
        let Json(registration_form): Json<Vec<FormField>> = row.try_get("registration_form")?;
        Ok(Self {
            id: row.try_get("id")?,
            organizer,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            date: row.try_get("date")?,
            location: row.try_get("location")?,
            poster: row.try_get("poster")?,
            registration_form,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Registrant {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub rollno: String,
}

/// A registration as the organizing club sees it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub event: Uuid,
    pub registrant: Registrant,
    pub responses: serde_json::Value,
    pub registered_at: DateTime<Utc>,
}

impl Registration {
    pub fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            event: row.try_get("event_id")?,
            registrant: Registrant {
                id: row.try_get("registrant_id")?,
                name: row.try_get("name")?,
                email: row.try_get("email")?,
                rollno: row.try_get("rollno")?,
            },
            responses: row.try_get("responses")?,
            registered_at: row.try_get("registered_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EventSummary {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    pub date: DateTime<Utc>,
    pub location: String,
    pub poster: String,
}

/// A registration as the registered student sees it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRegistration {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub event: EventSummary,
    pub responses: serde_json::Value,
    pub registered_at: DateTime<Utc>,
}

impl StudentRegistration {
    pub fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            event: EventSummary {
                id: row.try_get("event_id")?,
                title: row.try_get("title")?,
                date: row.try_get("date")?,
                location: row.try_get("location")?,
                poster: row.try_get("poster")?,
            },
            responses: row.try_get("responses")?,
            registered_at: row.try_get("registered_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn public_listing_filters_the_organizer_join_only() {
        assert!(PUBLIC_EVENT_SELECT.starts_with(EVENT_SELECT));
        assert!(PUBLIC_EVENT_SELECT.ends_with("LEFT JOIN clubs c ON c.id = e.organizer_id AND c.is_verified"));
        assert!(!PUBLIC_EVENT_SELECT.contains("WHERE"));
    }

    #[test]
    fn club_json_uses_api_field_names() {
        let club = Club {
            id: Uuid::nil(),
            name: "Chess".to_string(),
            description: "Knights and bishops".to_string(),
            email: "chess@college.edu".to_string(),
            logo: "https://example.com/default-logo.png".to_string(),
            members_count: 12,
            is_approved: false,
            is_verified: true,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&club).unwrap();
        assert_eq!(json["_id"], Uuid::nil().to_string());
        assert_eq!(json["membersCount"], 12);
        assert_eq!(json["isApproved"], false);
        assert_eq!(json["isVerified"], true);
        assert!(json.get("password").is_none());
        assert!(json.get("passwordHash").is_none());
    }

    #[test]
    fn hidden_organizer_serializes_as_null() {
        let event = Event {
            id: Uuid::nil(),
            organizer: None,
            title: "Open mic".to_string(),
            description: "Bring a song".to_string(),
            date: Utc::now(),
            location: "Amphitheatre".to_string(),
            poster: "https://example.com/default-poster.png".to_string(),
            registration_form: Vec::new(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert!(json["organizer"].is_null());
        assert_eq!(json["registrationForm"], serde_json::json!([]));
    }
}
