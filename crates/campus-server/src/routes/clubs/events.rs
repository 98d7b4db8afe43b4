use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use campus_common::form::parse_form;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use sqlx::types::Json as SqlJson;
use uuid::Uuid;

use crate::auth::token::ApprovedClub;
use crate::email::templates::EventNotice;
use crate::error::AppError;
use crate::models::{EVENT_SELECT, Event, PUBLIC_EVENT_SELECT, Registration};
use crate::notify::spawn_event_notifications;
use crate::routes::multipart::{discard_image, parse_multipart, store_image};
use crate::state::AppState;
use crate::storage::MediaKind;

/// Public listing cap.
const MAX_LISTED_EVENTS: i64 = 100;

#[derive(Debug, Serialize)]
pub struct CreateEventResponse {
    pub message: &'static str,
    pub event: Event,
}

/// Accepts RFC 3339, the `YYYY-MM-DDTHH:MM[:SS]` an HTML datetime input sends
/// (read as UTC), or a bare date (midnight UTC).
fn parse_event_date(raw: &str) -> Result<DateTime<Utc>, AppError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| AppError::bad_request("date must be an ISO 8601 date or date-time"))
}

/// `POST /api/clubs/addevents`
///
/// Multipart fields: `title`, `description`, `date`, `location`, optional
/// `registrationForm` (JSON array) and `poster` image. Once stored, verified
/// students are notified in the background.
///
/// # Errors
///
/// - `400` on missing or invalid fields
/// - `401`/`403` unless the caller is an approved club
pub async fn add_event(
    State(state): State<AppState>,
    club: ApprovedClub,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<CreateEventResponse>), AppError> {
    let mut form = parse_multipart(&mut multipart, "poster").await?;
    let title = form.text("title")?;
    let description = form.text("description")?;
    let date = parse_event_date(&form.text("date")?)?;
    let location = form.text("location")?;
    let registration_form =
        parse_form(form.get("registrationForm").unwrap_or_default()).map_err(AppError::BadRequest)?;

    let poster = store_image(&state, MediaKind::Poster, form.file.take()).await?;
    let poster_url = poster
        .as_ref()
        .map_or_else(|| MediaKind::Poster.default_url().to_string(), |m| m.url.clone());

    let event_id = Uuid::new_v4();
    let inserted = sqlx::query(
        "INSERT INTO events (id, organizer_id, title, description, date, location, poster, registration_form)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(event_id)
    .bind(club.club_id)
    .bind(&title)
    .bind(&description)
    .bind(date)
    .bind(&location)
    .bind(&poster_url)
    .bind(SqlJson(&registration_form))
    .execute(&state.db)
    .await;
    if let Err(e) = inserted {
        discard_image(&state, poster.as_ref()).await;
        return Err(e.into());
    }

    let row = sqlx::query(&format!("{EVENT_SELECT} WHERE e.id = $1"))
        .bind(event_id)
        .fetch_one(&state.db)
        .await?;
    let event = Event::from_row(&row)?;
    tracing::info!(event_id = %event.id, club_id = %club.club_id, "event created");

    spawn_event_notifications(
        state.db.clone(),
        state.email.clone(),
        EventNotice {
            title,
            description,
            date,
            location,
            club_name: club.name,
        },
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateEventResponse {
            message: "Event created successfully",
            event,
        }),
    ))
}

/// `GET /api/clubs/getevents`: newest first, organizer shown only when the
/// organizing club has verified its email.
pub async fn all_events(State(state): State<AppState>) -> Result<Json<Vec<Event>>, AppError> {
    let rows = sqlx::query(&format!("{PUBLIC_EVENT_SELECT} ORDER BY e.date DESC LIMIT $1"))
        .bind(MAX_LISTED_EVENTS)
        .fetch_all(&state.db)
        .await?;
    let events = rows
        .iter()
        .map(Event::from_row)
        .collect::<Result<Vec<_>, _>>()?;
    tracing::debug!(count = events.len(), "listed events");
    Ok(Json(events))
}

/// `GET /api/clubs/events`: the caller's own events, newest first.
pub async fn club_events(
    State(state): State<AppState>,
    club: ApprovedClub,
) -> Result<Json<Vec<Event>>, AppError> {
    let rows = sqlx::query(&format!(
        "{EVENT_SELECT} WHERE e.organizer_id = $1 ORDER BY e.date DESC"
    ))
    .bind(club.club_id)
    .fetch_all(&state.db)
    .await?;
    let events = rows
        .iter()
        .map(Event::from_row)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(events))
}

/// `GET /api/clubs/events/{event_id}/registrations`
///
/// # Errors
///
/// - `404` if the event does not exist
/// - `403` if another club organizes it
pub async fn event_registrations(
    State(state): State<AppState>,
    club: ApprovedClub,
    Path(event_id): Path<Uuid>,
) -> Result<Json<Vec<Registration>>, AppError> {
    let organizer: Uuid = sqlx::query_scalar("SELECT organizer_id FROM events WHERE id = $1")
        .bind(event_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
    if organizer != club.club_id {
        return Err(AppError::Forbidden("Not authorized".to_string()));
    }

    let rows = sqlx::query(
        "SELECT r.id, r.event_id, r.registrant_id, r.responses, r.registered_at,
                s.name, s.email, s.rollno
         FROM event_registrations r
         JOIN students s ON s.id = r.registrant_id
         WHERE r.event_id = $1
         ORDER BY r.registered_at DESC",
    )
    .bind(event_id)
    .fetch_all(&state.db)
    .await?;
    let registrations = rows
        .iter()
        .map(Registration::from_row)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(registrations))
}
