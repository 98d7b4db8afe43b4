mod events;

use axum::{
    Json, Router,
    extract::{Multipart, State},
    routing::{get, post},
};
use campus_common::validation::{normalize_email, validate_email, validate_password};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::accounts::{self, LoginRequest, LoginResponse, ResendOtpRequest, VerifyOtpRequest};
use super::ip::ClientIp;
use super::multipart::{discard_image, parse_multipart, store_image};
use crate::auth::password::hash_password_blocking;
use crate::auth::token::{ClubAuth, Role};
use crate::email::templates::admin_club_alert;
use crate::error::AppError;
use crate::models::Club;
use crate::otp::OtpSubject;
use crate::state::AppState;
use crate::storage::MediaKind;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/createclubs", post(create_club))
        .route("/clublogin", post(club_login))
        .route("/getclub", get(get_club))
        .route("/verifyotp", post(verify_otp))
        .route("/resendotp", post(resend_otp))
        .route("/addevents", post(events::add_event))
        .route("/getevents", get(events::all_events))
        .route("/events", get(events::club_events))
        .route(
            "/events/{event_id}/registrations",
            get(events::event_registrations),
        )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClubResponse {
    pub success: bool,
    pub auth_token: String,
    pub club: Club,
}

struct NewClub {
    name: String,
    description: String,
    email: String,
    password: String,
    members_count: i32,
}

fn parse_members_count(raw: Option<&str>) -> Result<i32, AppError> {
    raw.map_or(Ok(0), |s| {
        s.parse::<i32>()
            .ok()
            .filter(|n| *n >= 0)
            .ok_or_else(|| AppError::bad_request("membersCount must be a non-negative integer"))
    })
}

/// Which unique column an existing club already holds, if any.
async fn club_conflict(state: &AppState, name: &str, email: &str) -> Result<Option<&'static str>, AppError> {
    let row = sqlx::query_as::<_, (bool, bool)>(
        "SELECT name = $1, email = $2 FROM clubs WHERE name = $1 OR email = $2 LIMIT 1",
    )
    .bind(name)
    .bind(email)
    .fetch_optional(&state.db)
    .await?;
    Ok(row.map(|(same_name, _)| {
        if same_name {
            "Club with this name already exists"
        } else {
            "Club with this email already exists"
        }
    }))
}

/// `POST /api/clubs/createclubs`
///
/// Multipart fields: `name`, `description`, `email`, `password`, optional
/// `membersCount` and `logo` image. The new club is unapproved and
/// unverified; an OTP is emailed and the administrator is alerted.
///
/// # Errors
///
/// - `400` on missing or invalid fields or an unsupported logo
/// - `409` if the name or email is taken
pub async fn create_club(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<CreateClubResponse>, AppError> {
    let mut form = parse_multipart(&mut multipart, "logo").await?;
    let new = NewClub {
        name: form.text("name")?,
        description: form.text("description")?,
        email: normalize_email(&form.text("email")?),
        password: form.raw("password").unwrap_or_default().to_string(),
        members_count: parse_members_count(form.get("membersCount"))?,
    };
    validate_email(&new.email).map_err(AppError::BadRequest)?;
    validate_password(&new.password).map_err(AppError::BadRequest)?;

    if let Some(msg) = club_conflict(&state, &new.name, &new.email).await? {
        return Err(AppError::Conflict(msg.to_string()));
    }

    let password_hash = hash_password_blocking(new.password).await?;
    let logo = store_image(&state, MediaKind::Logo, form.file.take()).await?;
    let logo_url = logo
        .as_ref()
        .map_or_else(|| MediaKind::Logo.default_url().to_string(), |m| m.url.clone());

    let sql = format!(
        "INSERT INTO clubs (id, name, description, email, logo, members_count, password_hash)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         ON CONFLICT DO NOTHING
         RETURNING {}",
        Club::COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.description)
        .bind(&new.email)
        .bind(&logo_url)
        .bind(new.members_count)
        .bind(&password_hash)
        .fetch_optional(&state.db)
        .await;
    let row = match row {
        Ok(Some(row)) => row,
        Ok(None) => {
            // Lost a race with a concurrent sign-up for the same name or email.
            discard_image(&state, logo.as_ref()).await;
            return Err(AppError::Conflict(
                "Club with this name or email already exists".to_string(),
            ));
        }
        Err(e) => {
            discard_image(&state, logo.as_ref()).await;
            return Err(e.into());
        }
    };
    let club = Club::from_row(&row)?;
    tracing::info!(club_id = %club.id, name = %club.name, "club registered");

    accounts::send_signup_otp(&state, OtpSubject::club(club.id), &club.name, &club.email).await?;
    spawn_admin_alert(&state, &club);

    Ok(Json(CreateClubResponse {
        success: true,
        auth_token: state.signer.issue(Role::Club, club.id),
        club,
    }))
}

fn spawn_admin_alert(state: &AppState, club: &Club) {
    let Some(admin) = state.admin_email.as_deref() else {
        tracing::debug!("ADMIN_EMAIL not set; skipping new-club alert");
        return;
    };
    let message = admin_club_alert(admin, &club.name, &club.email);
    let email = state.email.clone();
    tokio::spawn(async move {
        if let Err(e) = email.send(&message).await {
            tracing::warn!("new-club alert failed: {e}");
        }
    });
}

/// `POST /api/clubs/clublogin`
pub async fn club_login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    accounts::login(&state, Role::Club, &ip, req).await
}

/// `GET /api/clubs/getclub`
pub async fn get_club(
    State(state): State<AppState>,
    auth: ClubAuth,
) -> Result<Json<Club>, AppError> {
    let sql = format!("SELECT {} FROM clubs WHERE id = $1", Club::COLUMNS);
    let row = sqlx::query(&sql)
        .bind(auth.club_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Club not found".to_string()))?;
    Ok(Json(Club::from_row(&row)?))
}

/// `POST /api/clubs/verifyotp`
pub async fn verify_otp(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(req): Json<VerifyOtpRequest>,
) -> Result<Json<Value>, AppError> {
    accounts::verify_otp(&state, Role::Club, &ip, req).await
}

/// `POST /api/clubs/resendotp`
pub async fn resend_otp(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(req): Json<ResendOtpRequest>,
) -> Result<Json<Value>, AppError> {
    accounts::resend_otp(&state, Role::Club, &ip, req).await
}
