use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, put},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::admin::AdminAuth;
use crate::error::AppError;
use crate::models::Club;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/clubs", get(list_clubs))
        .route("/clubs/{club_id}/approve", put(approve_club))
        .route("/clubs/{club_id}/revoke", put(revoke_club))
}

#[derive(Debug, Default, Deserialize)]
pub struct ClubFilter {
    pub approved: Option<bool>,
}

/// `GET /api/admin/clubs[?approved=true|false]`, newest first.
pub async fn list_clubs(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Query(filter): Query<ClubFilter>,
) -> Result<Json<Vec<Club>>, AppError> {
    let sql = format!(
        "SELECT {} FROM clubs
         WHERE $1::BOOLEAN IS NULL OR is_approved = $1
         ORDER BY created_at DESC",
        Club::COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(filter.approved)
        .fetch_all(&state.db)
        .await?;
    let clubs = rows
        .iter()
        .map(Club::from_row)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(clubs))
}

async fn set_approval(state: &AppState, club_id: Uuid, approved: bool) -> Result<Club, AppError> {
    let sql = format!(
        "UPDATE clubs SET is_approved = $2 WHERE id = $1 RETURNING {}",
        Club::COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(club_id)
        .bind(approved)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Club not found".to_string()))?;
    tracing::info!(%club_id, approved, "club approval changed");
    Ok(Club::from_row(&row)?)
}

/// `PUT /api/admin/clubs/{club_id}/approve`
pub async fn approve_club(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Path(club_id): Path<Uuid>,
) -> Result<Json<Club>, AppError> {
    Ok(Json(set_approval(&state, club_id, true).await?))
}

/// `PUT /api/admin/clubs/{club_id}/revoke`
pub async fn revoke_club(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Path(club_id): Path<Uuid>,
) -> Result<Json<Club>, AppError> {
    Ok(Json(set_approval(&state, club_id, false).await?))
}
