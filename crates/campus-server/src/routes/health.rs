use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;

/// Liveness probe: always 200 while the process runs. Never touches the
/// database; see `GET /ready` for that.
pub async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}
