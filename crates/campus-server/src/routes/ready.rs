use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;

use crate::state::AppState;

/// Readiness probe: 200 only when the database is reachable and migrations
/// have been applied, 503 otherwise.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    // _sqlx_migrations (rather than SELECT 1) also proves migrations ran.
    let db_ok = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(&state.db)
        .await
        .inspect_err(|e| tracing::warn!("readiness check failed: {e}"))
        .is_ok();

    let status = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({
            "status": if db_ok { "ok" } else { "degraded" },
            "version": env!("CARGO_PKG_VERSION"),
            "database": if db_ok { "ok" } else { "error" },
        })),
    )
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use axum::http::StatusCode;

    use crate::routes::test_helpers::{assert_status, get, lazy_state};

    #[tokio::test]
    async fn ready_returns_503_and_degraded_status_when_db_is_down() {
        let app = crate::routes::create_router(lazy_state());
        let resp = get(app, "/ready", None).await;
        let body = assert_status(resp, StatusCode::SERVICE_UNAVAILABLE).await;

        let json: serde_json::Value = serde_json::from_slice(&body).expect("failed to parse JSON");
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["database"], "error");
        assert!(json["version"].is_string());
    }
}
