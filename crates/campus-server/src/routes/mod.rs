mod accounts;
mod admin;
mod chat;
mod clubs;
mod health;
pub mod ip;
pub mod multipart;
mod ready;
mod students;

#[cfg(test)]
pub(crate) mod test_helpers;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    routing::get,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};

use crate::state::AppState;

/// Build the CORS layer for the configured origins. Origins that are not
/// valid header values are skipped with a warning.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(allowed)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

async fn root() -> &'static str {
    "I am root"
}

pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.cors_allowed_origins);
    Router::new()
        .route("/", get(root))
        .route("/health", get(health::health))
        .route("/ready", get(ready::ready))
        .nest("/api/clubs", clubs::router())
        .nest("/api/student", students::router())
        .nest("/api/admin", admin::router())
        .nest("/api/chat", chat::router())
        .layer(DefaultBodyLimit::max(multipart::MAX_FORM_BYTES))
        .layer(cors)
        // Header capture stays off so bearer tokens never reach the logs.
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(false)),
        )
        .with_state(state)
}
