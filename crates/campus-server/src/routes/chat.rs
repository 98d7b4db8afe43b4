use axum::{Json, Router, extract::State, routing::post};
use campus_common::validation::require_non_blank;
use serde::{Deserialize, Serialize};

use super::ip::{ClientIp, check_ip_limit};
use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/chat", post(chat))
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub query: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
}

/// `POST /api/chat/chat`: forward a question to the chatbot service.
///
/// # Errors
///
/// - `400` if `query` is blank or too long
/// - `429` when the caller's IP is over its budget
/// - `502` if the chatbot fails, `503` if none is configured
pub async fn chat(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let query = require_non_blank("query", req.query.as_deref().unwrap_or_default())
        .map_err(AppError::BadRequest)?;
    check_ip_limit(&state.chat_rate_limiter, &ip)?;

    let response = state.chatbot.ask(&query).await?;
    Ok(Json(ChatResponse { response }))
}
