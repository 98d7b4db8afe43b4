use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::token::{bearer, hash_token};
use crate::error::AppError;
use crate::state::AppState;

/// Administrator extracted from `Authorization: Bearer <ADMIN_TOKEN>`.
///
/// Not tied to an account: the bearer is compared with the configured admin
/// token. With no admin token configured every request is rejected.
#[derive(Debug, Clone)]
pub struct AdminAuth;

impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let expected = state
            .admin_token_hash
            .as_deref()
            .ok_or(AppError::Unauthorized)?;
        let presented = hash_token(bearer(parts)?);
        if presented != expected {
            tracing::warn!("rejected admin request with wrong token");
            return Err(AppError::Unauthorized);
        }
        Ok(Self)
    }
}
