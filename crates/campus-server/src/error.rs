use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;

use crate::rate_limit::RateLimitResult;

#[derive(Debug)]
pub enum AppError {
    Internal(String),
    BadRequest(String),
    NotFound(String),
    Forbidden(String),
    Conflict(String),
    /// An upstream service (chatbot, email API) failed.
    BadGateway(String),
    /// A feature whose backing service is not configured.
    Unavailable(String),
    RateLimited {
        retry_after_secs: u64,
        limit: u32,
        remaining: u32,
    },
    Unauthorized,
}

impl AppError {
    /// Construct a `RateLimited` error from a denied [`RateLimitResult`].
    pub const fn rate_limited(result: &RateLimitResult) -> Self {
        Self::RateLimited {
            retry_after_secs: result.reset_after_secs,
            limit: result.limit,
            remaining: result.remaining,
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
            Self::BadRequest(msg) => write!(f, "bad request: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Forbidden(msg) => write!(f, "forbidden: {msg}"),
            Self::Conflict(msg) => write!(f, "conflict: {msg}"),
            Self::BadGateway(msg) => write!(f, "bad gateway: {msg}"),
            Self::Unavailable(msg) => write!(f, "unavailable: {msg}"),
            Self::RateLimited { .. } => write!(f, "rate limited"),
            Self::Unauthorized => write!(f, "unauthorized"),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    #[allow(clippy::unwrap_used)]
    fn into_response(self) -> axum::response::Response {
        match self {
            Self::RateLimited {
                retry_after_secs,
                limit,
                remaining,
            } => {
                let mut headers = crate::routes::ip::rate_limit_headers(&RateLimitResult {
                    allowed: false,
                    limit,
                    remaining,
                    reset_after_secs: retry_after_secs,
                });
                headers.insert("retry-after", retry_after_secs.to_string().parse().unwrap());
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    headers,
                    Json(json!({ "error": "rate limit exceeded" })),
                )
                    .into_response()
            }
            Self::Internal(msg) => {
                tracing::error!("internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal server error" })),
                )
                    .into_response()
            }
            Self::BadGateway(msg) => {
                tracing::warn!("upstream failure: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    Json(json!({ "error": "upstream service failed" })),
                )
                    .into_response()
            }
            Self::Unavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "error": msg }))).into_response()
            }
            Self::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
            }
            Self::NotFound(msg) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": msg }))).into_response()
            }
            Self::Forbidden(msg) => {
                (StatusCode::FORBIDDEN, Json(json!({ "error": msg }))).into_response()
            }
            Self::Conflict(msg) => {
                (StatusCode::CONFLICT, Json(json!({ "error": msg }))).into_response()
            }
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "unauthorized" })),
            )
                .into_response(),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        Self::BadRequest(err.body_text())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use axum::response::IntoResponse;
    use http_body_util::BodyExt;

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn internal_error_hides_details() {
        let resp = AppError::Internal("connection refused".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(resp).await;
        assert_eq!(json["error"], "internal server error");
    }

    #[tokio::test]
    async fn bad_request_returns_400_with_message() {
        let resp = AppError::bad_request("Missing email or OTP").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "Missing email or OTP");
    }

    #[tokio::test]
    async fn not_found_returns_404() {
        let resp = AppError::NotFound("Event not found".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn conflict_returns_409() {
        let resp =
            AppError::Conflict("Club with this name already exists".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(
            body_json(resp).await["error"],
            "Club with this name already exists"
        );
    }

    #[tokio::test]
    async fn forbidden_returns_403() {
        let resp = AppError::Forbidden("Not authorized".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(resp).await["error"], "Not authorized");
    }

    #[tokio::test]
    async fn unauthorized_returns_401() {
        let resp = AppError::Unauthorized.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn bad_gateway_hides_upstream_details() {
        let resp = AppError::BadGateway("chatbot returned 500".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body_json(resp).await["error"], "upstream service failed");
    }

    #[tokio::test]
    async fn unavailable_returns_503() {
        let resp = AppError::Unavailable("chatbot is not configured".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(resp).await["error"], "chatbot is not configured");
    }

    #[tokio::test]
    async fn rate_limited_includes_all_headers() {
        let resp = AppError::RateLimited {
            retry_after_secs: 120,
            limit: 10,
            remaining: 0,
        }
        .into_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        let header = |name: &str| {
            resp.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string)
        };
        assert_eq!(header("retry-after").as_deref(), Some("120"));
        assert_eq!(header("x-ratelimit-limit").as_deref(), Some("10"));
        assert_eq!(header("x-ratelimit-remaining").as_deref(), Some("0"));
        assert_eq!(header("x-ratelimit-reset").as_deref(), Some("120"));
    }
}
