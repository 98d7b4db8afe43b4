//! Login and OTP flows shared by club and student accounts.

use axum::Json;
use campus_common::validation::normalize_email;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::password::verify_password_blocking;
use crate::auth::token::Role;
use crate::email::templates::otp_email;
use crate::error::AppError;
use crate::otp::OtpSubject;
use crate::state::AppState;

use super::ip::check_ip_limit;

const INVALID_CREDENTIALS: &str = "Invalid credentials";

const fn table(role: Role) -> &'static str {
    match role {
        Role::Club => "clubs",
        Role::Student => "students",
    }
}

const fn label(role: Role) -> &'static str {
    match role {
        Role::Club => "Club",
        Role::Student => "Student",
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    pub auth_token: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub email: Option<String>,
    pub otp: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResendOtpRequest {
    pub email: Option<String>,
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

struct Account {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    is_verified: bool,
}

async fn find_account(db: &PgPool, role: Role, email: &str) -> Result<Option<Account>, AppError> {
    let sql = format!(
        "SELECT id, name, email, password_hash, is_verified FROM {} WHERE email = $1",
        table(role)
    );
    let row = sqlx::query_as::<_, (Uuid, String, String, String, bool)>(&sql)
        .bind(email)
        .fetch_optional(db)
        .await?;
    Ok(row.map(|(id, name, email, password_hash, is_verified)| Account {
        id,
        name,
        email,
        password_hash,
        is_verified,
    }))
}

/// Check `email`/`password` and issue a bearer token.
///
/// Unknown emails and wrong passwords get the same 400 response.
pub(super) async fn login(
    state: &AppState,
    role: Role,
    ip: &str,
    req: LoginRequest,
) -> Result<Json<LoginResponse>, AppError> {
    check_ip_limit(&state.login_rate_limiter, ip)?;
    let (Some(email), Some(password)) = (non_blank(req.email.as_ref()), req.password.as_deref())
    else {
        return Err(AppError::bad_request(INVALID_CREDENTIALS));
    };

    let Some(account) = find_account(&state.db, role, &normalize_email(email)).await? else {
        tracing::debug!(role = role.as_str(), "login for unknown email");
        return Err(AppError::bad_request(INVALID_CREDENTIALS));
    };
    if !verify_password_blocking(password.to_string(), account.password_hash).await? {
        tracing::debug!(role = role.as_str(), id = %account.id, "login with wrong password");
        return Err(AppError::bad_request(INVALID_CREDENTIALS));
    }

    tracing::info!(role = role.as_str(), id = %account.id, "login");
    Ok(Json(LoginResponse {
        success: true,
        auth_token: state.signer.issue(role, account.id),
    }))
}

/// Issue a code for the account and email it.
///
/// # Errors
///
/// Returns `Internal` if the code cannot be stored. Email delivery failures
/// are returned as `Ok(Err(_))` so callers can decide whether they matter.
pub(super) async fn issue_otp(
    state: &AppState,
    subject: OtpSubject,
    name: &str,
    email: &str,
) -> Result<anyhow::Result<()>, AppError> {
    let code = state.otp.issue(&state.db, subject).await?;
    let message = otp_email(email, name, &code, state.otp.ttl_minutes());
    Ok(state.email.send(&message).await)
}

/// Send the first code after sign-up. A delivery failure is logged; the
/// account can ask for a new code.
pub(super) async fn send_signup_otp(
    state: &AppState,
    subject: OtpSubject,
    name: &str,
    email: &str,
) -> Result<(), AppError> {
    if let Err(e) = issue_otp(state, subject, name, email).await? {
        tracing::warn!(
            role = subject.kind.as_str(),
            id = %subject.id,
            "could not deliver sign-up OTP: {e}"
        );
    }
    Ok(())
}

pub(super) async fn verify_otp(
    state: &AppState,
    role: Role,
    ip: &str,
    req: VerifyOtpRequest,
) -> Result<Json<Value>, AppError> {
    check_ip_limit(&state.otp_rate_limiter, ip)?;
    let (Some(email), Some(otp)) = (non_blank(req.email.as_ref()), non_blank(req.otp.as_ref()))
    else {
        return Err(AppError::bad_request("Missing email or OTP"));
    };

    let account = find_account(&state.db, role, &normalize_email(email))
        .await?
        .ok_or_else(|| AppError::bad_request(format!("{} not found", label(role))))?;
    let subject = OtpSubject {
        kind: role,
        id: account.id,
    };
    let mut tx = state.db.begin().await?;
    if let Err(e) = state.otp.verify(&mut tx, subject, otp).await {
        tx.commit().await?;
        return Err(e);
    }
    let sql = format!("UPDATE {} SET is_verified = TRUE WHERE id = $1", table(role));
    sqlx::query(&sql).bind(account.id).execute(&mut *tx).await?;
    tx.commit().await?;
    tracing::info!(role = role.as_str(), id = %account.id, "email verified");

    Ok(Json(json!({ "message": "Email verified successfully" })))
}

pub(super) async fn resend_otp(
    state: &AppState,
    role: Role,
    ip: &str,
    req: ResendOtpRequest,
) -> Result<Json<Value>, AppError> {
    check_ip_limit(&state.otp_rate_limiter, ip)?;
    let Some(email) = non_blank(req.email.as_ref()) else {
        return Err(AppError::bad_request("Missing email"));
    };
    let email = normalize_email(email);

    let account = find_account(&state.db, role, &email)
        .await?
        .ok_or_else(|| AppError::bad_request(format!("{} not found", label(role))))?;
    if account.is_verified {
        return Err(AppError::bad_request("Email is already verified"));
    }
    let rl = state.resend_rate_limiter.check_and_increment(email);
    if !rl.allowed {
        return Err(AppError::rate_limited(&rl));
    }

    let subject = OtpSubject {
        kind: role,
        id: account.id,
    };
    issue_otp(state, subject, &account.name, &account.email)
        .await?
        .map_err(|e| AppError::BadGateway(format!("OTP email failed: {e}")))?;

    Ok(Json(json!({ "message": "OTP sent" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_and_labels_follow_role() {
        assert_eq!(table(Role::Club), "clubs");
        assert_eq!(table(Role::Student), "students");
        assert_eq!(label(Role::Student), "Student");
    }

    #[test]
    fn non_blank_trims() {
        assert_eq!(non_blank(Some(&" a@b.co ".to_string())), Some("a@b.co"));
        assert_eq!(non_blank(Some(&"  ".to_string())), None);
        assert_eq!(non_blank(None), None);
    }
}
