//! One-time verification codes for new club and student accounts.
//!
//! Each account has at most one live code, stored as a keyed digest in
//! `otp_verifications`. A code is single use: a successful match deletes the
//! row, and so do expiry and running out of attempts.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::auth::token::{Role, TokenSigner};
use crate::error::AppError;

pub const MAX_OTP_ATTEMPTS: i32 = 5;

/// Longest accepted code lifetime: one day.
pub const MAX_OTP_TTL_SECS: u64 = 24 * 3600;

/// The account a code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtpSubject {
    pub kind: Role,
    pub id: Uuid,
}

impl OtpSubject {
    pub const fn club(id: Uuid) -> Self {
        Self {
            kind: Role::Club,
            id,
        }
    }

    pub const fn student(id: Uuid) -> Self {
        Self {
            kind: Role::Student,
            id,
        }
    }

    fn digest_input(&self, code: &str) -> String {
        format!("{}:{}:{code}", self.kind.as_str(), self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpError {
    NotFound,
    Expired,
    TooManyAttempts,
    Invalid,
}

impl From<OtpError> for AppError {
    fn from(err: OtpError) -> Self {
        let msg = match err {
            OtpError::NotFound => "OTP record not found or already verified",
            OtpError::Expired => "OTP has expired",
            OtpError::TooManyAttempts => "Too many failed attempts, request a new OTP",
            OtpError::Invalid => "Invalid OTP",
        };
        Self::bad_request(msg)
    }
}

/// Six random decimal digits.
pub fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

#[derive(Debug, Clone)]
pub struct OtpService {
    signer: TokenSigner,
    ttl_secs: i64,
}

impl OtpService {
    /// # Errors
    ///
    /// Returns an error if `ttl_secs` is zero or exceeds [`MAX_OTP_TTL_SECS`].
    pub fn new(signer: TokenSigner, ttl_secs: u64) -> anyhow::Result<Self> {
        if ttl_secs == 0 || ttl_secs > MAX_OTP_TTL_SECS {
            anyhow::bail!("OTP_TTL_SECS must be between 1 and {MAX_OTP_TTL_SECS}");
        }
        let ttl_secs =
            i64::try_from(ttl_secs).map_err(|_| anyhow::anyhow!("OTP_TTL_SECS is out of range"))?;
        Ok(Self { signer, ttl_secs })
    }

    pub const fn ttl_minutes(&self) -> u64 {
        self.ttl_secs.unsigned_abs().div_ceil(60)
    }

    /// Store a fresh code for `subject`, replacing any previous one, and
    /// return it in clear text for delivery.
    ///
    /// # Errors
    ///
    /// Returns `Internal` on database failures.
    pub async fn issue(&self, db: &PgPool, subject: OtpSubject) -> Result<String, AppError> {
        // Piggyback cleanup of expired codes
        if let Err(e) = sqlx::query("DELETE FROM otp_verifications WHERE expires_at < NOW()")
            .execute(db)
            .await
        {
            tracing::warn!("expired OTP cleanup failed: {e}");
        }

        let code = generate_code();
        let expires_at = Utc::now() + Duration::seconds(self.ttl_secs);
        sqlx::query(
            "INSERT INTO otp_verifications (subject_kind, subject_id, otp_hash, expires_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (subject_kind, subject_id) DO UPDATE SET
                otp_hash = EXCLUDED.otp_hash,
                attempts = 0,
                created_at = NOW(),
                expires_at = EXCLUDED.expires_at",
        )
        .bind(subject.kind.as_str())
        .bind(subject.id)
        .bind(self.signer.digest(&subject.digest_input(&code)))
        .bind(expires_at)
        .execute(db)
        .await?;

        tracing::debug!(kind = subject.kind.as_str(), id = %subject.id, "issued OTP");
        Ok(code)
    }

    /// Check `code` against the live code for `subject`, consuming it on a
    /// match.
    ///
    /// Must run inside a transaction: the code row stays locked until it
    /// ends, so concurrent guesses for one account are counted one at a
    /// time. The caller commits on failure too, so a spent attempt or a
    /// discarded code is kept.
    ///
    /// # Errors
    ///
    /// Returns the [`OtpError`] describing why the code was refused, or
    /// `Internal` on database failures.
    pub async fn verify(
        &self,
        conn: &mut PgConnection,
        subject: OtpSubject,
        code: &str,
    ) -> Result<(), AppError> {
        let row = sqlx::query_as::<_, (i64, String, i32, DateTime<Utc>)>(
            "SELECT id, otp_hash, attempts, expires_at FROM otp_verifications
             WHERE subject_kind = $1 AND subject_id = $2
             FOR UPDATE",
        )
        .bind(subject.kind.as_str())
        .bind(subject.id)
        .fetch_optional(&mut *conn)
        .await?;

        let Some((id, otp_hash, attempts, expires_at)) = row else {
            return Err(OtpError::NotFound.into());
        };

        if expires_at <= Utc::now() {
            delete_row(conn, id).await?;
            return Err(OtpError::Expired.into());
        }
        if attempts >= MAX_OTP_ATTEMPTS {
            delete_row(conn, id).await?;
            return Err(OtpError::TooManyAttempts.into());
        }

        if !self
            .signer
            .verify_digest(&subject.digest_input(code.trim()), &otp_hash)
        {
            sqlx::query("UPDATE otp_verifications SET attempts = attempts + 1 WHERE id = $1")
                .bind(id)
                .execute(&mut *conn)
                .await?;
            return Err(OtpError::Invalid.into());
        }

        delete_row(conn, id).await
    }
}

async fn delete_row(conn: &mut PgConnection, id: i64) -> Result<(), AppError> {
    sqlx::query("DELETE FROM otp_verifications WHERE id = $1")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}
