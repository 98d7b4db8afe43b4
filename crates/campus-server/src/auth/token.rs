use axum::{extract::FromRequestParts, http::request::Parts};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Which kind of account a token was issued to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Club,
    Student,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Club => "club",
            Self::Student => "student",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "club" => Some(Self::Club),
            "student" => Some(Self::Student),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Claims {
    pub role: Role,
    pub sub: Uuid,
    /// Expiry as unix seconds.
    pub exp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    Malformed,
    BadSignature,
    Expired,
}

/// Signs and verifies bearer tokens and other server-keyed digests.
///
/// A token is `hex("{role}:{sub}:{exp}") "." hex(HMAC-SHA256(payload))`.
#[derive(Clone)]
pub struct TokenSigner {
    mac: HmacSha256,
    ttl_secs: i64,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

/// Longest accepted token lifetime: one year.
pub const MAX_TOKEN_TTL_SECS: u64 = 365 * 24 * 3600;

impl TokenSigner {
    /// # Errors
    ///
    /// Returns an error if the secret is shorter than 16 bytes or `ttl_secs`
    /// exceeds [`MAX_TOKEN_TTL_SECS`].
    pub fn new(secret: &str, ttl_secs: u64) -> anyhow::Result<Self> {
        if secret.len() < 16 {
            anyhow::bail!("TOKEN_SECRET must be at least 16 bytes");
        }
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| anyhow::anyhow!("invalid token secret: {e}"))?;
        if ttl_secs > MAX_TOKEN_TTL_SECS {
            anyhow::bail!("TOKEN_TTL_SECS must be at most {MAX_TOKEN_TTL_SECS}");
        }
        let ttl_secs = i64::try_from(ttl_secs)
            .map_err(|_| anyhow::anyhow!("TOKEN_TTL_SECS is out of range"))?;
        Ok(Self { mac, ttl_secs })
    }

    pub const fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    /// Issue a token for `sub` that expires `ttl_secs` from now.
    pub fn issue(&self, role: Role, sub: Uuid) -> String {
        self.issue_at(role, sub, chrono::Utc::now().timestamp())
    }

    fn issue_at(&self, role: Role, sub: Uuid, now: i64) -> String {
        let expires = now.saturating_add(self.ttl_secs);
        let payload = format!("{}:{sub}:{expires}", role.as_str());
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        format!(
            "{}.{}",
            hex::encode(payload.as_bytes()),
            hex::encode(mac.finalize().into_bytes())
        )
    }

    /// # Errors
    ///
    /// Returns [`TokenError`] when the token is malformed, carries a bad
    /// signature, or has expired.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, chrono::Utc::now().timestamp())
    }

    fn verify_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        let (payload_hex, sig_hex) = token.split_once('.').ok_or(TokenError::Malformed)?;
        let payload = hex::decode(payload_hex).map_err(|_| TokenError::Malformed)?;
        let sig = hex::decode(sig_hex).map_err(|_| TokenError::Malformed)?;

        let mut mac = self.mac.clone();
        mac.update(&payload);
        mac.verify_slice(&sig)
            .map_err(|_| TokenError::BadSignature)?;

        let payload = std::str::from_utf8(&payload).map_err(|_| TokenError::Malformed)?;
        let mut parts = payload.splitn(3, ':');
        let role = parts
            .next()
            .and_then(Role::parse)
            .ok_or(TokenError::Malformed)?;
        let sub = parts
            .next()
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or(TokenError::Malformed)?;
        let exp = parts
            .next()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or(TokenError::Malformed)?;

        if exp <= now {
            return Err(TokenError::Expired);
        }
        Ok(Claims { role, sub, exp })
    }

    /// Keyed hex digest of `message`; used to store OTP codes.
    pub fn digest(&self, message: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(message.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Constant-time comparison of `message` against a stored [`digest`](Self::digest).
    pub fn verify_digest(&self, message: &str, digest_hex: &str) -> bool {
        let Ok(expected) = hex::decode(digest_hex) else {
            return false;
        };
        let mut mac = self.mac.clone();
        mac.update(message.as_bytes());
        mac.verify_slice(&expected).is_ok()
    }
}

/// Returns the SHA-256 hex digest of the given token.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

pub(crate) fn bearer(parts: &Parts) -> Result<&str, AppError> {
    parts
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AppError::Unauthorized)
}

fn claims_for(parts: &Parts, state: &AppState, role: Role) -> Result<Claims, AppError> {
    let token = bearer(parts)?;
    let claims = state.signer.verify(token).map_err(|e| {
        tracing::debug!(error = ?e, "rejected bearer token");
        AppError::Unauthorized
    })?;
    if claims.role != role {
        return Err(AppError::Unauthorized);
    }
    Ok(claims)
}

/// Authenticated club extracted from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct ClubAuth {
    pub club_id: Uuid,
    pub name: String,
    pub is_approved: bool,
}

impl FromRequestParts<AppState> for ClubAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = claims_for(parts, state, Role::Club)?;
        lookup_club(&state.db, claims.sub).await
    }
}

async fn lookup_club(db: &PgPool, club_id: Uuid) -> Result<ClubAuth, AppError> {
    let (name, is_approved) =
        sqlx::query_as::<_, (String, bool)>("SELECT name, is_approved FROM clubs WHERE id = $1")
            .bind(club_id)
            .fetch_optional(db)
            .await?
            .ok_or(AppError::Unauthorized)?;
    Ok(ClubAuth {
        club_id,
        name,
        is_approved,
    })
}

/// A club that an administrator has approved; required to publish events
/// and read registrations.
#[derive(Debug, Clone)]
pub struct ApprovedClub {
    pub club_id: Uuid,
    pub name: String,
}

impl FromRequestParts<AppState> for ApprovedClub {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let club = ClubAuth::from_request_parts(parts, state).await?;
        if !club.is_approved {
            return Err(AppError::Forbidden("club is not approved".to_string()));
        }
        Ok(Self {
            club_id: club.club_id,
            name: club.name,
        })
    }
}

/// Authenticated student extracted from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct StudentAuth {
    pub student_id: Uuid,
    pub is_verified: bool,
}

impl FromRequestParts<AppState> for StudentAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = claims_for(parts, state, Role::Student)?;
        let is_verified: bool =
            sqlx::query_scalar("SELECT is_verified FROM students WHERE id = $1")
                .bind(claims.sub)
                .fetch_optional(&state.db)
                .await?
                .ok_or(AppError::Unauthorized)?;
        Ok(Self {
            student_id: claims.sub,
            is_verified,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn signer() -> TokenSigner {
        TokenSigner::new("0123456789abcdef-test-secret", 3600).unwrap()
    }

    #[test]
    fn rejects_short_secret() {
        assert!(TokenSigner::new("short", 60).is_err());
    }

    #[test]
    fn rejects_ttl_beyond_one_year() {
        let secret = "0123456789abcdef-test-secret";
        assert!(TokenSigner::new(secret, MAX_TOKEN_TTL_SECS).is_ok());
        let err = TokenSigner::new(secret, MAX_TOKEN_TTL_SECS + 1).unwrap_err();
        assert!(err.to_string().contains("TOKEN_TTL_SECS"));
        assert!(TokenSigner::new(secret, u64::MAX).is_err());
    }

    #[test]
    fn expiry_saturates_instead_of_overflowing() {
        let s = TokenSigner::new("0123456789abcdef-test-secret", MAX_TOKEN_TTL_SECS).unwrap();
        let token = s.issue_at(Role::Student, Uuid::new_v4(), i64::MAX - 10);
        let payload = hex::decode(token.split('.').next().unwrap()).unwrap();
        let payload = String::from_utf8(payload).unwrap();
        assert!(payload.ends_with(&format!(":{}", i64::MAX)), "{payload}");
    }

    #[test]
    fn issued_token_verifies() {
        let s = signer();
        let id = Uuid::new_v4();
        let claims = s.verify(&s.issue(Role::Club, id)).unwrap();
        assert_eq!(claims.role, Role::Club);
        assert_eq!(claims.sub, id);
    }

    #[test]
    fn expired_token_is_rejected() {
        let s = signer();
        let token = s.issue_at(Role::Student, Uuid::new_v4(), 1_000);
        assert_eq!(s.verify_at(&token, 1_000 + 3599).map(|c| c.exp), Ok(4_600));
        assert_eq!(s.verify_at(&token, 1_000 + 3600), Err(TokenError::Expired));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let s = signer();
        let token = s.issue(Role::Student, Uuid::new_v4());
        let (_, sig) = token.split_once('.').unwrap();
        let forged_payload = hex::encode(format!("club:{}:99999999999", Uuid::new_v4()));
        assert_eq!(
            s.verify(&format!("{forged_payload}.{sig}")),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let other = TokenSigner::new("another-secret-of-length", 3600).unwrap();
        let token = other.issue(Role::Club, Uuid::new_v4());
        assert_eq!(signer().verify(&token), Err(TokenError::BadSignature));
    }

    #[test]
    fn garbage_is_malformed() {
        let s = signer();
        for bad in ["", "no-dot", "zz.zz", "abc.def"] {
            assert_eq!(s.verify(bad), Err(TokenError::Malformed), "{bad:?}");
        }
    }

    #[test]
    fn digest_round_trips_in_constant_time_compare() {
        let s = signer();
        let d = s.digest("student:abc:123456");
        assert_eq!(d.len(), 64);
        assert!(s.verify_digest("student:abc:123456", &d));
        assert!(!s.verify_digest("student:abc:654321", &d));
        assert!(!s.verify_digest("student:abc:123456", "not-hex"));
    }

    #[test]
    fn hash_token_is_deterministic_hex() {
        let hash = hash_token("admin-token");
        assert_eq!(hash, hash_token("admin-token"));
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn debug_hides_key() {
        let dbg = format!("{:?}", signer());
        assert!(!dbg.contains("test-secret"));
    }
}
