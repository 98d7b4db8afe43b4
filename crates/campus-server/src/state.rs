use std::sync::Arc;

use crate::auth::token::{TokenSigner, hash_token};
use crate::chatbot::ChatbotClient;
use crate::config::Config;
use crate::email::EmailClient;
use crate::otp::OtpService;
use crate::rate_limit::{EmailRateLimiter, IpRateLimiter};
use crate::storage::StorageClient;

/// OTP re-sends allowed per account per hour.
const RESENDS_PER_HOUR: u32 = 5;

/// External services the handlers talk to.
pub struct Services {
    pub email: Arc<dyn EmailClient>,
    pub storage: Arc<dyn StorageClient>,
    pub chatbot: Arc<dyn ChatbotClient>,
}

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub signer: TokenSigner,
    pub otp: OtpService,
    /// SHA-256 of `ADMIN_TOKEN`; `None` disables the admin API.
    pub admin_token_hash: Option<String>,
    /// Recipient of new-club alerts.
    pub admin_email: Option<String>,
    pub email: Arc<dyn EmailClient>,
    pub storage: Arc<dyn StorageClient>,
    pub chatbot: Arc<dyn ChatbotClient>,
    pub media_public_url: String,
    pub cors_allowed_origins: Vec<String>,
    pub trust_proxy: bool,
    pub login_rate_limiter: Arc<IpRateLimiter>,
    /// Per-IP limit shared by OTP verify and resend.
    pub otp_rate_limiter: Arc<IpRateLimiter>,
    pub resend_rate_limiter: Arc<EmailRateLimiter>,
    pub chat_rate_limiter: Arc<IpRateLimiter>,
}

impl AppState {
    /// # Errors
    ///
    /// Returns an error if `TOKEN_SECRET` is missing or too short, or a TTL is
    /// out of range.
    pub fn new(db: sqlx::PgPool, config: &Config, services: Services) -> anyhow::Result<Self> {
        let secret = config
            .token_secret
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("TOKEN_SECRET is required"))?;
        let signer = TokenSigner::new(secret, config.token_ttl_secs)?;
        let otp = OtpService::new(signer.clone(), config.otp_ttl_secs)?;
        let limits = config.rate_limits;
        Ok(Self {
            db,
            signer,
            otp,
            admin_token_hash: config.admin_token.as_deref().map(hash_token),
            admin_email: config.admin_email.clone(),
            email: services.email,
            storage: services.storage,
            chatbot: services.chatbot,
            media_public_url: config.media_public_url.clone(),
            cors_allowed_origins: config.cors_allowed_origins.clone(),
            trust_proxy: config.trust_proxy,
            login_rate_limiter: Arc::new(IpRateLimiter::per_minute(limits.login_per_min)),
            otp_rate_limiter: Arc::new(IpRateLimiter::per_hour(limits.otp_per_hour)),
            resend_rate_limiter: Arc::new(EmailRateLimiter::per_hour(RESENDS_PER_HOUR)),
            chat_rate_limiter: Arc::new(IpRateLimiter::per_minute(limits.chat_per_min)),
        })
    }
}
