const DEFAULT_PORT: u16 = 8080;
const DEFAULT_TOKEN_TTL_SECS: u64 = 7 * 24 * 3600;
const DEFAULT_OTP_TTL_SECS: u64 = 600;
const DEFAULT_EMAIL_API_URL: &str = "https://api.brevo.com/v3/smtp/email";
const DEFAULT_CORS_ORIGINS: &str = "https://frontend-92cs.vercel.app,http://localhost:5173";

/// Per-IP request budgets for the endpoints that are abuse targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub login_per_min: u32,
    pub otp_per_hour: u32,
    pub chat_per_min: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            login_per_min: 10,
            otp_per_hour: 20,
            chat_per_min: 20,
        }
    }
}

pub struct Config {
    pub port: u16,
    pub database_url: Option<String>,
    /// When `false`, the server starts without applying migrations.
    pub run_migrations: bool,
    /// HMAC key for bearer tokens and stored OTP digests.
    pub token_secret: Option<String>,
    pub token_ttl_secs: u64,
    pub otp_ttl_secs: u64,
    pub admin_token: Option<String>,
    pub admin_email: Option<String>,
    pub email_api_url: String,
    pub email_api_key: Option<String>,
    pub email_sender: String,
    pub email_sender_name: String,
    pub chatbot_url: Option<String>,
    pub r2_bucket_name: Option<String>,
    pub r2_access_key_id: Option<String>,
    pub r2_secret_access_key: Option<String>,
    pub r2_endpoint: Option<String>,
    pub r2_account_id: Option<String>,
    pub media_public_url: String,
    pub cors_allowed_origins: Vec<String>,
    pub trust_proxy: bool,
    pub rate_limits: RateLimitConfig,
}

// Custom Debug masks secrets so the struct is safe to log.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_deref().map(|_| "<redacted>");
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("database_url", &redact(&self.database_url))
            .field("run_migrations", &self.run_migrations)
            .field("token_secret", &redact(&self.token_secret))
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("otp_ttl_secs", &self.otp_ttl_secs)
            .field("admin_token", &redact(&self.admin_token))
            .field("admin_email", &self.admin_email)
            .field("email_api_url", &self.email_api_url)
            .field("email_api_key", &redact(&self.email_api_key))
            .field("email_sender", &self.email_sender)
            .field("chatbot_url", &self.chatbot_url)
            .field("r2_bucket_name", &self.r2_bucket_name)
            .field("r2_access_key_id", &redact(&self.r2_access_key_id))
            .field("r2_secret_access_key", &redact(&self.r2_secret_access_key))
            .field("r2_endpoint", &self.r2_endpoint)
            .field("media_public_url", &self.media_public_url)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("trust_proxy", &self.trust_proxy)
            .field("rate_limits", &self.rate_limits)
            .finish_non_exhaustive()
    }
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name).map_or(default, |v| {
        !matches!(v.trim().to_lowercase().as_str(), "false" | "0" | "no" | "")
    })
}

/// Parse a positive number from `name`, warning and falling back on bad input.
fn env_num<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr + PartialEq + Default + Copy + std::fmt::Display,
{
    let Some(raw) = env_opt(name) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(v) if v != T::default() => v,
        _ => {
            tracing::warn!("{name}={raw:?} is not a valid positive number, defaulting to {default}");
            default
        }
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: None,
            run_migrations: true,
            token_secret: None,
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            otp_ttl_secs: DEFAULT_OTP_TTL_SECS,
            admin_token: None,
            admin_email: None,
            email_api_url: DEFAULT_EMAIL_API_URL.to_string(),
            email_api_key: None,
            email_sender: "no-reply@example.com".to_string(),
            email_sender_name: "Campus Clubs".to_string(),
            chatbot_url: None,
            r2_bucket_name: None,
            r2_access_key_id: None,
            r2_secret_access_key: None,
            r2_endpoint: None,
            r2_account_id: None,
            media_public_url: format!("http://localhost:{DEFAULT_PORT}/media"),
            cors_allowed_origins: split_origins(DEFAULT_CORS_ORIGINS),
            trust_proxy: false,
            rate_limits: RateLimitConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            port: env_num("PORT", d.port),
            database_url: env_opt("DATABASE_URL"),
            run_migrations: env_flag("RUN_MIGRATIONS", d.run_migrations),
            token_secret: env_opt("TOKEN_SECRET"),
            token_ttl_secs: env_num("TOKEN_TTL_SECS", d.token_ttl_secs),
            otp_ttl_secs: env_num("OTP_TTL_SECS", d.otp_ttl_secs),
            admin_token: env_opt("ADMIN_TOKEN"),
            admin_email: env_opt("ADMIN_EMAIL"),
            email_api_url: env_opt("EMAIL_API_URL").unwrap_or(d.email_api_url),
            email_api_key: env_opt("EMAIL_API_KEY"),
            email_sender: env_opt("EMAIL_SENDER").unwrap_or(d.email_sender),
            email_sender_name: env_opt("EMAIL_SENDER_NAME").unwrap_or(d.email_sender_name),
            chatbot_url: env_opt("CHATBOT_URL"),
            r2_bucket_name: env_opt("R2_BUCKET_NAME"),
            r2_access_key_id: env_opt("R2_ACCESS_KEY_ID"),
            r2_secret_access_key: env_opt("R2_SECRET_ACCESS_KEY"),
            r2_endpoint: env_opt("R2_ENDPOINT"),
            r2_account_id: env_opt("R2_ACCOUNT_ID"),
            media_public_url: env_opt("MEDIA_PUBLIC_URL")
                .map_or(d.media_public_url, |u| u.trim_end_matches('/').to_string()),
            cors_allowed_origins: env_opt("CORS_ALLOWED_ORIGINS")
                .map_or(d.cors_allowed_origins, |raw| split_origins(&raw)),
            trust_proxy: env_flag("TRUST_PROXY", d.trust_proxy),
            rate_limits: RateLimitConfig {
                login_per_min: env_num("RATE_LIMIT_LOGIN_PER_MIN", d.rate_limits.login_per_min),
                otp_per_hour: env_num("RATE_LIMIT_OTP_PER_HOUR", d.rate_limits.otp_per_hour),
                chat_per_min: env_num("RATE_LIMIT_CHAT_PER_MIN", d.rate_limits.chat_per_min),
            },
        }
    }

    /// Resolve the R2 endpoint: explicit `R2_ENDPOINT` wins, otherwise it is
    /// derived from `R2_ACCOUNT_ID`.
    pub fn r2_endpoint_url(&self) -> Option<String> {
        self.r2_endpoint.clone().or_else(|| {
            self.r2_account_id
                .as_ref()
                .map(|id| format!("https://{id}.r2.cloudflarestorage.com"))
        })
    }

    /// R2 is used only when a bucket is named; otherwise uploads fall back to
    /// the default media URLs.
    pub const fn r2_configured(&self) -> bool {
        self.r2_bucket_name.is_some()
    }
}
