pub mod http;
pub mod mock;
pub mod templates;

use serde::Serialize;

/// A single transactional email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub to_name: String,
    pub subject: String,
    pub html: String,
}

/// Outbound email delivery.
#[async_trait::async_trait]
pub trait EmailClient: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()>;
}
