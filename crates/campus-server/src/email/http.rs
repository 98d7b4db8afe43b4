use serde::Serialize;

use super::{EmailClient, EmailMessage};
use crate::config::Config;

#[derive(Debug, Serialize)]
struct Contact<'a> {
    email: &'a str,
    name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendRequest<'a> {
    sender: Contact<'a>,
    to: [Contact<'a>; 1],
    subject: &'a str,
    html_content: &'a str,
}

/// Client for a Brevo-compatible transactional email HTTP API.
pub struct HttpEmailClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    sender_email: String,
    sender_name: String,
}

impl std::fmt::Debug for HttpEmailClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEmailClient")
            .field("api_url", &self.api_url)
            .field("sender_email", &self.sender_email)
            .finish_non_exhaustive()
    }
}

impl HttpEmailClient {
    /// # Errors
    ///
    /// Returns an error if `EMAIL_API_KEY` is missing or the HTTP client
    /// cannot be built.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let api_key = config
            .email_api_key
            .clone()
            .ok_or_else(|| anyhow::anyhow!("EMAIL_API_KEY is required for email delivery"))?;
        let http = reqwest::Client::builder()
            .user_agent("campus-server")
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            api_url: config.email_api_url.clone(),
            api_key,
            sender_email: config.email_sender.clone(),
            sender_name: config.email_sender_name.clone(),
        })
    }

    fn request_body<'a>(&'a self, message: &'a EmailMessage) -> SendRequest<'a> {
        SendRequest {
            sender: Contact {
                email: &self.sender_email,
                name: &self.sender_name,
            },
            to: [Contact {
                email: &message.to,
                name: &message.to_name,
            }],
            subject: &message.subject,
            html_content: &message.html,
        }
    }
}

#[async_trait::async_trait]
impl EmailClient for HttpEmailClient {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
        self.http
            .post(&self.api_url)
            .header("api-key", &self.api_key)
            .header("Accept", "application/json")
            .json(&self.request_body(message))
            .send()
            .await?
            .error_for_status()?;
        tracing::debug!(to = %message.to, subject = %message.subject, "email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn config_with_key(key: Option<&str>) -> Config {
        let mut cfg = Config::default();
        cfg.email_api_key = key.map(ToString::to_string);
        cfg
    }

    #[test]
    fn new_requires_api_key() {
        let err = HttpEmailClient::new(&config_with_key(None)).unwrap_err();
        assert!(err.to_string().contains("EMAIL_API_KEY"));
    }

    #[test]
    fn request_body_matches_api_shape() {
        let client = HttpEmailClient::new(&config_with_key(Some("key"))).unwrap();
        let msg = EmailMessage {
            to: "asha@college.edu".to_string(),
            to_name: "Asha".to_string(),
            subject: "Your code".to_string(),
            html: "<p>123456</p>".to_string(),
        };
        let json = serde_json::to_value(client.request_body(&msg)).unwrap();
        assert_eq!(json["sender"]["email"], "no-reply@example.com");
        assert_eq!(json["to"][0]["email"], "asha@college.edu");
        assert_eq!(json["to"][0]["name"], "Asha");
        assert_eq!(json["subject"], "Your code");
        assert_eq!(json["htmlContent"], "<p>123456</p>");
    }

    #[test]
    fn debug_hides_api_key() {
        let client = HttpEmailClient::new(&config_with_key(Some("xkeysib-secret"))).unwrap();
        assert!(!format!("{client:?}").contains("xkeysib-secret"));
    }
}
