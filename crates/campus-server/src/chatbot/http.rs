use serde::Deserialize;
use serde_json::json;

use super::{ChatbotClient, ChatbotError};

/// Reply body of the chatbot service. Deployed versions have used each of
/// these field names.
#[derive(Debug, Deserialize)]
struct ChatReply {
    response: Option<String>,
    reply: Option<String>,
    answer: Option<String>,
}

impl ChatReply {
    fn into_text(self) -> Option<String> {
        self.response.or(self.reply).or(self.answer)
    }
}

#[derive(Debug)]
pub struct HttpChatbotClient {
    http: reqwest::Client,
    url: String,
}

impl HttpChatbotClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("campus-server")
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            url: url.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl ChatbotClient for HttpChatbotClient {
    async fn ask(&self, query: &str) -> Result<String, ChatbotError> {
        let reply: ChatReply = self
            .http
            .post(&self.url)
            .json(&json!({ "query": query }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        reply
            .into_text()
            .ok_or_else(|| ChatbotError::Upstream(anyhow::anyhow!("chatbot reply had no text")))
    }
}
