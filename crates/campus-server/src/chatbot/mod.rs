pub mod http;
pub mod mock;

/// Question-answering backend behind `POST /api/chat/chat`.
#[async_trait::async_trait]
pub trait ChatbotClient: Send + Sync {
    async fn ask(&self, query: &str) -> Result<String, ChatbotError>;
}

#[derive(Debug)]
pub enum ChatbotError {
    /// No chatbot backend is configured.
    Unconfigured,
    Upstream(anyhow::Error),
}

impl std::fmt::Display for ChatbotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unconfigured => write!(f, "chatbot is not configured"),
            Self::Upstream(e) => write!(f, "chatbot request failed: {e}"),
        }
    }
}

impl std::error::Error for ChatbotError {}

impl From<reqwest::Error> for ChatbotError {
    fn from(err: reqwest::Error) -> Self {
        Self::Upstream(err.into())
    }
}

impl From<ChatbotError> for crate::error::AppError {
    fn from(err: ChatbotError) -> Self {
        match err {
            ChatbotError::Unconfigured => Self::Unavailable(err.to_string()),
            ChatbotError::Upstream(e) => Self::BadGateway(e.to_string()),
        }
    }
}

/// Placeholder used when `CHATBOT_URL` is unset.
pub struct UnconfiguredChatbot;

#[async_trait::async_trait]
impl ChatbotClient for UnconfiguredChatbot {
    async fn ask(&self, _query: &str) -> Result<String, ChatbotError> {
        Err(ChatbotError::Unconfigured)
    }
}
