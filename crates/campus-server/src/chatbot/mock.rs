use std::sync::Mutex;

use super::{ChatbotClient, ChatbotError};

/// Canned chatbot for tests: echoes queries, or fails every call.
#[derive(Default)]
pub struct MockChatbot {
    failing: bool,
    queries: Mutex<Vec<String>>,
}

impl MockChatbot {
    pub fn echo() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait::async_trait]
impl ChatbotClient for MockChatbot {
    async fn ask(&self, query: &str) -> Result<String, ChatbotError> {
        self.queries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(query.to_string());
        if self.failing {
            return Err(ChatbotError::Upstream(anyhow::anyhow!(
                "simulated upstream failure"
            )));
        }
        Ok(format!("You asked: {query}"))
    }
}
