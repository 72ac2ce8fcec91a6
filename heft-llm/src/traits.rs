use async_trait::async_trait;
use heft_http::HttpError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmResponse {
    /// Content of the first choice. `None` when the model returned no choices.
    pub text: Option<String>,
    pub model: Option<String>,
    pub tokens_used: Option<u32>,
}

#[derive(thiserror::Error, Debug)]
pub enum LlmError {
    #[error("network error: {0}")]
    Http(HttpError),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("could not parse model output: {message}; raw: {raw}")]
    Parse { message: String, raw: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<HttpError> for LlmError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Api {
                status, message, ..
            } => LlmError::Api {
                status: status.as_u16(),
                message,
            },
            other => LlmError::Http(other),
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Run one chat completion over the given conversation.
    async fn chat(&self, messages: &[ChatMessage]) -> Result<LlmResponse, LlmError>;

    /// Get the model name being used
    fn model_name(&self) -> &str;

    /// Single-turn convenience over [`LlmClient::chat`].
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Result<LlmResponse, LlmError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system_prompt {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));
        self.chat(&messages).await
    }

    /// Check if the LLM service answers at all.
    async fn health_check(&self) -> Result<bool, LlmError> {
        match self.generate("Respond with just 'OK'", None).await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!(model = self.model_name(), error = %e, "llm.health_check.failed");
                Ok(false)
            }
        }
    }
}
