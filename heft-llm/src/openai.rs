use crate::traits::{ChatMessage, LlmClient, LlmError, LlmResponse};
use async_trait::async_trait;
use heft_http::{Auth, HttpClient, RequestOpts};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Client for any endpoint speaking the OpenAI chat-completions protocol
/// (OpenAI itself, Azure-style gateways, local servers).
pub struct OpenAiClient {
    client: HttpClient,
    api_key: String,
    model: String,
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: ChoiceMessage,
}

#[derive(Debug, Default, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: Option<u32>,
}

impl OpenAiClient {
    /// `endpoint` is the API base, e.g. `https://api.openai.com/v1`; requests
    /// go to `{endpoint}/chat/completions`.
    pub fn new(endpoint: &str, api_key: String, model: String) -> Result<Self, LlmError> {
        if model.trim().is_empty() {
            return Err(LlmError::Config("model must not be empty".into()));
        }
        let client = HttpClient::new(endpoint)
            .map_err(|e| LlmError::Config(format!("HttpClient init failed: {e}")))?;
        Ok(Self {
            client,
            api_key,
            model,
            temperature: None,
        })
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = self.client.with_timeout(timeout);
        self
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<LlmResponse, LlmError> {
        let req = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };
        let opts = RequestOpts {
            auth: Some(Auth::Bearer(&self.api_key)),
            ..Default::default()
        };

        tracing::debug!(model = %self.model, messages = messages.len(), "llm.chat.start");
        let resp: ChatCompletionResponse = self
            .client
            .post_json_opts("chat/completions", &req, opts)
            .await?;

        let text = resp
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default());
        tracing::debug!(
            model = %self.model,
            has_choice = text.is_some(),
            text_len = text.as_ref().map_or(0, String::len),
            "llm.chat.done"
        );

        Ok(LlmResponse {
            text,
            model: resp.model,
            tokens_used: resp.usage.and_then(|u| u.total_tokens),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_omits_unset_temperature() {
        let messages = [ChatMessage::system("s"), ChatMessage::user("u")];
        let req = ChatCompletionRequest {
            model: "m",
            messages: &messages,
            temperature: None,
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "model": "m",
                "messages": [
                    { "role": "system", "content": "s" },
                    { "role": "user", "content": "u" }
                ]
            })
        );
    }

    #[test]
    fn response_tolerates_missing_fields() {
        let resp: ChatCompletionResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.choices.is_empty());

        let resp: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant"}}]}"#).unwrap();
        assert_eq!(resp.choices.len(), 1);
        assert!(resp.choices[0].message.content.is_none());
    }

    #[test]
    fn empty_model_is_a_config_error() {
        let err = OpenAiClient::new("https://api.openai.com/v1", "k".into(), " ".into())
            .err()
            .unwrap();
        assert!(matches!(err, LlmError::Config(_)));
    }
}
