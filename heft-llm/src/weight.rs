//! Weight extraction: ask the model for a `{weight, found, sure}` object.
use crate::traits::{ChatMessage, LlmClient, LlmError};
use async_trait::async_trait;
use heft_common::WeightJudgment;
use std::sync::Arc;

/// System instruction sent with every judgment request.
pub const WEIGHT_SYSTEM_PROMPT: &str = r#"Find information about the weight of the item in my text.
RULE 1
answer with json {"weight": int64 IN GRAMS, "found": bool, true if the text contains the weight, "sure": bool, true if you are sure about the weight}
RULE 2
if the weight may be wrong, return "sure" as false
RULE 3
answer only with plain text json, without markdown markup"#;

#[async_trait]
pub trait WeightExtractor: Send + Sync {
    /// Judge whether `text` states the weight asked for by `query`.
    async fn find_weight(&self, text: &str, query: &str) -> Result<WeightJudgment, LlmError>;
}

/// [`WeightExtractor`] backed by any [`LlmClient`].
pub struct LlmWeightExtractor {
    llm: Arc<dyn LlmClient>,
}

impl LlmWeightExtractor {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl WeightExtractor for LlmWeightExtractor {
    async fn find_weight(&self, text: &str, query: &str) -> Result<WeightJudgment, LlmError> {
        let messages = [
            ChatMessage::system(WEIGHT_SYSTEM_PROMPT),
            ChatMessage::user(format!("{query}\n{text}")),
        ];
        let resp = self.llm.chat(&messages).await?;
        tracing::debug!(
            model = resp.model.as_deref().unwrap_or(self.llm.model_name()),
            tokens_used = ?resp.tokens_used,
            "weight.model_reply"
        );

        match resp.text {
            None => {
                tracing::debug!(model = self.llm.model_name(), "weight.no_choices");
                Ok(WeightJudgment::not_found())
            }
            Some(raw) => parse_judgment(&raw),
        }
    }
}

/// Strict parse: the model was told to emit bare JSON, so fenced or chatty
/// output is an error rather than something to repair.
fn parse_judgment(raw: &str) -> Result<WeightJudgment, LlmError> {
    serde_json::from_str::<WeightJudgment>(raw).map_err(|e| {
        tracing::warn!(error = %e, raw_len = raw.len(), "weight.parse_failed");
        LlmError::Parse {
            message: e.to_string(),
            raw: raw.to_string(),
        }
    })
}
