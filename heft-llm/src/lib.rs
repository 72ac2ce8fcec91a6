//! Language-model integration for heft.
//!
//! [`traits::LlmClient`] is the provider seam; [`openai::OpenAiClient`] speaks
//! the OpenAI chat-completions protocol to whatever endpoint is configured.
//! [`weight::LlmWeightExtractor`] turns page text into a
//! [`heft_common::WeightJudgment`].
//!
//! # Examples
//! ```no_run
//! use heft_llm::{ensure_llm_ready, LlmSettings};
//! use std::time::Duration;
//!
//! # async fn demo() -> Result<(), heft_llm::traits::LlmError> {
//! let client = ensure_llm_ready(LlmSettings {
//!     endpoint: "https://api.openai.com/v1".into(),
//!     token: "sk-...".into(),
//!     model: "gpt-4o-mini".into(),
//!     temperature: None,
//!     timeout: Duration::from_secs(60),
//!     health_check: true,
//! })
//! .await?;
//! assert_eq!(client.model_name(), "gpt-4o-mini");
//! # Ok(())
//! # }
//! ```
pub mod openai;
pub mod traits;
pub mod weight;

use openai::OpenAiClient;
use std::sync::Arc;
use std::time::Duration;
use traits::{LlmClient, LlmError};

pub use weight::{LlmWeightExtractor, WeightExtractor};

/// Everything needed to reach the completion endpoint.
#[derive(Clone)]
pub struct LlmSettings {
    pub endpoint: String,
    pub token: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub timeout: Duration,
    /// Probe the endpoint before handing the client out.
    pub health_check: bool,
}

/// Build the configured client, optionally failing fast when the endpoint
/// does not answer.
pub async fn ensure_llm_ready(settings: LlmSettings) -> Result<Arc<dyn LlmClient>, LlmError> {
    let client = OpenAiClient::new(&settings.endpoint, settings.token, settings.model)?
        .with_temperature(settings.temperature)
        .with_timeout(settings.timeout);

    if settings.health_check && !client.health_check().await? {
        return Err(LlmError::Config(format!(
            "model endpoint {} did not answer the health check",
            settings.endpoint
        )));
    }
    Ok(Arc::new(client))
}
