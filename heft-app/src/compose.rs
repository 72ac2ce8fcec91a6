use anyhow::{Context, Result};
use heft_config::HeftConfig;
use heft_llm::{LlmSettings, LlmWeightExtractor, ensure_llm_ready};
use heft_pipeline::{Orchestrator, PipelineSettings};
use heft_runtime::{Quota, Throttle};
use heft_web::{BraveSearch, PageExtractor, PageExtractorConfig};
use std::sync::Arc;

/// Knobs that come from the command line rather than the config file.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub candidates: Option<usize>,
    pub health_check: bool,
}

/// Wire every service from a validated config into one [`Orchestrator`].
pub async fn build_from_config(cfg: &HeftConfig, overrides: Overrides) -> Result<Orchestrator> {
    // One throttle per search token; every clone of the provider shares it.
    let quota = Quota::new(cfg.search.rate.qps, cfg.search.rate.burst)
        .context("search.rate is not a usable quota")?;
    let throttle = Arc::new(Throttle::new(quota));
    let search = BraveSearch::new(&cfg.search.endpoint, &cfg.search.token, throttle)
        .context("building the search client")?;

    let extractor = PageExtractor::new(PageExtractorConfig {
        concurrency: cfg.scraper.concurrency,
        timeout: cfg.scraper.timeout(),
        user_agent: cfg.scraper.user_agent.clone(),
    })
    .context("building the page fetcher")?;

    let llm = ensure_llm_ready(LlmSettings {
        endpoint: cfg.llm.endpoint.clone(),
        token: cfg.llm.token.clone(),
        model: cfg.llm.model.clone(),
        temperature: cfg.llm.temperature,
        timeout: cfg.llm.timeout(),
        health_check: overrides.health_check,
    })
    .await
    .context("preparing the language model")?;
    tracing::info!(model = %llm.model_name(), endpoint = %cfg.llm.endpoint, "app.llm.ready");

    let settings = PipelineSettings {
        candidates: overrides.candidates.unwrap_or(cfg.pipeline.candidates).max(1),
        on_judgment_error: cfg.pipeline.on_judgment_error,
    };

    Ok(Orchestrator::new(
        Arc::new(search),
        Arc::new(extractor),
        Arc::new(LlmWeightExtractor::new(llm)),
        settings,
    ))
}
