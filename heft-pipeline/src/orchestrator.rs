use crate::{Outcome, PipelineError};
use heft_common::{ExtractedText, JudgmentErrorPolicy, Phase};
use heft_llm::WeightExtractor;
use heft_web::{ContentExtractor, SearchProvider};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// URLs requested from the search provider.
    pub candidates: usize,
    pub on_judgment_error: JudgmentErrorPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            candidates: 5,
            on_judgment_error: JudgmentErrorPolicy::Abort,
        }
    }
}

/// Composes the three services into one short-circuiting run. Holds no
/// per-run state; one instance can serve any number of sequential runs.
pub struct Orchestrator {
    search: Arc<dyn SearchProvider>,
    extractor: Arc<dyn ContentExtractor>,
    judge: Arc<dyn WeightExtractor>,
    settings: PipelineSettings,
}

impl Orchestrator {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        extractor: Arc<dyn ContentExtractor>,
        judge: Arc<dyn WeightExtractor>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            search,
            extractor,
            judge,
            settings,
        }
    }

    /// Run the whole workflow for `query`. Firing `cancel` ends the run in
    /// whichever phase it is in.
    pub async fn run(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Outcome, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("pipeline.run", %run_id);
        self.run_phases(query, cancel).instrument(span).await
    }

    async fn run_phases(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Outcome, PipelineError> {
        let started = Instant::now();

        tracing::info!(phase = %Phase::Searching, query = %query, limit = self.settings.candidates, "pipeline.phase");
        let urls = guarded(
            Phase::Searching,
            cancel,
            self.search.search(query, self.settings.candidates, cancel),
        )
        .await??;
        tracing::info!(candidates = urls.len(), "pipeline.search.done");
        if urls.is_empty() {
            tracing::info!(elapsed_ms = started.elapsed().as_millis() as u64, "pipeline.not_found");
            return Ok(Outcome::NotFound { judged: 0 });
        }

        tracing::info!(phase = %Phase::Extracting, urls = urls.len(), "pipeline.phase");
        let texts = guarded(Phase::Extracting, cancel, self.extractor.extract(&urls)).await??;
        tracing::info!(pages = texts.len(), "pipeline.extract.done");

        tracing::info!(phase = %Phase::Judging, pages = texts.len(), "pipeline.phase");
        let outcome = self.judge_in_rank_order(query, &urls, &texts, cancel).await?;
        tracing::info!(
            found = matches!(outcome, Outcome::Found { .. }),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "pipeline.done"
        );
        Ok(outcome)
    }

    async fn judge_in_rank_order(
        &self,
        query: &str,
        urls: &[String],
        texts: &ExtractedText,
        cancel: &CancellationToken,
    ) -> Result<Outcome, PipelineError> {
        let mut seen = HashSet::new();
        let mut judged = 0;

        for (rank, url) in urls.iter().enumerate() {
            if !seen.insert(url.as_str()) {
                continue;
            }
            let Some(text) = texts.get(url) else {
                tracing::debug!(rank, url = %url, "pipeline.candidate.no_text");
                continue;
            };

            let verdict =
                guarded(Phase::Judging, cancel, self.judge.find_weight(text, query)).await?;
            judged += 1;

            match verdict {
                Ok(judgment) if judgment.found => {
                    tracing::info!(
                        rank,
                        url = %url,
                        weight_grams = judgment.weight_grams,
                        confident = judgment.confident,
                        "pipeline.candidate.found"
                    );
                    if judgment.is_weak() {
                        tracing::warn!(url = %url, "pipeline.candidate.weak_evidence");
                    }
                    return Ok(Outcome::Found {
                        url: url.clone(),
                        judgment,
                    });
                }
                Ok(_) => tracing::info!(rank, url = %url, "pipeline.candidate.not_found"),
                Err(source) => match self.settings.on_judgment_error {
                    JudgmentErrorPolicy::Abort => {
                        tracing::error!(url = %url, error = %source, "pipeline.judge.failed");
                        return Err(PipelineError::Judge {
                            url: url.clone(),
                            source,
                        });
                    }
                    JudgmentErrorPolicy::Skip => {
                        tracing::warn!(url = %url, error = %source, "pipeline.judge.skipped");
                    }
                },
            }
        }

        tracing::info!(judged, "pipeline.not_found");
        Ok(Outcome::NotFound { judged })
    }
}

/// Race `work` against `cancel`; cancellation wins ties.
async fn guarded<F: Future>(
    phase: Phase,
    cancel: &CancellationToken,
    work: F,
) -> Result<F::Output, PipelineError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::warn!(%phase, "pipeline.cancelled");
            Err(PipelineError::Cancelled { phase })
        }
        out = work => Ok(out),
    }
}
