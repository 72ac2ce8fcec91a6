//! The search → extract → judge workflow.
//!
//! [`Orchestrator::run`] moves through three phases and stops at the first
//! page whose judgment says `found`:
//!
//! ```text
//! SEARCHING ──► EXTRACTING ──► JUDGING ──┬──► Found
//!                                         └──► NotFound (candidates exhausted)
//! ```
//!
//! Any phase can end the run with a [`PipelineError`] that names it.
mod orchestrator;

pub use orchestrator::{Orchestrator, PipelineSettings};

use heft_common::{Phase, WeightJudgment};
use heft_llm::traits::LlmError;
use heft_web::{ExtractError, SearchError};
use serde::Serialize;
use thiserror::Error;

/// How a run ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// The first candidate, in search-rank order, judged `found`.
    Found { url: String, judgment: WeightJudgment },
    /// Every candidate with text was judged and none had the weight.
    NotFound { judged: usize },
}

impl Outcome {
    pub fn judgment(&self) -> Option<&WeightJudgment> {
        match self {
            Outcome::Found { judgment, .. } => Some(judgment),
            Outcome::NotFound { .. } => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("searching failed: {0}")]
    Search(#[from] SearchError),

    #[error("extracting failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("judging {url} failed: {source}")]
    Judge {
        url: String,
        #[source]
        source: LlmError,
    },

    #[error("run cancelled while {phase}")]
    Cancelled { phase: Phase },
}

impl PipelineError {
    /// The phase the run was in when it failed.
    pub fn phase(&self) -> Phase {
        match self {
            PipelineError::Search(_) => Phase::Searching,
            PipelineError::Extract(_) => Phase::Extracting,
            PipelineError::Judge { .. } => Phase::Judging,
            PipelineError::Cancelled { phase } => *phase,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_serialises_with_a_tag() {
        let found = Outcome::Found {
            url: "https://a.example".into(),
            judgment: WeightJudgment {
                weight_grams: 900,
                found: true,
                confident: false,
            },
        };
        assert_eq!(
            serde_json::to_value(&found).unwrap(),
            serde_json::json!({
                "outcome": "found",
                "url": "https://a.example",
                "judgment": { "weight": 900, "found": true, "sure": false }
            })
        );
        assert_eq!(
            serde_json::to_value(Outcome::NotFound { judged: 2 }).unwrap(),
            serde_json::json!({ "outcome": "not_found", "judged": 2 })
        );
    }

    #[test]
    fn every_error_names_its_phase() {
        assert_eq!(
            PipelineError::from(SearchError::NoResults).phase(),
            Phase::Searching
        );
        let judge = PipelineError::Judge {
            url: "u".into(),
            source: LlmError::Config("x".into()),
        };
        assert_eq!(judge.phase(), Phase::Judging);
        assert!(judge.to_string().contains("judging u"));
        assert_eq!(
            PipelineError::Cancelled {
                phase: Phase::Extracting
            }
            .phase(),
            Phase::Extracting
        );
    }
}
