//! Types and utilities shared across the heft crates.
//!
//! Everything a single pipeline run produces lives here so that the leaf
//! crates (`heft-web`, `heft-llm`) and the orchestrator agree on one data
//! model without depending on each other.
//!
//! - [`WeightJudgment`]: the model's structured answer for one page
//! - [`ExtractedText`]: cleaned page text keyed by URL
//! - [`Phase`]: the orchestrator phase an event or error belongs to
//! - [`JudgmentErrorPolicy`]: what a failed judgment does to the run
//! - [`observability`]: centralised tracing/logging initialisation
//!
//! # Examples
//!
//! ```rust
//! use heft_common::WeightJudgment;
//!
//! let none = WeightJudgment::default();
//! assert!(!none.found);
//! assert_eq!(none.weight_grams, 0);
//! assert!(!none.is_weak());
//! ```
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub mod observability;

/// Cleaned plain text keyed by the URL it was fetched from.
///
/// A URL missing from the map failed to fetch or produced no usable text.
/// That is not an error; the orchestrator simply skips it.
pub type ExtractedText = HashMap<String, String>;

/// Structured weight answer for one candidate page.
///
/// Serialises with the wire names the model is asked to emit
/// (`weight`, `found`, `sure`). Missing fields decode as their zero value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightJudgment {
    /// Weight in grams. Meaningless (0 by convention) when `found` is false.
    #[serde(rename = "weight")]
    pub weight_grams: i64,
    pub found: bool,
    /// Whether the model vouches for the value.
    #[serde(rename = "sure")]
    pub confident: bool,
}

impl WeightJudgment {
    /// The "no evidence" judgment.
    pub const fn not_found() -> Self {
        Self {
            weight_grams: 0,
            found: false,
            confident: false,
        }
    }

    /// A value was extracted but the model flags it as untrustworthy.
    pub fn is_weak(&self) -> bool {
        self.found && !self.confident
    }
}

/// Orchestrator phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Searching,
    Extracting,
    Judging,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Searching => "searching",
            Phase::Extracting => "extracting",
            Phase::Judging => "judging",
        };
        f.write_str(name)
    }
}

/// What the orchestrator does when judging one candidate fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JudgmentErrorPolicy {
    /// Fail the whole run.
    #[default]
    Abort,
    /// Log the failure and move on to the next candidate.
    Skip,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn judgment_uses_model_wire_names() {
        let j = WeightJudgment {
            weight_grams: 1530,
            found: true,
            confident: false,
        };
        let v = serde_json::to_value(j).unwrap();
        assert_eq!(
            v,
            serde_json::json!({ "weight": 1530, "found": true, "sure": false })
        );
        assert!(j.is_weak());
    }

    #[test]
    fn default_is_not_found() {
        assert_eq!(WeightJudgment::default(), WeightJudgment::not_found());
    }

    #[test]
    fn judgment_error_policy_defaults_to_abort() {
        assert_eq!(JudgmentErrorPolicy::default(), JudgmentErrorPolicy::Abort);
        let skip: JudgmentErrorPolicy = serde_json::from_str("\"skip\"").unwrap();
        assert_eq!(skip, JudgmentErrorPolicy::Skip);
    }

    #[test]
    fn phase_display_is_lowercase() {
        assert_eq!(Phase::Extracting.to_string(), "extracting");
    }
}
