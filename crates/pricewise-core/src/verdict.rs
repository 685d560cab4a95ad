//! Verdict: the recommendation produced by the inference collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  delta::{ConfidenceLabel, RiskLabel},
  learning::HistoricalSignal,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
  pub headline:           String,
  pub summary:            String,
  /// The recommended course of action, in prose.
  pub recommendation:     String,
  /// In `[0, 1]`.
  pub confidence_score:   f64,
  /// In `[0, 1]`.
  pub risk_score:         f64,
  #[serde(default)]
  pub rationale:          Vec<String>,
  /// Learning signals the generator was given.
  #[serde(default)]
  pub historical_signals: Vec<HistoricalSignal>,
  /// Identifier of the generator (model name, prompt version...).
  #[serde(default)]
  pub model:              Option<String>,
  pub generated_at:       DateTime<Utc>,
}

impl Verdict {
  pub fn confidence(&self) -> ConfidenceLabel {
    ConfidenceLabel::from_score(self.confidence_score)
  }

  pub fn risk(&self) -> RiskLabel { RiskLabel::from_score(self.risk_score) }

  /// Reject payloads that are structurally well-formed but unusable.
  pub fn validate(&self) -> Result<()> {
    if self.headline.trim().is_empty() {
      return Err(Error::invalid("verdict.headline", "must not be empty"));
    }
    for (field, score) in [
      ("verdict.confidence_score", self.confidence_score),
      ("verdict.risk_score", self.risk_score),
    ] {
      if !(0.0..=1.0).contains(&score) {
        return Err(Error::invalid(field, format!("{score} is outside [0, 1]")));
      }
    }
    Ok(())
  }
}
