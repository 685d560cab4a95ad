//! Baseline-relative scenario deltas and score labels.
//!
//! Every comparative claim about a scenario is made against the single
//! designated baseline of its set. Candidate-vs-candidate deltas are never
//! computed here; composing two baseline deltas is up to the caller.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use crate::{
  Error, Result,
  scenario::{ImpactRange, ScenarioItem},
};

// ─── Labels ──────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConfidenceLabel {
  Low,
  Medium,
  High,
}

impl ConfidenceLabel {
  /// `>= 0.8` high, `>= 0.6` medium, otherwise (including NaN) low.
  pub fn from_score(score: f64) -> Self {
    if score >= 0.8 {
      Self::High
    } else if score >= 0.6 {
      Self::Medium
    } else {
      Self::Low
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RiskLabel {
  Low,
  Medium,
  High,
}

impl RiskLabel {
  /// `>= 0.7` high, `>= 0.4` medium, otherwise (including NaN) low.
  pub fn from_score(score: f64) -> Self {
    if score >= 0.7 {
      Self::High
    } else if score >= 0.4 {
      Self::Medium
    } else {
      Self::Low
    }
  }
}

// ─── Delta values ────────────────────────────────────────────────────────────

/// Which way a tiered quantity moved relative to the baseline.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
  Down,
  Same,
  Up,
}

impl Direction {
  fn between<T: Ord>(baseline: T, candidate: T) -> Self {
    match candidate.cmp(&baseline) {
      Ordering::Less => Self::Down,
      Ordering::Equal => Self::Same,
      Ordering::Greater => Self::Up,
    }
  }
}

/// A scenario's position relative to the baseline of its set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeltaValues {
  pub revenue_impact_pct:  ImpactRange,
  /// Percentage points.
  pub churn_impact_pp:     ImpactRange,
  pub time_to_impact_days: ImpactRange,
  pub risk_delta:          Direction,
  pub effort_delta:        Direction,
}

impl DeltaValues {
  /// The sentinel carried by the baseline itself: no movement anywhere.
  pub const BASELINE: Self = Self {
    revenue_impact_pct:  ImpactRange::ZERO,
    churn_impact_pp:     ImpactRange::ZERO,
    time_to_impact_days: ImpactRange::ZERO,
    risk_delta:          Direction::Same,
    effort_delta:        Direction::Same,
  };

  pub fn is_baseline_sentinel(&self) -> bool { *self == Self::BASELINE }
}

impl Default for DeltaValues {
  fn default() -> Self { Self::BASELINE }
}

/// Compute `candidate` relative to `baseline`.
///
/// `baseline` must be the designated baseline of its set. Range deltas are
/// bound-by-bound differences; risk and effort compare label tiers, both
/// using the risk thresholds.
pub fn compute_scenario_delta(
  baseline: &ScenarioItem,
  candidate: &ScenarioItem,
) -> Result<DeltaValues> {
  if !baseline.is_baseline {
    return Err(Error::NotBaseline(baseline.scenario_id.clone()));
  }
  if candidate.scenario_id == baseline.scenario_id {
    return Ok(DeltaValues::BASELINE);
  }

  let (b, c) = (&baseline.metrics, &candidate.metrics);
  Ok(DeltaValues {
    revenue_impact_pct:  c.revenue_impact_pct.minus(b.revenue_impact_pct),
    churn_impact_pp:     c.churn_impact_pp.minus(b.churn_impact_pp),
    time_to_impact_days: c.time_to_impact_days.minus(b.time_to_impact_days),
    risk_delta:          Direction::between(
      RiskLabel::from_score(b.risk_score),
      RiskLabel::from_score(c.risk_score),
    ),
    effort_delta:        Direction::between(
      RiskLabel::from_score(b.effort_score),
      RiskLabel::from_score(c.effort_score),
    ),
  })
}
