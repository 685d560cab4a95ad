//! Scenario sets: the four canonical alternatives generated for a decision.
//!
//! A set is produced by an external inference step and accepted here only if
//! it carries exactly one scenario per [`ScenarioKind`] and exactly one
//! baseline (the balanced scenario). Deltas of the other three are
//! recomputed against that baseline on acceptance.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator as _};
use uuid::Uuid;

use crate::{
  Error, Result,
  delta::{ConfidenceLabel, DeltaValues, RiskLabel, compute_scenario_delta},
};

// ─── Kinds ───────────────────────────────────────────────────────────────────

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
  EnumString,
  Display,
  AsRefStr,
  EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ScenarioKind {
  Aggressive,
  Balanced,
  Conservative,
  DoNothing,
}

// ─── Metrics ─────────────────────────────────────────────────────────────────

/// A `[low, high]` estimate. Bounds are kept as given; deltas are computed
/// bound by bound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpactRange {
  pub low:  f64,
  pub high: f64,
}

impl ImpactRange {
  pub const ZERO: Self = Self { low: 0.0, high: 0.0 };

  pub const fn new(low: f64, high: f64) -> Self { Self { low, high } }

  pub fn minus(self, other: Self) -> Self {
    Self { low: self.low - other.low, high: self.high - other.high }
  }

  pub fn midpoint(self) -> f64 { (self.low + self.high) / 2.0 }

  fn is_finite(self) -> bool { self.low.is_finite() && self.high.is_finite() }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioMetrics {
  pub revenue_impact_pct:  ImpactRange,
  /// Percentage points.
  pub churn_impact_pp:     ImpactRange,
  pub time_to_impact_days: ImpactRange,
  /// All scores are in `[0, 1]`.
  pub confidence_score:    f64,
  pub risk_score:          f64,
  pub effort_score:        f64,
}

impl ScenarioMetrics {
  pub fn confidence(&self) -> ConfidenceLabel {
    ConfidenceLabel::from_score(self.confidence_score)
  }

  pub fn risk(&self) -> RiskLabel { RiskLabel::from_score(self.risk_score) }

  fn validate(&self, scenario_id: &str) -> Result<()> {
    let ranges = [
      self.revenue_impact_pct,
      self.churn_impact_pp,
      self.time_to_impact_days,
    ];
    if !ranges.iter().all(|r| r.is_finite()) {
      return Err(Error::invalid(
        "metrics",
        format!("scenario {scenario_id:?} has a non-finite range"),
      ));
    }
    for (name, score) in [
      ("confidence_score", self.confidence_score),
      ("risk_score", self.risk_score),
      ("effort_score", self.effort_score),
    ] {
      if !(0.0..=1.0).contains(&score) {
        return Err(Error::invalid(
          "metrics",
          format!("scenario {scenario_id:?} {name} {score} is outside [0, 1]"),
        ));
      }
    }
    Ok(())
  }
}

// ─── Items ───────────────────────────────────────────────────────────────────

/// A narrative block shown alongside a scenario (rationale, risks, steps...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailBlock {
  pub title: String,
  #[serde(default)]
  pub items: Vec<String>,
}

/// A KPI the scenario commits to moving. Seeds the measurable outcome when
/// the scenario is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiTarget {
  pub key:        String,
  pub unit:       String,
  pub target:     f64,
  #[serde(default)]
  pub confidence: Option<ConfidenceLabel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioItem {
  pub scenario_id: String,
  pub kind:        ScenarioKind,
  pub title:       String,
  pub summary:     String,
  #[serde(default)]
  pub is_baseline: bool,
  pub metrics:     ScenarioMetrics,
  /// Relative to the set's baseline. The baseline carries
  /// [`DeltaValues::BASELINE`].
  #[serde(default)]
  pub deltas:      DeltaValues,
  #[serde(default)]
  pub details:     Vec<DetailBlock>,
  #[serde(default)]
  pub kpi_targets: Vec<KpiTarget>,
}

// ─── Sets ────────────────────────────────────────────────────────────────────

/// Input to [`crate::store::DecisionStore::accept_scenario_set`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewScenarioSet {
  pub scenarios:    Vec<ScenarioItem>,
  /// Identifier of the generator (model name, prompt version...).
  #[serde(default)]
  pub generated_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSet {
  pub scenario_set_id: Uuid,
  pub decision_id:     Uuid,
  pub scenarios:       Vec<ScenarioItem>,
  pub generated_by:    Option<String>,
  pub created_at:      DateTime<Utc>,
}

impl ScenarioSet {
  /// Validate generated scenarios and build a set for `decision_id`.
  ///
  /// Shape violations (count, kinds, ids, baseline) are
  /// [`Error::InvalidScenarioSet`]; out-of-range metrics are validation
  /// errors.
  pub fn accept(
    decision_id: Uuid,
    input: NewScenarioSet,
    now: DateTime<Utc>,
  ) -> Result<Self> {
    let NewScenarioSet { mut scenarios, generated_by } = input;

    let expected = ScenarioKind::iter().count();
    if scenarios.len() != expected {
      return Err(Error::InvalidScenarioSet(format!(
        "expected {expected} scenarios, got {}",
        scenarios.len()
      )));
    }

    let kinds: HashSet<ScenarioKind> = scenarios.iter().map(|s| s.kind).collect();
    if let Some(missing) = ScenarioKind::iter().find(|k| !kinds.contains(k)) {
      return Err(Error::InvalidScenarioSet(format!(
        "missing a {missing} scenario"
      )));
    }

    let mut ids = HashSet::new();
    for scenario in &scenarios {
      if scenario.scenario_id.trim().is_empty() {
        return Err(Error::InvalidScenarioSet(
          "scenario id must not be empty".to_owned(),
        ));
      }
      if !ids.insert(scenario.scenario_id.as_str()) {
        return Err(Error::InvalidScenarioSet(format!(
          "duplicate scenario id {:?}",
          scenario.scenario_id
        )));
      }
      scenario.metrics.validate(&scenario.scenario_id)?;
    }

    let baselines: Vec<&ScenarioItem> =
      scenarios.iter().filter(|s| s.is_baseline).collect();
    let baseline = match baselines.as_slice() {
      [only] => (*only).clone(),
      other => {
        return Err(Error::InvalidScenarioSet(format!(
          "expected exactly one baseline, found {}",
          other.len()
        )));
      }
    };
    if baseline.kind != ScenarioKind::Balanced {
      return Err(Error::InvalidScenarioSet(format!(
        "baseline must be the balanced scenario, not {}",
        baseline.kind
      )));
    }
    if !baseline.deltas.is_baseline_sentinel() {
      return Err(Error::InvalidScenarioSet(
        "baseline deltas must all be zero/same".to_owned(),
      ));
    }

    for scenario in scenarios.iter_mut().filter(|s| !s.is_baseline) {
      scenario.deltas = compute_scenario_delta(&baseline, scenario)?;
    }

    Ok(Self {
      scenario_set_id: Uuid::new_v4(),
      decision_id,
      scenarios,
      generated_by,
      created_at: now,
    })
  }

  pub fn get(&self, scenario_id: &str) -> Option<&ScenarioItem> {
    self.scenarios.iter().find(|s| s.scenario_id == scenario_id)
  }

  pub fn baseline(&self) -> Option<&ScenarioItem> {
    self.scenarios.iter().find(|s| s.is_baseline)
  }

  /// Delta of `scenario_id` against this set's baseline.
  pub fn delta_for(&self, scenario_id: &str) -> Result<DeltaValues> {
    let candidate = self
      .get(scenario_id)
      .ok_or_else(|| Error::UnknownScenario(scenario_id.to_owned()))?;
    let baseline = self.baseline().ok_or_else(|| {
      Error::InvalidScenarioSet("set has no baseline".to_owned())
    })?;
    compute_scenario_delta(baseline, candidate)
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use chrono::TimeZone;

  use super::*;
  use crate::{
    delta::Direction,
    error::{Classify, ErrorKind},
  };

  /// A scenario fixture. The balanced baseline reads revenue 5..10,
  /// churn 0.5..1, time 30..60 days, risk/effort 0.5.
  pub(crate) fn item(id: &str, kind: ScenarioKind, is_baseline: bool) -> ScenarioItem {
    let (revenue, risk) = match kind {
      ScenarioKind::Aggressive => (ImpactRange::new(12.0, 30.0), 0.8),
      ScenarioKind::Balanced => (ImpactRange::new(5.0, 10.0), 0.5),
      ScenarioKind::Conservative => (ImpactRange::new(2.0, 4.0), 0.2),
      ScenarioKind::DoNothing => (ImpactRange::ZERO, 0.1),
    };
    ScenarioItem {
      scenario_id: id.to_owned(),
      kind,
      title: format!("{kind} path"),
      summary: format!("The {kind} option"),
      is_baseline,
      metrics: ScenarioMetrics {
        revenue_impact_pct: revenue,
        churn_impact_pp: ImpactRange::new(0.5, 1.0),
        time_to_impact_days: ImpactRange::new(30.0, 60.0),
        confidence_score: 0.7,
        risk_score: risk,
        effort_score: 0.5,
      },
      deltas: DeltaValues::BASELINE,
      details: vec![DetailBlock {
        title: "Steps".into(),
        items: vec!["Announce".into(), "Roll out".into()],
      }],
      kpi_targets: vec![
        KpiTarget { key: "mrr".into(), unit: "usd".into(), target: 12_000.0, confidence: None },
        KpiTarget { key: "churn".into(), unit: "pct".into(), target: 3.0, confidence: None },
        KpiTarget { key: "arpu".into(), unit: "usd".into(), target: 55.0, confidence: None },
      ],
    }
  }

  pub(crate) fn four_scenarios() -> Vec<ScenarioItem> {
    vec![
      item("aggressive", ScenarioKind::Aggressive, false),
      item("balanced", ScenarioKind::Balanced, true),
      item("conservative", ScenarioKind::Conservative, false),
      item("do_nothing", ScenarioKind::DoNothing, false),
    ]
  }

  fn now() -> DateTime<Utc> { Utc.timestamp_opt(1_700_000_000, 0).unwrap() }

  fn accept(scenarios: Vec<ScenarioItem>) -> Result<ScenarioSet> {
    ScenarioSet::accept(
      Uuid::nil(),
      NewScenarioSet { scenarios, generated_by: None },
      now(),
    )
  }

  #[test]
  fn accepts_canonical_set_and_recomputes_deltas() {
    let set = accept(four_scenarios()).unwrap();
    assert_eq!(set.scenarios.len(), 4);
    assert_eq!(set.baseline().unwrap().scenario_id, "balanced");

    let aggressive = set.get("aggressive").unwrap();
    assert_eq!(aggressive.deltas.revenue_impact_pct, ImpactRange::new(7.0, 20.0));
    assert_eq!(aggressive.deltas.risk_delta, Direction::Up);

    let conservative = set.get("conservative").unwrap();
    assert_eq!(conservative.deltas.risk_delta, Direction::Down);
    assert!(set.get("balanced").unwrap().deltas.is_baseline_sentinel());
  }

  #[test]
  fn rejects_missing_baseline() {
    let mut scenarios = four_scenarios();
    scenarios[1].is_baseline = false;
    let err = accept(scenarios).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
  }

  #[test]
  fn rejects_two_baselines() {
    let mut scenarios = four_scenarios();
    scenarios[2].is_baseline = true;
    let err = accept(scenarios).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
  }

  #[test]
  fn rejects_non_balanced_baseline() {
    let mut scenarios = four_scenarios();
    scenarios[1].is_baseline = false;
    scenarios[2].is_baseline = true;
    assert!(matches!(accept(scenarios), Err(Error::InvalidScenarioSet(_))));
  }

  #[test]
  fn rejects_baseline_with_non_sentinel_deltas() {
    let mut scenarios = four_scenarios();
    scenarios[1].deltas.risk_delta = Direction::Up;
    assert!(matches!(accept(scenarios), Err(Error::InvalidScenarioSet(_))));
  }

  #[test]
  fn rejects_wrong_count_and_duplicate_kinds() {
    let mut three = four_scenarios();
    three.pop();
    assert!(matches!(accept(three), Err(Error::InvalidScenarioSet(_))));

    let mut dup = four_scenarios();
    dup[3] = item("aggressive_2", ScenarioKind::Aggressive, false);
    assert!(matches!(accept(dup), Err(Error::InvalidScenarioSet(_))));
  }

  #[test]
  fn rejects_duplicate_ids() {
    let mut scenarios = four_scenarios();
    scenarios[3].scenario_id = "aggressive".into();
    assert!(matches!(accept(scenarios), Err(Error::InvalidScenarioSet(_))));
  }

  #[test]
  fn rejects_out_of_range_scores() {
    let mut scenarios = four_scenarios();
    scenarios[0].metrics.risk_score = 1.4;
    let err = accept(scenarios).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
  }

  #[test]
  fn delta_for_unknown_scenario_is_validation() {
    let set = accept(four_scenarios()).unwrap();
    let err = set.delta_for("moonshot").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
  }
}
