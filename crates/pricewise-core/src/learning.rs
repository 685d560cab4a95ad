//! Cross-decision learning.
//!
//! A batch job reads a point-in-time set of [`OutcomeRecord`]s, groups them by
//! `(company stage, primary KPI, scenario type)` and produces
//! [`OutcomeAggregate`]s. Aggregates become [`HistoricalSignal`]s that the
//! verdict generator uses to nudge its confidence.
//!
//! The computation is a pure function of the *set* of records: groups are
//! emitted in key order and deltas are summed in sorted order, so any
//! permutation of the input produces bit-identical output.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  context::{CompanyStage, PrimaryKpi},
  decision::Decision,
  delta::ConfidenceLabel,
  outcome::{MeasurableOutcome, OutcomeStatus},
  scenario::{ScenarioKind, ScenarioSet},
};

// ─── Input ───────────────────────────────────────────────────────────────────

/// One measured outcome, flattened for aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
  pub decision_id:   Uuid,
  pub company_stage: CompanyStage,
  pub primary_kpi:   PrimaryKpi,
  pub scenario_type: ScenarioKind,
  pub status:        OutcomeStatus,
  pub delta_percent: Option<f64>,
}

impl OutcomeRecord {
  /// Flatten a decision with its chosen scenario into one record.
  ///
  /// A recorded measurable outcome for the chosen scenario takes precedence.
  /// Otherwise the decision's current legacy outcome is used, resolved
  /// through its correction chain so a corrected entry never counts.
  ///
  /// Returns `None` for soft-deleted decisions, decisions without a chosen
  /// scenario, contexts missing the company stage or primary KPI, and when
  /// neither source holds a non-pending outcome.
  pub fn extract(
    decision: &Decision,
    set: &ScenarioSet,
    measurable: Option<&MeasurableOutcome>,
  ) -> Option<Self> {
    if decision.is_deleted {
      return None;
    }
    let chosen = decision.chosen_scenario_id.as_deref()?;
    let scenario = set.get(chosen)?;
    let context = decision.context.current();
    let company_stage = context.company_stage?;
    let primary_kpi = context.primary_kpi?;

    let (status, delta_percent) = measurable
      .filter(|o| o.status != OutcomeStatus::Pending && o.chosen_scenario_id == chosen)
      .map(|o| (o.status, measurable_delta(o, primary_kpi)))
      .or_else(|| {
        decision
          .current_outcome()
          .filter(|o| o.status != OutcomeStatus::Pending)
          .map(|o| (o.status, o.delta_percent))
      })?;

    Some(Self {
      decision_id: decision.decision_id,
      company_stage,
      primary_kpi,
      scenario_type: scenario.kind,
      status,
      delta_percent,
    })
  }
}

/// The primary KPI's percentage delta, or the mean over all KPIs that have
/// one.
fn measurable_delta(outcome: &MeasurableOutcome, primary_kpi: PrimaryKpi) -> Option<f64> {
  outcome
    .kpi(primary_kpi.as_ref())
    .and_then(|k| k.delta_pct)
    .or_else(|| sorted_mean(outcome.kpis.iter().filter_map(|k| k.delta_pct).collect()))
}

// ─── Output ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct GroupKey {
  company_stage: CompanyStage,
  primary_kpi:   PrimaryKpi,
  scenario_type: ScenarioKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeAggregate {
  pub company_stage: CompanyStage,
  pub primary_kpi:   PrimaryKpi,
  pub scenario_type: ScenarioKind,
  pub sample_size:   usize,
  pub success_rate:  f64,
  pub miss_rate:     f64,
  /// Mean of the records' `delta_percent`, over records that have one.
  pub average_delta: Option<f64>,
  pub confidence:    ConfidenceLabel,
}

/// `< 5` low, `5..=15` medium, `> 15` high.
pub fn confidence_for_sample(sample_size: usize) -> ConfidenceLabel {
  match sample_size {
    0..5 => ConfidenceLabel::Low,
    5..=15 => ConfidenceLabel::Medium,
    _ => ConfidenceLabel::High,
  }
}

fn sorted_mean(mut values: Vec<f64>) -> Option<f64> {
  if values.is_empty() {
    return None;
  }
  values.sort_by(f64::total_cmp);
  let sum: f64 = values.iter().sum();
  Some(sum / values.len() as f64)
}

#[derive(Default)]
struct Accumulator {
  count:    usize,
  achieved: usize,
  missed:   usize,
  deltas:   Vec<f64>,
}

/// Group `records` and compute one aggregate per group, in key order.
pub fn compute_learning_aggregates(records: &[OutcomeRecord]) -> Vec<OutcomeAggregate> {
  let mut groups: BTreeMap<GroupKey, Accumulator> = BTreeMap::new();

  for record in records {
    let key = GroupKey {
      company_stage: record.company_stage,
      primary_kpi:   record.primary_kpi,
      scenario_type: record.scenario_type,
    };
    let acc = groups.entry(key).or_default();
    acc.count += 1;
    match record.status {
      OutcomeStatus::Achieved => acc.achieved += 1,
      OutcomeStatus::Missed => acc.missed += 1,
      OutcomeStatus::Pending | OutcomeStatus::InProgress => {}
    }
    if let Some(delta) = record.delta_percent.filter(|d| d.is_finite()) {
      acc.deltas.push(delta);
    }
  }

  groups
    .into_iter()
    .map(|(key, acc)| {
      let count = acc.count as f64;
      OutcomeAggregate {
        company_stage: key.company_stage,
        primary_kpi:   key.primary_kpi,
        scenario_type: key.scenario_type,
        sample_size:   acc.count,
        success_rate:  acc.achieved as f64 / count,
        miss_rate:     acc.missed as f64 / count,
        average_delta: sorted_mean(acc.deltas),
        confidence:    confidence_for_sample(acc.count),
      }
    })
    .collect()
}

// ─── Signals ─────────────────────────────────────────────────────────────────

/// A learning signal handed to the verdict generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSignal {
  pub company_stage:    CompanyStage,
  pub primary_kpi:      PrimaryKpi,
  pub scenario_type:    ScenarioKind,
  pub sample_size:      usize,
  pub success_rate:     f64,
  pub miss_rate:        f64,
  pub average_delta:    Option<f64>,
  pub confidence:       ConfidenceLabel,
  /// Suggested adjustment to a verdict confidence score.
  pub confidence_boost: f64,
}

fn tier_weight(confidence: ConfidenceLabel) -> f64 {
  match confidence {
    ConfidenceLabel::Low => 0.0,
    ConfidenceLabel::Medium => 0.05,
    ConfidenceLabel::High => 0.10,
  }
}

impl From<&OutcomeAggregate> for HistoricalSignal {
  fn from(agg: &OutcomeAggregate) -> Self {
    Self {
      company_stage:    agg.company_stage,
      primary_kpi:      agg.primary_kpi,
      scenario_type:    agg.scenario_type,
      sample_size:      agg.sample_size,
      success_rate:     agg.success_rate,
      miss_rate:        agg.miss_rate,
      average_delta:    agg.average_delta,
      confidence:       agg.confidence,
      confidence_boost: tier_weight(agg.confidence)
        * (agg.success_rate - agg.miss_rate),
    }
  }
}

/// Adjust a confidence score by the mean boost of `signals`, clamped to
/// `[0, 1]`.
pub fn apply_signals(score: f64, signals: &[HistoricalSignal]) -> f64 {
  let boosts: Vec<f64> = signals.iter().map(|s| s.confidence_boost).collect();
  let boost = sorted_mean(boosts).unwrap_or(0.0);
  (score + boost).clamp(0.0, 1.0)
}

/// The output of one batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningSnapshot {
  pub snapshot_id: Uuid,
  pub computed_at: DateTime<Utc>,
  pub aggregates:  Vec<OutcomeAggregate>,
}

impl LearningSnapshot {
  pub fn compute(records: &[OutcomeRecord], now: DateTime<Utc>) -> Self {
    Self {
      snapshot_id: Uuid::new_v4(),
      computed_at: now,
      aggregates:  compute_learning_aggregates(records),
    }
  }

  /// Signals relevant to a decision with this stage and primary KPI, one per
  /// scenario type that has history.
  pub fn signals_for(
    &self,
    company_stage: CompanyStage,
    primary_kpi: PrimaryKpi,
  ) -> Vec<HistoricalSignal> {
    self
      .aggregates
      .iter()
      .filter(|a| a.company_stage == company_stage && a.primary_kpi == primary_kpi)
      .map(HistoricalSignal::from)
      .collect()
  }
}
