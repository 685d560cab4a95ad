//! Outcome tracking.
//!
//! Two shapes coexist:
//!
//! - [`MeasurableOutcome`]: a separate document seeded when a scenario is
//!   applied, holding per-KPI baseline/target/actual values.
//! - [`Outcome`]: the legacy inline entries on a decision. They are
//!   append-only; a revision is expressed as a *correction* entry that points
//!   at the entry it corrects. Nothing is ever removed or edited.
//!
//! The "current" legacy outcome is resolved at read time by
//! [`current_outcome`]: the latest entry, by `recorded_at`, that no other
//! entry corrects.

use std::{collections::HashSet, ops::RangeInclusive};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

use crate::{
  Error, Result,
  context::DecisionContext,
  delta::ConfidenceLabel,
  scenario::ScenarioItem,
};

/// Horizon used when the chosen scenario gives no usable time-to-impact.
pub const DEFAULT_HORIZON_DAYS: u32 = 90;

// ─── Plan tier ───────────────────────────────────────────────────────────────

/// Billing plan of the account, supplied by the caller. Only consulted to
/// gate KPI tracking.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  EnumString,
  Display,
  AsRefStr,
  EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PlanTier {
  Starter,
  Growth,
  Enterprise,
}

impl PlanTier {
  /// Allowed number of tracked KPIs, or `None` when the plan has no KPI
  /// tracking at all.
  pub fn kpi_range(self) -> Option<RangeInclusive<usize>> {
    match self {
      Self::Starter => None,
      Self::Growth | Self::Enterprise => Some(3..=6),
    }
  }

  pub fn validate_kpi_count(self, count: usize) -> Result<()> {
    match self.kpi_range() {
      None if count == 0 => Ok(()),
      None => Err(Error::KpiTrackingUnavailable(self)),
      Some(range) if range.contains(&count) => Ok(()),
      Some(_) => Err(Error::KpiCount { plan: self, count }),
    }
  }
}

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
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
pub enum OutcomeStatus {
  #[default]
  Pending,
  InProgress,
  Achieved,
  Missed,
}

// ─── KPIs ────────────────────────────────────────────────────────────────────

/// `(delta, delta_pct)` for a KPI. Both are `None` without an actual;
/// `delta_pct` is also `None` when the baseline is zero.
pub fn kpi_delta(baseline: f64, actual: Option<f64>) -> (Option<f64>, Option<f64>) {
  let Some(actual) = actual else {
    return (None, None);
  };
  let delta = actual - baseline;
  let delta_pct = (baseline != 0.0).then(|| delta / baseline * 100.0);
  (Some(delta), delta_pct)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kpi {
  pub key:        String,
  pub unit:       String,
  pub baseline:   f64,
  pub target:     f64,
  pub actual:     Option<f64>,
  pub delta:      Option<f64>,
  pub delta_pct:  Option<f64>,
  pub confidence: ConfidenceLabel,
}

impl Kpi {
  /// Recompute `delta` and `delta_pct` from `baseline` and `actual`.
  pub fn recompute(&mut self) {
    (self.delta, self.delta_pct) = kpi_delta(self.baseline, self.actual);
  }
}

/// A KPI as supplied by the caller of [`MeasurableOutcome::apply_update`].
/// Deltas are always derived, never accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct KpiInput {
  pub key:        String,
  pub unit:       String,
  pub baseline:   f64,
  pub target:     f64,
  #[serde(default)]
  pub actual:     Option<f64>,
  #[serde(default)]
  pub confidence: Option<ConfidenceLabel>,
}

impl KpiInput {
  fn into_kpi(self) -> Result<Kpi> {
    if self.key.trim().is_empty() {
      return Err(Error::invalid("kpis", "KPI key must not be empty"));
    }
    let finite = self.baseline.is_finite()
      && self.target.is_finite()
      && self.actual.is_none_or(f64::is_finite);
    if !finite {
      return Err(Error::invalid(
        "kpis",
        format!("KPI {:?} has a non-finite value", self.key),
      ));
    }
    let mut kpi = Kpi {
      key:        self.key,
      unit:       self.unit,
      baseline:   self.baseline,
      target:     self.target,
      actual:     self.actual,
      delta:      None,
      delta_pct:  None,
      confidence: self.confidence.unwrap_or(ConfidenceLabel::Medium),
    };
    kpi.recompute();
    Ok(kpi)
  }
}

// ─── Measurable outcome ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurableOutcome {
  pub outcome_id:         Uuid,
  pub decision_id:        Uuid,
  pub chosen_scenario_id: String,
  pub status:             OutcomeStatus,
  pub horizon_days:       u32,
  pub kpis:               Vec<Kpi>,
  #[serde(default)]
  pub evidence_links:     Vec<String>,
  pub notes:              Option<String>,
  /// Optimistic-concurrency token; bumped on every stored update.
  pub revision:           u64,
  pub created_at:         DateTime<Utc>,
  pub updated_at:         DateTime<Utc>,
}

/// Input to [`crate::store::DecisionStore::update_outcome`].
#[derive(Debug, Clone, Deserialize)]
pub struct OutcomeUpdate {
  pub status:         OutcomeStatus,
  #[serde(default)]
  pub kpis:           Vec<KpiInput>,
  #[serde(default)]
  pub notes:          Option<String>,
  #[serde(default)]
  pub evidence_links: Vec<String>,
}

impl MeasurableOutcome {
  /// A pending outcome for `scenario`: one KPI per scenario target, with the
  /// baseline taken from the context's current metrics (0 when unknown).
  pub fn seed(
    decision_id: Uuid,
    scenario: &ScenarioItem,
    context: &DecisionContext,
    now: DateTime<Utc>,
  ) -> Self {
    let kpis = scenario
      .kpi_targets
      .iter()
      .map(|target| {
        let mut kpi = Kpi {
          key:        target.key.clone(),
          unit:       target.unit.clone(),
          baseline:   context.metric(&target.key).unwrap_or(0.0),
          target:     target.target,
          actual:     None,
          delta:      None,
          delta_pct:  None,
          confidence: target
            .confidence
            .unwrap_or_else(|| scenario.metrics.confidence()),
        };
        kpi.recompute();
        kpi
      })
      .collect();

    let horizon = scenario.metrics.time_to_impact_days.high;
    let horizon_days = if horizon.is_finite() && horizon >= 1.0 {
      horizon.ceil().min(f64::from(u32::MAX)) as u32
    } else {
      DEFAULT_HORIZON_DAYS
    };

    Self {
      outcome_id: Uuid::new_v4(),
      decision_id,
      chosen_scenario_id: scenario.scenario_id.clone(),
      status: OutcomeStatus::Pending,
      horizon_days,
      kpis,
      evidence_links: Vec::new(),
      notes: None,
      revision: 1,
      created_at: now,
      updated_at: now,
    }
  }

  /// Whether anything has actually been measured or declared yet.
  pub fn is_recorded(&self) -> bool {
    self.status != OutcomeStatus::Pending
      || self.kpis.iter().any(|k| k.actual.is_some())
  }

  pub fn kpi(&self, key: &str) -> Option<&Kpi> {
    self.kpis.iter().find(|k| k.key == key)
  }

  /// Apply a caller update under `plan`.
  ///
  /// The supplied KPI list replaces the stored one and deltas are recomputed.
  /// Starter plans may update status, notes and evidence but no KPIs.
  pub fn apply_update(
    &mut self,
    update: OutcomeUpdate,
    plan: PlanTier,
    now: DateTime<Utc>,
  ) -> Result<()> {
    plan.validate_kpi_count(update.kpis.len())?;

    for link in &update.evidence_links {
      if !(link.starts_with("https://") || link.starts_with("http://")) {
        return Err(Error::invalid(
          "evidence_links",
          format!("{link:?} is not an http(s) URL"),
        ));
      }
    }

    let mut seen = HashSet::new();
    let mut kpis = Vec::with_capacity(update.kpis.len());
    for input in update.kpis {
      if !seen.insert(input.key.clone()) {
        return Err(Error::invalid(
          "kpis",
          format!("duplicate KPI key {:?}", input.key),
        ));
      }
      kpis.push(input.into_kpi()?);
    }

    if plan.kpi_range().is_some() {
      self.kpis = kpis;
    }
    self.status = update.status;
    self.notes = update.notes;
    self.evidence_links = update.evidence_links;
    self.updated_at = now;
    Ok(())
  }
}

// ─── Legacy inline outcomes ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
  pub outcome_id:          Uuid,
  pub recorded_at:         DateTime<Utc>,
  pub status:              OutcomeStatus,
  pub kpi_key:             Option<String>,
  pub actual_value:        Option<f64>,
  pub delta_percent:       Option<f64>,
  pub notes:               Option<String>,
  pub actor:               Option<String>,
  #[serde(default)]
  pub is_correction:       bool,
  /// The entry this one corrects. Always within the same decision.
  #[serde(default)]
  pub corrects_outcome_id: Option<Uuid>,
}

/// Input to [`crate::store::DecisionStore::add_outcome`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewOutcome {
  pub status:              OutcomeStatus,
  pub kpi_key:             Option<String>,
  pub actual_value:        Option<f64>,
  pub delta_percent:       Option<f64>,
  pub notes:               Option<String>,
  pub actor:               Option<String>,
  pub is_correction:       bool,
  pub corrects_outcome_id: Option<Uuid>,
}

impl NewOutcome {
  /// A correction of `outcome_id` carrying the revised values in `self`.
  pub fn correcting(mut self, outcome_id: Uuid) -> Self {
    self.is_correction = true;
    self.corrects_outcome_id = Some(outcome_id);
    self
  }

  /// Check this entry against the existing outcomes of the same decision and
  /// build the stored [`Outcome`].
  pub fn validate_against(
    self,
    existing: &[Outcome],
    now: DateTime<Utc>,
  ) -> Result<Outcome> {
    match (self.is_correction, self.corrects_outcome_id) {
      (true, None) => {
        return Err(Error::invalid(
          "corrects_outcome_id",
          "a correction must name the outcome it corrects",
        ));
      }
      (false, Some(_)) => {
        return Err(Error::invalid(
          "is_correction",
          "corrects_outcome_id is only valid on corrections",
        ));
      }
      (true, Some(target)) => {
        if !existing.iter().any(|o| o.outcome_id == target) {
          return Err(Error::OutcomeNotFound(target));
        }
        if existing.iter().any(|o| o.corrects_outcome_id == Some(target)) {
          return Err(Error::AlreadyCorrected(target));
        }
      }
      (false, None) => {}
    }

    let finite = self.actual_value.is_none_or(f64::is_finite)
      && self.delta_percent.is_none_or(f64::is_finite);
    if !finite {
      return Err(Error::invalid("outcome", "values must be finite"));
    }

    Ok(Outcome {
      outcome_id:          Uuid::new_v4(),
      recorded_at:         now,
      status:              self.status,
      kpi_key:             self.kpi_key,
      actual_value:        self.actual_value,
      delta_percent:       self.delta_percent,
      notes:               self.notes,
      actor:               self.actor,
      is_correction:       self.is_correction,
      corrects_outcome_id: self.corrects_outcome_id,
    })
  }
}

/// An outcome bundled with the id of the entry that corrects it, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedOutcome {
  #[serde(flatten)]
  pub outcome:       Outcome,
  pub superseded_by: Option<Uuid>,
}

/// Resolve the supersession state of every entry, preserving order.
pub fn resolve_outcomes(outcomes: &[Outcome]) -> Vec<ResolvedOutcome> {
  outcomes
    .iter()
    .map(|outcome| ResolvedOutcome {
      outcome:       outcome.clone(),
      superseded_by: outcomes
        .iter()
        .find(|o| o.corrects_outcome_id == Some(outcome.outcome_id))
        .map(|o| o.outcome_id),
    })
    .collect()
}

/// The current outcome: among entries no other entry corrects, the one with
/// the greatest `recorded_at`; ties go to the entry appended last.
pub fn current_outcome(outcomes: &[Outcome]) -> Option<&Outcome> {
  let superseded: HashSet<Uuid> =
    outcomes.iter().filter_map(|o| o.corrects_outcome_id).collect();
  outcomes
    .iter()
    .enumerate()
    .filter(|(_, o)| !superseded.contains(&o.outcome_id))
    .max_by_key(|(index, o)| (o.recorded_at, *index))
    .map(|(_, o)| o)
}

/// The correction chain starting at `root`: the root itself followed by each
/// successive correction. Empty when `root` is unknown.
pub fn correction_chain(outcomes: &[Outcome], root: Uuid) -> Vec<&Outcome> {
  let mut chain = Vec::new();
  let mut next = outcomes.iter().find(|o| o.outcome_id == root);
  while let Some(outcome) = next {
    if chain.iter().any(|o: &&Outcome| o.outcome_id == outcome.outcome_id) {
      break;
    }
    chain.push(outcome);
    next = outcomes
      .iter()
      .find(|o| o.corrects_outcome_id == Some(outcome.outcome_id));
  }
  chain
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};

  use super::*;
  use crate::{
    error::{Classify, ErrorKind},
    scenario::{ScenarioKind, tests::item},
  };

  fn now() -> DateTime<Utc> { Utc.timestamp_opt(1_700_000_000, 0).unwrap() }

  fn kpi(key: &str, baseline: f64, actual: Option<f64>) -> KpiInput {
    KpiInput {
      key: key.into(),
      unit: "usd".into(),
      baseline,
      target: baseline * 1.2,
      actual,
      confidence: None,
    }
  }

  fn seeded() -> MeasurableOutcome {
    let scenario = item("balanced", ScenarioKind::Balanced, true);
    let mut context = DecisionContext::default();
    context.metrics.insert("mrr".into(), 10_000.0);
    MeasurableOutcome::seed(Uuid::nil(), &scenario, &context, now())
  }

  // ── KPI math ───────────────────────────────────────────────────────────

  #[test]
  fn delta_math() {
    assert_eq!(kpi_delta(100.0, Some(120.0)), (Some(20.0), Some(20.0)));
    assert_eq!(kpi_delta(0.0, Some(5.0)), (Some(5.0), None));
    assert_eq!(kpi_delta(100.0, None), (None, None));
    assert_eq!(kpi_delta(200.0, Some(150.0)), (Some(-50.0), Some(-25.0)));
  }

  // ── Plan gating ────────────────────────────────────────────────────────

  #[test]
  fn plan_kpi_counts() {
    assert!(PlanTier::Growth.validate_kpi_count(3).is_ok());
    assert!(PlanTier::Growth.validate_kpi_count(6).is_ok());
    assert!(PlanTier::Enterprise.validate_kpi_count(4).is_ok());
    for n in [0, 1, 2, 7, 12] {
      let err = PlanTier::Growth.validate_kpi_count(n).unwrap_err();
      assert_eq!(err.kind(), ErrorKind::Validation);
    }
    assert!(PlanTier::Starter.validate_kpi_count(0).is_ok());
    assert!(matches!(
      PlanTier::Starter.validate_kpi_count(3),
      Err(Error::KpiTrackingUnavailable(PlanTier::Starter))
    ));
  }

  // ── Seeding ────────────────────────────────────────────────────────────

  #[test]
  fn seed_takes_targets_from_scenario_and_baselines_from_context() {
    let outcome = seeded();
    assert_eq!(outcome.status, OutcomeStatus::Pending);
    assert_eq!(outcome.chosen_scenario_id, "balanced");
    assert_eq!(outcome.horizon_days, 60);
    assert_eq!(outcome.kpis.len(), 3);

    let mrr = outcome.kpi("mrr").unwrap();
    assert_eq!(mrr.baseline, 10_000.0);
    assert_eq!(mrr.target, 12_000.0);
    assert_eq!(mrr.actual, None);
    assert_eq!(mrr.delta, None);

    // No current metric: baseline seeds as zero.
    assert_eq!(outcome.kpi("churn").unwrap().baseline, 0.0);
    assert!(!outcome.is_recorded());
  }

  // ── Updates ────────────────────────────────────────────────────────────

  #[test]
  fn update_recomputes_deltas() {
    let mut outcome = seeded();
    let update = OutcomeUpdate {
      status:         OutcomeStatus::InProgress,
      kpis:           vec![
        kpi("mrr", 100.0, Some(120.0)),
        kpi("signups", 0.0, Some(5.0)),
        kpi("churn", 4.0, None),
      ],
      notes:          Some("week 2".into()),
      evidence_links: vec!["https://example.com/dash".into()],
    };
    outcome.apply_update(update, PlanTier::Growth, now()).unwrap();

    let mrr = outcome.kpi("mrr").unwrap();
    assert_eq!(mrr.delta, Some(20.0));
    assert_eq!(mrr.delta_pct, Some(20.0));

    let signups = outcome.kpi("signups").unwrap();
    assert_eq!(signups.delta, Some(5.0));
    assert_eq!(signups.delta_pct, None);

    assert_eq!(outcome.kpi("churn").unwrap().delta, None);
    assert!(outcome.is_recorded());
  }

  #[test]
  fn update_with_too_many_kpis_is_rejected_without_change() {
    let mut outcome = seeded();
    let before = outcome.clone();
    let update = OutcomeUpdate {
      status:         OutcomeStatus::Achieved,
      kpis:           (0..7).map(|i| kpi(&format!("k{i}"), 10.0, Some(11.0))).collect(),
      notes:          None,
      evidence_links: vec![],
    };
    let err = outcome.apply_update(update, PlanTier::Growth, now()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(outcome, before);
  }

  #[test]
  fn starter_updates_status_but_never_kpis() {
    let mut outcome = seeded();
    let update = OutcomeUpdate {
      status:         OutcomeStatus::Achieved,
      kpis:           vec![],
      notes:          Some("looks good".into()),
      evidence_links: vec![],
    };
    outcome.apply_update(update, PlanTier::Starter, now()).unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Achieved);
    assert_eq!(outcome.kpis.len(), 3);

    let with_kpis = OutcomeUpdate {
      status:         OutcomeStatus::Achieved,
      kpis:           vec![kpi("mrr", 1.0, None)],
      notes:          None,
      evidence_links: vec![],
    };
    assert!(outcome.apply_update(with_kpis, PlanTier::Starter, now()).is_err());
  }

  #[test]
  fn update_rejects_bad_links_and_duplicate_keys() {
    let mut outcome = seeded();
    let bad_link = OutcomeUpdate {
      status:         OutcomeStatus::InProgress,
      kpis:           vec![],
      notes:          None,
      evidence_links: vec!["ftp://nope".into()],
    };
    assert!(outcome.apply_update(bad_link, PlanTier::Starter, now()).is_err());

    let dup = OutcomeUpdate {
      status:         OutcomeStatus::InProgress,
      kpis:           vec![kpi("mrr", 1.0, None), kpi("mrr", 2.0, None), kpi("x", 1.0, None)],
      notes:          None,
      evidence_links: vec![],
    };
    assert!(outcome.apply_update(dup, PlanTier::Growth, now()).is_err());
  }

  // ── Correction chain ───────────────────────────────────────────────────

  fn record(existing: &mut Vec<Outcome>, new: NewOutcome, at: DateTime<Utc>) -> Uuid {
    let outcome = new.validate_against(existing, at).unwrap();
    let id = outcome.outcome_id;
    existing.push(outcome);
    id
  }

  #[test]
  fn correction_keeps_original_and_becomes_current() {
    let mut outcomes = Vec::new();
    let original = record(
      &mut outcomes,
      NewOutcome { status: OutcomeStatus::Achieved, delta_percent: Some(12.0), ..Default::default() },
      now(),
    );
    let snapshot = outcomes[0].clone();

    let correction = record(
      &mut outcomes,
      NewOutcome { status: OutcomeStatus::Missed, delta_percent: Some(-3.0), ..Default::default() }
        .correcting(original),
      now() + Duration::days(1),
    );

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0], snapshot);
    assert_eq!(current_outcome(&outcomes).unwrap().outcome_id, correction);

    let resolved = resolve_outcomes(&outcomes);
    assert_eq!(resolved[0].superseded_by, Some(correction));
    assert_eq!(resolved[1].superseded_by, None);

    let chain: Vec<Uuid> = correction_chain(&outcomes, original)
      .into_iter()
      .map(|o| o.outcome_id)
      .collect();
    assert_eq!(chain, vec![original, correction]);
  }

  #[test]
  fn current_is_latest_non_superseded() {
    let mut outcomes = Vec::new();
    let early = record(&mut outcomes, NewOutcome::default(), now());
    let late = record(&mut outcomes, NewOutcome::default(), now() + Duration::days(5));
    // Correct the early entry after the late one was recorded; the late,
    // uncorrected entry still has the greater timestamp.
    let fix = record(
      &mut outcomes,
      NewOutcome::default().correcting(early),
      now() + Duration::days(2),
    );
    assert_eq!(current_outcome(&outcomes).unwrap().outcome_id, late);
    assert_ne!(current_outcome(&outcomes).unwrap().outcome_id, fix);
  }

  #[test]
  fn ties_go_to_the_last_appended() {
    let mut outcomes = Vec::new();
    record(&mut outcomes, NewOutcome::default(), now());
    let second = record(&mut outcomes, NewOutcome::default(), now());
    assert_eq!(current_outcome(&outcomes).unwrap().outcome_id, second);
  }

  #[test]
  fn correction_validation() {
    let mut outcomes = Vec::new();
    let original = record(&mut outcomes, NewOutcome::default(), now());

    let missing_target = NewOutcome { is_correction: true, ..Default::default() };
    assert_eq!(
      missing_target.validate_against(&outcomes, now()).unwrap_err().kind(),
      ErrorKind::Validation
    );

    let stray_target =
      NewOutcome { corrects_outcome_id: Some(original), ..Default::default() };
    assert_eq!(
      stray_target.validate_against(&outcomes, now()).unwrap_err().kind(),
      ErrorKind::Validation
    );

    let unknown = NewOutcome::default().correcting(Uuid::new_v4());
    assert_eq!(
      unknown.validate_against(&outcomes, now()).unwrap_err().kind(),
      ErrorKind::NotFound
    );

    record(&mut outcomes, NewOutcome::default().correcting(original), now());
    let again = NewOutcome::default().correcting(original);
    assert_eq!(
      again.validate_against(&outcomes, now()).unwrap_err().kind(),
      ErrorKind::Conflict
    );
  }

  #[test]
  fn empty_history_has_no_current() {
    assert!(current_outcome(&[]).is_none());
  }
}
