//! The Decision aggregate.
//!
//! A decision owns two independently versioned sub-documents (verdict and
//! context), an append-only status log, legacy inline outcomes, and
//! references to its scenario set and measurable outcome. All mutators are
//! pure: they take `now` explicitly and leave persistence, including the
//! revision bump, to the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  context::{ContextPatch, DecisionContext},
  episode::{EpisodeStatus, derive_episode_status},
  ledger::VersionLedger,
  outcome::{
    MeasurableOutcome, NewOutcome, Outcome, ResolvedOutcome, correction_chain, current_outcome,
    resolve_outcomes,
  },
  scenario::{ImpactRange, ScenarioSet},
  status::{DecisionStatus, StatusChange, StatusEvent, TransitionPolicy},
  verdict::Verdict,
};

// ─── Value types ─────────────────────────────────────────────────────────────

/// The company whose pricing the decision concerns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
  pub name: String,
  pub url:  Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpectedImpact {
  pub summary:             Option<String>,
  pub revenue_impact_pct:  Option<ImpactRange>,
  pub time_to_impact_days: Option<ImpactRange>,
}

// ─── Decision ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
  pub decision_id:           Uuid,
  pub user_id:               String,
  pub workspace_id:          String,
  pub company:               Company,
  pub verdict:               VersionLedger<Verdict>,
  pub context:               VersionLedger<DecisionContext>,
  pub status:                DecisionStatus,
  /// Append-only.
  pub status_events:         Vec<StatusEvent>,
  pub expected_impact:       Option<ExpectedImpact>,
  /// Legacy inline outcomes; append-only, see [`crate::outcome`].
  #[serde(default)]
  pub outcomes:              Vec<Outcome>,
  pub scenario_set_id:       Option<Uuid>,
  pub chosen_scenario_id:    Option<String>,
  pub chosen_scenario_at:    Option<DateTime<Utc>>,
  pub measurable_outcome_id: Option<Uuid>,
  #[serde(default)]
  pub is_deleted:            bool,
  pub deleted_at:            Option<DateTime<Utc>>,
  /// Optimistic-concurrency token. Starts at 1; the store bumps it on every
  /// successful write.
  pub revision:              u64,
  pub created_at:            DateTime<Utc>,
  pub updated_at:            DateTime<Utc>,
}

/// Input to [`crate::store::DecisionStore::create_decision`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewDecision {
  pub user_id:         String,
  pub workspace_id:    String,
  pub company:         Company,
  pub verdict:         Verdict,
  pub context:         DecisionContext,
  #[serde(default)]
  pub expected_impact: Option<ExpectedImpact>,
}

impl Decision {
  /// Build a new decision at version 1 of both verdict and context.
  pub fn create(input: NewDecision, now: DateTime<Utc>) -> Result<Self> {
    if input.user_id.trim().is_empty() {
      return Err(Error::invalid("user_id", "must not be empty"));
    }
    if input.company.name.trim().is_empty() {
      return Err(Error::invalid("company.name", "must not be empty"));
    }
    input.verdict.validate()?;

    Ok(Self {
      decision_id:           Uuid::new_v4(),
      user_id:               input.user_id,
      workspace_id:          input.workspace_id,
      company:               input.company,
      verdict:               VersionLedger::new(input.verdict),
      context:               VersionLedger::new(input.context),
      status:                DecisionStatus::default(),
      status_events:         Vec::new(),
      expected_impact:       input.expected_impact,
      outcomes:              Vec::new(),
      scenario_set_id:       None,
      chosen_scenario_id:    None,
      chosen_scenario_at:    None,
      measurable_outcome_id: None,
      is_deleted:            false,
      deleted_at:            None,
      revision:              1,
      created_at:            now,
      updated_at:            now,
    })
  }

  // ── Guards ────────────────────────────────────────────────────────────

  /// Soft-deleted decisions behave as if they did not exist.
  pub fn ensure_live(&self) -> Result<()> {
    if self.is_deleted {
      return Err(Error::DecisionNotFound(self.decision_id));
    }
    Ok(())
  }

  pub fn check_revision(&self, expected: u64) -> Result<()> {
    if self.revision != expected {
      return Err(Error::StaleRevision {
        id: self.decision_id,
        expected,
        actual: self.revision,
      });
    }
    Ok(())
  }

  fn touch(&mut self, now: DateTime<Utc>) { self.updated_at = now; }

  // ── Version ledger ────────────────────────────────────────────────────

  /// Validate `patch`, archive the current context and install the patched
  /// one. Returns the new context version.
  pub fn update_context(
    &mut self,
    patch: &ContextPatch,
    reason: Option<String>,
    actor: Option<String>,
    now: DateTime<Utc>,
  ) -> Result<u32> {
    self.ensure_live()?;
    let next = patch.apply_to(self.context.current())?;
    let version = self.context.supersede(next, reason, actor, now);
    self.touch(now);
    Ok(version)
  }

  /// Archive the current verdict and install `verdict`. Returns the new
  /// verdict version.
  pub fn regenerate_verdict(
    &mut self,
    verdict: Verdict,
    reason: Option<String>,
    actor: Option<String>,
    now: DateTime<Utc>,
  ) -> Result<u32> {
    self.ensure_live()?;
    verdict.validate()?;
    let version = self.verdict.supersede(verdict, reason, actor, now);
    self.touch(now);
    Ok(version)
  }

  // ── Status log ────────────────────────────────────────────────────────

  pub fn transition(
    &mut self,
    change: StatusChange,
    policy: &TransitionPolicy,
    now: DateTime<Utc>,
  ) -> Result<&StatusEvent> {
    self.ensure_live()?;
    policy.check(self.status, &change)?;

    let previous = self.status;
    self.status = change.status;
    self.status_events.push(StatusEvent {
      status: change.status,
      previous,
      reason: change.reason,
      implemented_at: change.implemented_at,
      rollback_at: change.rollback_at,
      actor: change.actor,
      created_at: now,
    });
    self.touch(now);
    Ok(&self.status_events[self.status_events.len() - 1])
  }

  // ── Scenarios ─────────────────────────────────────────────────────────

  fn ensure_not_chosen(&self) -> Result<()> {
    match &self.chosen_scenario_id {
      Some(chosen) => Err(Error::ScenarioAlreadyChosen {
        decision_id: self.decision_id,
        chosen:      chosen.clone(),
      }),
      None => Ok(()),
    }
  }

  /// Point the decision at a freshly accepted scenario set. Not allowed once
  /// a path has been chosen.
  pub fn attach_scenario_set(
    &mut self,
    set: &ScenarioSet,
    now: DateTime<Utc>,
  ) -> Result<()> {
    self.ensure_live()?;
    self.ensure_not_chosen()?;
    if set.decision_id != self.decision_id {
      return Err(Error::InvalidScenarioSet(format!(
        "set {} belongs to decision {}",
        set.scenario_set_id, set.decision_id
      )));
    }
    self.scenario_set_id = Some(set.scenario_set_id);
    self.touch(now);
    Ok(())
  }

  /// Choose `scenario_id` from the current set and seed the pending
  /// measurable outcome. The caller persists both.
  ///
  /// `set` is the document referenced by `scenario_set_id`, as loaded by the
  /// store.
  pub fn apply_scenario(
    &mut self,
    set: Option<&ScenarioSet>,
    scenario_id: &str,
    now: DateTime<Utc>,
  ) -> Result<MeasurableOutcome> {
    self.ensure_live()?;
    let set_id = self
      .scenario_set_id
      .ok_or(Error::NoScenarioSet(self.decision_id))?;
    let set = set
      .filter(|s| s.scenario_set_id == set_id)
      .ok_or(Error::ScenarioSetNotFound(set_id))?;
    self.ensure_not_chosen()?;

    let scenario = set
      .get(scenario_id)
      .ok_or_else(|| Error::UnknownScenario(scenario_id.to_owned()))?;

    let outcome = MeasurableOutcome::seed(
      self.decision_id,
      scenario,
      self.context.current(),
      now,
    );
    self.chosen_scenario_id = Some(scenario.scenario_id.clone());
    self.chosen_scenario_at = Some(now);
    self.measurable_outcome_id = Some(outcome.outcome_id);
    self.touch(now);
    Ok(outcome)
  }

  // ── Legacy outcomes ───────────────────────────────────────────────────

  /// Append an inline outcome (or a correction of one).
  pub fn add_outcome(&mut self, input: NewOutcome, now: DateTime<Utc>) -> Result<&Outcome> {
    self.ensure_live()?;
    let outcome = input.validate_against(&self.outcomes, now)?;
    self.outcomes.push(outcome);
    self.touch(now);
    Ok(&self.outcomes[self.outcomes.len() - 1])
  }

  pub fn current_outcome(&self) -> Option<&Outcome> { current_outcome(&self.outcomes) }

  /// `root` followed by each successive correction. Empty when `root` is not
  /// one of this decision's outcomes.
  pub fn correction_chain(&self, root: Uuid) -> Vec<&Outcome> {
    correction_chain(&self.outcomes, root)
  }

  // ── Deletion ──────────────────────────────────────────────────────────

  pub fn soft_delete(&mut self, now: DateTime<Utc>) -> Result<()> {
    self.ensure_live()?;
    self.is_deleted = true;
    self.deleted_at = Some(now);
    self.touch(now);
    Ok(())
  }

  // ── Derived state ─────────────────────────────────────────────────────

  /// Whether an outcome has been recorded, either on the measurable outcome
  /// or as a legacy inline entry.
  pub fn has_outcome(&self, measurable: Option<&MeasurableOutcome>) -> bool {
    measurable.is_some_and(MeasurableOutcome::is_recorded) || !self.outcomes.is_empty()
  }

  pub fn episode_status(&self, measurable: Option<&MeasurableOutcome>) -> EpisodeStatus {
    derive_episode_status(
      self.scenario_set_id.is_some(),
      self.chosen_scenario_id.as_deref(),
      self.has_outcome(measurable),
    )
  }
}

// ─── Read model ──────────────────────────────────────────────────────────────

/// The computed read model for a decision: never stored, always derived.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionView {
  pub decision:           Decision,
  pub scenario_set:       Option<ScenarioSet>,
  pub measurable_outcome: Option<MeasurableOutcome>,
  pub episode_status:     EpisodeStatus,
  pub current_outcome:    Option<Outcome>,
  /// Every legacy outcome with the id of the entry correcting it.
  pub outcomes:           Vec<ResolvedOutcome>,
}

impl DecisionView {
  pub fn build(
    decision: Decision,
    scenario_set: Option<ScenarioSet>,
    measurable_outcome: Option<MeasurableOutcome>,
  ) -> Self {
    let episode_status = decision.episode_status(measurable_outcome.as_ref());
    let current_outcome = decision.current_outcome().cloned();
    let outcomes = resolve_outcomes(&decision.outcomes);
    Self {
      decision,
      scenario_set,
      measurable_outcome,
      episode_status,
      current_outcome,
      outcomes,
    }
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use chrono::{Duration, TimeZone};

  use super::*;
  use crate::{
    context::{CompanyStage, PrimaryKpi},
    error::{Classify, ErrorKind},
    outcome::{OutcomeStatus, OutcomeUpdate, PlanTier},
    scenario::{NewScenarioSet, tests::four_scenarios},
    verdict::tests::verdict,
  };

  pub(crate) fn now() -> DateTime<Utc> { Utc.timestamp_opt(1_700_000_000, 0).unwrap() }

  pub(crate) fn new_decision() -> NewDecision {
    let mut context = DecisionContext {
      company_stage: Some(CompanyStage::Growth),
      primary_kpi: Some(PrimaryKpi::Mrr),
      ..Default::default()
    };
    context.metrics.insert("mrr".into(), 10_000.0);
    NewDecision {
      user_id:         "user-1".into(),
      workspace_id:    "ws-1".into(),
      company:         Company {
        name: "Acme".into(),
        url:  Some("https://acme.test".into()),
      },
      verdict:         verdict("Raise prices", 0.7),
      context,
      expected_impact: None,
    }
  }

  pub(crate) fn decision() -> Decision { Decision::create(new_decision(), now()).unwrap() }

  pub(crate) fn accepted_set(decision: &Decision) -> ScenarioSet {
    ScenarioSet::accept(
      decision.decision_id,
      NewScenarioSet { scenarios: four_scenarios(), generated_by: None },
      now(),
    )
    .unwrap()
  }

  #[test]
  fn create_starts_at_version_one() {
    let d = decision();
    assert_eq!(d.verdict.version(), 1);
    assert_eq!(d.context.version(), 1);
    assert!(d.verdict.history().is_empty());
    assert!(d.context.history().is_empty());
    assert!(d.status_events.is_empty());
    assert_eq!(d.status, DecisionStatus::Proposed);
    assert_eq!(d.revision, 1);
    assert_eq!(d.episode_status(None), EpisodeStatus::Draft);
  }

  #[test]
  fn create_rejects_bad_verdict() {
    let mut input = new_decision();
    input.verdict.risk_score = -0.1;
    let err = Decision::create(input, now()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
  }

  #[test]
  fn regenerate_keeps_history_at_version_minus_one() {
    let mut d = decision();
    for n in 1..=5 {
      let version = d
        .regenerate_verdict(
          verdict(&format!("take {n}"), 0.6),
          Some("new data".into()),
          Some("ana".into()),
          now() + Duration::minutes(n),
        )
        .unwrap();
      assert_eq!(version, d.verdict.version());
      assert_eq!(d.verdict.history().len() as u32, d.verdict.version() - 1);
    }
    assert_eq!(d.verdict.version(), 6);
    assert_eq!(d.verdict.current().headline, "take 5");
    assert_eq!(d.verdict.history()[0].value.headline, "Raise prices");
    // Context untouched.
    assert_eq!(d.context.version(), 1);
  }

  #[test]
  fn update_context_versions_and_validates() {
    let mut d = decision();
    let patch = ContextPatch { company_stage: Some("scale".into()), ..Default::default() };
    assert_eq!(d.update_context(&patch, None, None, now()).unwrap(), 2);
    assert_eq!(d.context.current().company_stage, Some(CompanyStage::Scale));
    assert_eq!(d.context.history()[0].value.company_stage, Some(CompanyStage::Growth));

    let bad = ContextPatch { primary_kpi: Some("happiness".into()), ..Default::default() };
    let err = d.update_context(&bad, None, None, now()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(d.context.version(), 2);
    assert_eq!(d.context.history().len(), 1);
  }

  #[test]
  fn transition_appends_events() {
    let mut d = decision();
    let policy = TransitionPolicy::permissive();
    d.transition(StatusChange::to(DecisionStatus::Accepted), &policy, now()).unwrap();
    let mut implement = StatusChange::to(DecisionStatus::Implemented);
    implement.implemented_at = Some(now());
    d.transition(implement, &policy, now()).unwrap();
    // Any-to-any under the permissive policy.
    d.transition(StatusChange::to(DecisionStatus::Proposed), &policy, now()).unwrap();

    assert_eq!(d.status, DecisionStatus::Proposed);
    assert_eq!(d.status_events.len(), 3);
    assert_eq!(d.status_events[1].previous, DecisionStatus::Accepted);
    assert_eq!(d.status_events[1].implemented_at, Some(now()));
  }

  #[test]
  fn rejected_transition_leaves_log_untouched() {
    let mut d = decision();
    let policy = TransitionPolicy::recommended();
    let err = d
      .transition(StatusChange::to(DecisionStatus::RolledBack), &policy, now())
      .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(d.status_events.is_empty());
    assert_eq!(d.status, DecisionStatus::Proposed);
  }

  #[test]
  fn apply_without_set_is_precondition() {
    let mut d = decision();
    let err = d.apply_scenario(None, "balanced", now()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Precondition);
  }

  #[test]
  fn apply_unknown_scenario_is_validation() {
    let mut d = decision();
    let set = accepted_set(&d);
    d.attach_scenario_set(&set, now()).unwrap();
    let err = d.apply_scenario(Some(&set), "moonshot", now()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(d.chosen_scenario_id.is_none());
  }

  #[test]
  fn episode_walks_through_all_stages() {
    let mut d = decision();
    assert_eq!(d.episode_status(None), EpisodeStatus::Draft);

    let set = accepted_set(&d);
    d.attach_scenario_set(&set, now()).unwrap();
    assert_eq!(d.episode_status(None), EpisodeStatus::Explored);

    let mut outcome = d.apply_scenario(Some(&set), "balanced", now()).unwrap();
    assert_eq!(d.chosen_scenario_id.as_deref(), Some("balanced"));
    assert_eq!(d.measurable_outcome_id, Some(outcome.outcome_id));
    assert_eq!(outcome.kpi("mrr").unwrap().baseline, 10_000.0);
    // A pending outcome is not yet a saved one.
    assert_eq!(d.episode_status(Some(&outcome)), EpisodeStatus::PathChosen);

    outcome
      .apply_update(
        OutcomeUpdate {
          status:         OutcomeStatus::InProgress,
          kpis:           vec![],
          notes:          None,
          evidence_links: vec![],
        },
        PlanTier::Starter,
        now(),
      )
      .unwrap();
    assert_eq!(d.episode_status(Some(&outcome)), EpisodeStatus::OutcomeSaved);
  }

  #[test]
  fn chosen_scenario_is_final() {
    let mut d = decision();
    let set = accepted_set(&d);
    d.attach_scenario_set(&set, now()).unwrap();
    d.apply_scenario(Some(&set), "balanced", now()).unwrap();

    let err = d.apply_scenario(Some(&set), "aggressive", now()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(d.chosen_scenario_id.as_deref(), Some("balanced"));

    let replacement = accepted_set(&d);
    let err = d.attach_scenario_set(&replacement, now()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(d.scenario_set_id, Some(set.scenario_set_id));
  }

  #[test]
  fn set_for_another_decision_is_rejected() {
    let mut d = decision();
    let other = decision();
    let set = accepted_set(&other);
    assert!(d.attach_scenario_set(&set, now()).is_err());
  }

  #[test]
  fn soft_deleted_decision_reads_as_not_found() {
    let mut d = decision();
    d.soft_delete(now()).unwrap();
    assert!(d.is_deleted);
    let err = d
      .regenerate_verdict(verdict("again", 0.5), None, None, now())
      .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(d.soft_delete(now()).unwrap_err().kind(), ErrorKind::NotFound);
  }

  #[test]
  fn legacy_outcomes_make_a_view() {
    let mut d = decision();
    let first = d
      .add_outcome(NewOutcome { status: OutcomeStatus::Achieved, ..Default::default() }, now())
      .unwrap()
      .outcome_id;
    let fix = d
      .add_outcome(
        NewOutcome { status: OutcomeStatus::Missed, ..Default::default() }.correcting(first),
        now() + Duration::hours(1),
      )
      .unwrap()
      .outcome_id;

    let chain: Vec<Uuid> = d.correction_chain(first).iter().map(|o| o.outcome_id).collect();
    assert_eq!(chain, vec![first, fix]);
    assert!(d.correction_chain(Uuid::new_v4()).is_empty());

    let view = DecisionView::build(d, None, None);
    assert_eq!(view.current_outcome.unwrap().outcome_id, fix);
    assert_eq!(view.decision.outcomes.len(), 2);
    assert_eq!(view.outcomes[0].superseded_by, Some(fix));
    assert_eq!(view.outcomes[1].superseded_by, None);
    // Legacy outcomes alone do not imply a chosen path.
    assert_eq!(view.episode_status, EpisodeStatus::Draft);
  }

  #[test]
  fn revision_check() {
    let d = decision();
    assert!(d.check_revision(1).is_ok());
    let err = d.check_revision(7).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
  }

  #[test]
  fn document_roundtrips_unchanged() {
    let mut d = decision();
    d.regenerate_verdict(verdict("v2", 0.9), Some("refresh".into()), None, now())
      .unwrap();
    d.add_outcome(NewOutcome::default(), now()).unwrap();
    let json = serde_json::to_string(&d).unwrap();
    let back: Decision = serde_json::from_str(&json).unwrap();
    assert_eq!(back, d);
  }
}
