//! The `DecisionStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g.
//! `pricewise-store-sqlite`). Higher layers (`pricewise-api`) depend on this
//! abstraction, not on any concrete backend.
//!
//! Every read-modify-write operation takes the revision the caller last saw.
//! Backends must check-and-swap on it: the write lands only if the stored
//! revision still matches, and the revision is then incremented. A mismatch
//! is a [`crate::Error::StaleRevision`] and leaves the document untouched.

use std::future::Future;

use uuid::Uuid;

use crate::{
  context::ContextPatch,
  decision::{Decision, DecisionView, NewDecision},
  error::Classify,
  learning::{LearningSnapshot, OutcomeRecord},
  outcome::{MeasurableOutcome, NewOutcome, OutcomeUpdate, PlanTier},
  scenario::{NewScenarioSet, ScenarioSet},
  status::StatusChange,
  verdict::Verdict,
};

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Parameters for [`DecisionStore::list_decisions`].
#[derive(Debug, Clone, Default)]
pub struct DecisionQuery {
  pub user_id:         Option<String>,
  pub workspace_id:    Option<String>,
  /// Also return soft-deleted decisions. Default `false`.
  pub include_deleted: bool,
  pub limit:           Option<usize>,
  pub offset:          Option<usize>,
}

/// Why and by whom a versioned sub-document was replaced.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct ChangeNote {
  pub reason: Option<String>,
  pub actor:  Option<String>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a decision store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait DecisionStore: Send + Sync {
  type Error: std::error::Error + Classify + Send + Sync + 'static;

  // ── Decisions ─────────────────────────────────────────────────────────

  /// Validate and persist a new decision at revision 1.
  fn create_decision(
    &self,
    input: NewDecision,
  ) -> impl Future<Output = Result<Decision, Self::Error>> + Send + '_;

  /// Retrieve a live decision. Returns `None` if missing or soft-deleted.
  fn get_decision(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Decision>, Self::Error>> + Send + '_;

  fn list_decisions<'a>(
    &'a self,
    query: &'a DecisionQuery,
  ) -> impl Future<Output = Result<Vec<Decision>, Self::Error>> + Send + 'a;

  /// Soft-delete a decision. It is never removed from storage.
  fn soft_delete(
    &self,
    id: Uuid,
    expected_revision: u64,
  ) -> impl Future<Output = Result<Decision, Self::Error>> + Send + '_;

  // ── Version ledger ────────────────────────────────────────────────────

  fn update_context(
    &self,
    id: Uuid,
    expected_revision: u64,
    patch: ContextPatch,
    note: ChangeNote,
  ) -> impl Future<Output = Result<Decision, Self::Error>> + Send + '_;

  fn regenerate_verdict(
    &self,
    id: Uuid,
    expected_revision: u64,
    verdict: Verdict,
    note: ChangeNote,
  ) -> impl Future<Output = Result<Decision, Self::Error>> + Send + '_;

  // ── Status log ────────────────────────────────────────────────────────

  /// Append a status event, subject to the backend's transition policy.
  fn transition(
    &self,
    id: Uuid,
    expected_revision: u64,
    change: StatusChange,
  ) -> impl Future<Output = Result<Decision, Self::Error>> + Send + '_;

  // ── Scenarios ─────────────────────────────────────────────────────────

  /// Validate and persist a generated scenario set and point the decision at
  /// it.
  fn accept_scenario_set(
    &self,
    id: Uuid,
    expected_revision: u64,
    input: NewScenarioSet,
  ) -> impl Future<Output = Result<(Decision, ScenarioSet), Self::Error>> + Send + '_;

  fn get_scenario_set(
    &self,
    scenario_set_id: Uuid,
  ) -> impl Future<Output = Result<Option<ScenarioSet>, Self::Error>> + Send + '_;

  /// Choose a scenario and create its pending measurable outcome. Both
  /// writes commit together.
  fn apply_scenario(
    &self,
    id: Uuid,
    expected_revision: u64,
    scenario_id: String,
  ) -> impl Future<Output = Result<(Decision, MeasurableOutcome), Self::Error>>
  + Send
  + '_;

  // ── Outcomes ──────────────────────────────────────────────────────────

  /// The measurable outcome of a live decision, if a scenario was applied.
  fn get_measurable_outcome(
    &self,
    decision_id: Uuid,
  ) -> impl Future<Output = Result<Option<MeasurableOutcome>, Self::Error>> + Send + '_;

  /// Update the measurable outcome. `expected_revision` is the outcome's
  /// revision, not the decision's.
  fn update_outcome(
    &self,
    decision_id: Uuid,
    expected_revision: u64,
    update: OutcomeUpdate,
    plan: PlanTier,
  ) -> impl Future<Output = Result<MeasurableOutcome, Self::Error>> + Send + '_;

  /// Append a legacy inline outcome or correction.
  fn add_outcome(
    &self,
    id: Uuid,
    expected_revision: u64,
    input: NewOutcome,
  ) -> impl Future<Output = Result<Decision, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Materialise a [`DecisionView`]. Returns `None` if the decision is
  /// missing or soft-deleted.
  fn materialize(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<DecisionView>, Self::Error>> + Send + '_;

  // ── Learning ──────────────────────────────────────────────────────────

  /// A point-in-time snapshot of every extractable outcome record.
  fn outcome_records(
    &self,
  ) -> impl Future<Output = Result<Vec<OutcomeRecord>, Self::Error>> + Send + '_;

  fn save_learning_snapshot(
    &self,
    snapshot: LearningSnapshot,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn latest_learning_snapshot(
    &self,
  ) -> impl Future<Output = Result<Option<LearningSnapshot>, Self::Error>> + Send + '_;
}
