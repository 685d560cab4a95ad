//! Error types for `pricewise-core`.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::{outcome::PlanTier, status::DecisionStatus};

/// The coarse category of a failure. Transport layers map this to their own
/// vocabulary (HTTP status codes, exit codes, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  /// The request itself is malformed or names something unknown.
  Validation,
  /// Some prerequisite state is missing.
  Precondition,
  /// The target document is absent or soft-deleted.
  NotFound,
  /// Applying the request would violate an invariant.
  Conflict,
  /// An adapter failed (database, decoding, ...).
  Internal,
}

/// Implemented by every error type that can surface from a
/// [`DecisionStore`](crate::store::DecisionStore).
pub trait Classify {
  fn kind(&self) -> ErrorKind;
}

#[derive(Debug, Error)]
pub enum Error {
  // ── Validation ──────────────────────────────────────────────────────────
  #[error("unknown {field} value: {value:?}")]
  UnknownValue { field: &'static str, value: String },

  #[error("invalid {field}: {reason}")]
  Invalid { field: &'static str, reason: String },

  #[error("scenario {0:?} is not part of the current scenario set")]
  UnknownScenario(String),

  #[error("scenario {0:?} is not the designated baseline")]
  NotBaseline(String),

  #[error("{count} KPIs is out of range for the {plan} plan")]
  KpiCount { plan: PlanTier, count: usize },

  #[error("the {0} plan does not include KPI tracking")]
  KpiTrackingUnavailable(PlanTier),

  // ── Precondition ────────────────────────────────────────────────────────
  #[error("decision {0} has no accepted scenario set")]
  NoScenarioSet(Uuid),

  #[error("decision {0} has no measurable outcome; apply a scenario first")]
  NoMeasurableOutcome(Uuid),

  // ── Not found ───────────────────────────────────────────────────────────
  #[error("decision not found: {0}")]
  DecisionNotFound(Uuid),

  #[error("outcome not found: {0}")]
  OutcomeNotFound(Uuid),

  #[error("scenario set not found: {0}")]
  ScenarioSetNotFound(Uuid),

  // ── Conflict ────────────────────────────────────────────────────────────
  #[error("invalid scenario set: {0}")]
  InvalidScenarioSet(String),

  #[error("decision {decision_id} already chose scenario {chosen:?}")]
  ScenarioAlreadyChosen { decision_id: Uuid, chosen: String },

  #[error("outcome {0} has already been corrected")]
  AlreadyCorrected(Uuid),

  #[error("transition from {from} to {to} is not allowed")]
  TransitionNotAllowed { from: DecisionStatus, to: DecisionStatus },

  #[error("stale revision for {id}: expected {expected}, found {actual}")]
  StaleRevision { id: Uuid, expected: u64, actual: u64 },

  // ── Internal ────────────────────────────────────────────────────────────
  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
    Self::Invalid { field, reason: reason.into() }
  }
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::UnknownValue { .. }
      | Self::Invalid { .. }
      | Self::UnknownScenario(_)
      | Self::NotBaseline(_)
      | Self::KpiCount { .. }
      | Self::KpiTrackingUnavailable(_) => ErrorKind::Validation,
      Self::NoScenarioSet(_) | Self::NoMeasurableOutcome(_) => {
        ErrorKind::Precondition
      }
      Self::DecisionNotFound(_)
      | Self::OutcomeNotFound(_)
      | Self::ScenarioSetNotFound(_) => ErrorKind::NotFound,
      Self::InvalidScenarioSet(_)
      | Self::ScenarioAlreadyChosen { .. }
      | Self::AlreadyCorrected(_)
      | Self::TransitionNotAllowed { .. }
      | Self::StaleRevision { .. } => ErrorKind::Conflict,
      Self::Serialization(_) => ErrorKind::Internal,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
