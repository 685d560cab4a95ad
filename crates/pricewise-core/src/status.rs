//! Coarse decision status and its append-only transition log.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::{Error, Result};

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
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
pub enum DecisionStatus {
  #[default]
  Proposed,
  Accepted,
  Rejected,
  Implemented,
  RolledBack,
  Archived,
}

/// One entry of the transition log. Never modified once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
  pub status:         DecisionStatus,
  /// The status the decision had before this event.
  pub previous:       DecisionStatus,
  pub reason:         Option<String>,
  pub implemented_at: Option<DateTime<Utc>>,
  pub rollback_at:    Option<DateTime<Utc>>,
  pub actor:          Option<String>,
  pub created_at:     DateTime<Utc>,
}

/// Input to [`crate::store::DecisionStore::transition`].
#[derive(Debug, Clone, Deserialize)]
pub struct StatusChange {
  pub status:         DecisionStatus,
  #[serde(default)]
  pub reason:         Option<String>,
  #[serde(default)]
  pub implemented_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub rollback_at:    Option<DateTime<Utc>>,
  #[serde(default)]
  pub actor:          Option<String>,
}

impl StatusChange {
  pub fn to(status: DecisionStatus) -> Self {
    Self {
      status,
      reason: None,
      implemented_at: None,
      rollback_at: None,
      actor: None,
    }
  }
}

// ─── Policy ──────────────────────────────────────────────────────────────────

/// Which transitions a store accepts.
///
/// The default is permissive: any status is reachable from any other. A
/// whitelist restricts the graph to the listed `from → to` pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitionPolicy {
  allowed:            Option<BTreeMap<DecisionStatus, BTreeSet<DecisionStatus>>>,
  require_timestamps: bool,
}

impl TransitionPolicy {
  pub fn permissive() -> Self { Self::default() }

  pub fn whitelist(
    pairs: impl IntoIterator<Item = (DecisionStatus, DecisionStatus)>,
  ) -> Self {
    let mut allowed: BTreeMap<DecisionStatus, BTreeSet<DecisionStatus>> =
      BTreeMap::new();
    for (from, to) in pairs {
      allowed.entry(from).or_default().insert(to);
    }
    Self { allowed: Some(allowed), require_timestamps: false }
  }

  /// A conventional forward-moving graph:
  ///
  /// ```text
  /// proposed → accepted → implemented → rolled_back → proposed
  ///          → rejected → proposed
  /// (any non-archived) → archived
  /// ```
  pub fn recommended() -> Self {
    use DecisionStatus::*;
    Self::whitelist([
      (Proposed, Accepted),
      (Proposed, Rejected),
      (Proposed, Archived),
      (Accepted, Implemented),
      (Accepted, Rejected),
      (Accepted, Archived),
      (Implemented, RolledBack),
      (Implemented, Archived),
      (RolledBack, Proposed),
      (RolledBack, Archived),
      (Rejected, Proposed),
      (Rejected, Archived),
    ])
  }

  /// Require `implemented_at` when moving to `implemented` and `rollback_at`
  /// when moving to `rolled_back`.
  pub fn with_required_timestamps(mut self, required: bool) -> Self {
    self.require_timestamps = required;
    self
  }

  pub fn is_permissive(&self) -> bool { self.allowed.is_none() }

  pub fn allows(&self, from: DecisionStatus, to: DecisionStatus) -> bool {
    match &self.allowed {
      None => true,
      Some(graph) => graph.get(&from).is_some_and(|next| next.contains(&to)),
    }
  }

  pub fn check(&self, from: DecisionStatus, change: &StatusChange) -> Result<()> {
    if !self.allows(from, change.status) {
      return Err(Error::TransitionNotAllowed { from, to: change.status });
    }
    if self.require_timestamps {
      match change.status {
        DecisionStatus::Implemented if change.implemented_at.is_none() => {
          return Err(Error::invalid(
            "implemented_at",
            "required when moving to implemented",
          ));
        }
        DecisionStatus::RolledBack if change.rollback_at.is_none() => {
          return Err(Error::invalid(
            "rollback_at",
            "required when moving to rolled_back",
          ));
        }
        _ => {}
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use strum::IntoEnumIterator as _;

  use super::*;
  use crate::error::{Classify, ErrorKind};

  #[test]
  fn permissive_allows_everything() {
    let policy = TransitionPolicy::permissive();
    for from in DecisionStatus::iter() {
      for to in DecisionStatus::iter() {
        assert!(policy.check(from, &StatusChange::to(to)).is_ok());
      }
    }
  }

  #[test]
  fn whitelist_rejects_unlisted_pairs_as_conflict() {
    let policy = TransitionPolicy::recommended();
    assert!(policy.allows(DecisionStatus::Proposed, DecisionStatus::Accepted));
    let err = policy
      .check(DecisionStatus::Archived, &StatusChange::to(DecisionStatus::Proposed))
      .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
  }

  #[test]
  fn timestamp_convention_is_opt_in() {
    let loose = TransitionPolicy::permissive();
    assert!(
      loose
        .check(DecisionStatus::Accepted, &StatusChange::to(DecisionStatus::Implemented))
        .is_ok()
    );

    let strict = TransitionPolicy::permissive().with_required_timestamps(true);
    let err = strict
      .check(DecisionStatus::Accepted, &StatusChange::to(DecisionStatus::Implemented))
      .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = strict
      .check(DecisionStatus::Implemented, &StatusChange::to(DecisionStatus::RolledBack))
      .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
  }

  #[test]
  fn status_parses_from_snake_case() {
    assert_eq!("rolled_back".parse::<DecisionStatus>().unwrap(), DecisionStatus::RolledBack);
    assert_eq!(DecisionStatus::RolledBack.to_string(), "rolled_back");
  }
}
