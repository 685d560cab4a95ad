//! Display-level lifecycle stage of a decision.
//!
//! Derived from three independent facts on every read; never stored.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EpisodeStatus {
  Draft,
  Explored,
  PathChosen,
  OutcomeSaved,
}

/// An empty `chosen_scenario_id` counts as unset.
pub fn derive_episode_status(
  has_scenarios: bool,
  chosen_scenario_id: Option<&str>,
  has_outcome: bool,
) -> EpisodeStatus {
  let chosen = chosen_scenario_id.is_some_and(|id| !id.is_empty());
  match (chosen, has_outcome, has_scenarios) {
    (true, true, _) => EpisodeStatus::OutcomeSaved,
    (true, false, _) => EpisodeStatus::PathChosen,
    (false, _, true) => EpisodeStatus::Explored,
    (false, _, false) => EpisodeStatus::Draft,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn canonical_stages() {
    assert_eq!(derive_episode_status(false, None, false), EpisodeStatus::Draft);
    assert_eq!(derive_episode_status(true, None, false), EpisodeStatus::Explored);
    assert_eq!(
      derive_episode_status(true, Some("balanced"), false),
      EpisodeStatus::PathChosen
    );
    assert_eq!(
      derive_episode_status(true, Some("balanced"), true),
      EpisodeStatus::OutcomeSaved
    );
  }

  #[test]
  fn outcome_without_choice_does_not_count() {
    assert_eq!(derive_episode_status(true, None, true), EpisodeStatus::Explored);
    assert_eq!(derive_episode_status(false, None, true), EpisodeStatus::Draft);
    assert_eq!(derive_episode_status(true, Some(""), true), EpisodeStatus::Explored);
  }

  #[test]
  fn serialises_snake_case() {
    assert_eq!(
      serde_json::to_string(&EpisodeStatus::PathChosen).unwrap(),
      "\"path_chosen\""
    );
    assert_eq!(EpisodeStatus::OutcomeSaved.to_string(), "outcome_saved");
  }
}
