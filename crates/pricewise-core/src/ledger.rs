//! Append-only version ledger for independently versioned sub-documents.
//!
//! The current value lives outside the history; it is only copied into the
//! history at the moment it is superseded. Hence `version == history.len() + 1`
//! at all times, and history entries are never modified or removed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A superseded value together with the change that retired it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionEntry<T> {
  pub version:       u32,
  pub value:         T,
  /// Why the value was replaced.
  pub reason:        Option<String>,
  /// Who replaced it.
  pub actor:         Option<String>,
  /// When this value stopped being current.
  pub superseded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LedgerRepr<T>")]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct VersionLedger<T> {
  current: T,
  version: u32,
  history: Vec<VersionEntry<T>>,
}

impl<T> VersionLedger<T> {
  /// Start a ledger at version 1 with an empty history.
  pub fn new(initial: T) -> Self {
    Self { current: initial, version: 1, history: Vec::new() }
  }

  pub fn current(&self) -> &T { &self.current }

  pub fn version(&self) -> u32 { self.version }

  /// All superseded values, oldest first.
  pub fn history(&self) -> &[VersionEntry<T>] { &self.history }

  /// Replace the current value, moving the old one into the history.
  /// Returns the new version number.
  pub fn supersede(
    &mut self,
    next: T,
    reason: Option<String>,
    actor: Option<String>,
    at: DateTime<Utc>,
  ) -> u32 {
    let previous = std::mem::replace(&mut self.current, next);
    self.history.push(VersionEntry {
      version: self.version,
      value: previous,
      reason,
      actor,
      superseded_at: at,
    });
    self.version += 1;
    self.version
  }

  /// The value that was current at `version`, if it ever existed.
  pub fn at_version(&self, version: u32) -> Option<&T> {
    if version == self.version {
      return Some(&self.current);
    }
    self
      .history
      .iter()
      .find(|entry| entry.version == version)
      .map(|entry| &entry.value)
  }
}

// ─── Deserialisation guard ───────────────────────────────────────────────────

#[derive(Deserialize)]
struct LedgerRepr<T> {
  current: T,
  version: u32,
  history: Vec<VersionEntry<T>>,
}

impl<T> TryFrom<LedgerRepr<T>> for VersionLedger<T> {
  type Error = String;

  fn try_from(repr: LedgerRepr<T>) -> Result<Self, Self::Error> {
    let expected = repr.history.len() as u64 + 1;
    if u64::from(repr.version) != expected {
      return Err(format!(
        "ledger version {} does not match history length {}",
        repr.version,
        repr.history.len()
      ));
    }
    let numbered = repr
      .history
      .iter()
      .enumerate()
      .all(|(i, entry)| entry.version as usize == i + 1);
    if !numbered {
      return Err("ledger history is not numbered 1..n".to_owned());
    }
    Ok(Self {
      current: repr.current,
      version: repr.version,
      history: repr.history,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn at(secs: i64) -> DateTime<Utc> { Utc.timestamp_opt(secs, 0).unwrap() }

  #[test]
  fn new_ledger_starts_at_one() {
    let ledger = VersionLedger::new("a");
    assert_eq!(ledger.version(), 1);
    assert!(ledger.history().is_empty());
    assert_eq!(*ledger.current(), "a");
  }

  #[test]
  fn history_tracks_version_minus_one() {
    let mut ledger = VersionLedger::new(0);
    for n in 1..=7 {
      ledger.supersede(n, Some(format!("bump {n}")), None, at(n.into()));
      assert_eq!(ledger.history().len() as u32, ledger.version() - 1);
    }
    assert_eq!(ledger.version(), 8);
    assert_eq!(*ledger.current(), 7);
    assert_eq!(ledger.history()[0].value, 0);
    assert_eq!(ledger.history()[0].version, 1);
    assert_eq!(ledger.history()[6].reason.as_deref(), Some("bump 7"));
  }

  #[test]
  fn at_version_finds_current_and_past() {
    let mut ledger = VersionLedger::new("first");
    ledger.supersede("second", None, Some("ana".into()), at(10));
    assert_eq!(ledger.at_version(1), Some(&"first"));
    assert_eq!(ledger.at_version(2), Some(&"second"));
    assert_eq!(ledger.at_version(3), None);
  }

  #[test]
  fn deserialise_rejects_inconsistent_counter() {
    let json = serde_json::json!({
      "current": 3,
      "version": 5,
      "history": [
        { "version": 1, "value": 1, "reason": null, "actor": null,
          "superseded_at": "2024-01-01T00:00:00Z" }
      ]
    });
    assert!(serde_json::from_value::<VersionLedger<i32>>(json).is_err());
  }

  #[test]
  fn serde_roundtrip_preserves_history() {
    let mut ledger = VersionLedger::new("v1".to_owned());
    ledger.supersede("v2".to_owned(), Some("refresh".into()), None, at(5));
    let json = serde_json::to_value(&ledger).unwrap();
    let back: VersionLedger<String> = serde_json::from_value(json).unwrap();
    assert_eq!(back, ledger);
  }
}
