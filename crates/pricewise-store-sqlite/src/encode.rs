//! Encoding and decoding helpers between domain documents and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps in indexed columns are fixed-width RFC 3339 strings so that
//! lexical order is chronological. Documents are compact JSON. UUIDs are
//! stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use pricewise_core::{decision::Decision, outcome::MeasurableOutcome};
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Revisions are `u64` in the domain and `INTEGER` (i64) in SQLite.
pub fn encode_revision(revision: u64) -> Result<i64> {
  i64::try_from(revision)
    .map_err(|_| Error::Corrupt(format!("revision {revision} overflows i64")))
}

pub fn decode_revision(raw: i64) -> Result<u64> {
  u64::try_from(raw).map_err(|_| Error::Corrupt(format!("negative revision {raw}")))
}

// ─── Documents ───────────────────────────────────────────────────────────────

pub fn encode_document<T: Serialize>(doc: &T) -> Result<String> {
  Ok(serde_json::to_string(doc)?)
}

pub fn decode_document<T: DeserializeOwned>(s: &str) -> Result<T> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `decisions` row.
pub struct RawDecision {
  pub decision_id: String,
  pub revision:    i64,
  pub is_deleted:  bool,
  pub document:    String,
}

impl RawDecision {
  pub fn into_decision(self) -> Result<Decision> {
    let decision: Decision = decode_document(&self.document)?;
    let id = decode_uuid(&self.decision_id)?;
    let revision = decode_revision(self.revision)?;

    if decision.decision_id != id
      || decision.revision != revision
      || decision.is_deleted != self.is_deleted
    {
      return Err(Error::Corrupt(format!(
        "decision row {id} disagrees with its document"
      )));
    }
    Ok(decision)
  }
}

/// Raw values read directly from a `measurable_outcomes` row.
pub struct RawOutcome {
  pub revision: i64,
  pub document: String,
}

impl RawOutcome {
  pub fn into_outcome(self) -> Result<MeasurableOutcome> {
    let outcome: MeasurableOutcome = decode_document(&self.document)?;
    if outcome.revision != decode_revision(self.revision)? {
      return Err(Error::Corrupt(format!(
        "outcome row {} disagrees with its document",
        outcome.outcome_id
      )));
    }
    Ok(outcome)
  }
}
