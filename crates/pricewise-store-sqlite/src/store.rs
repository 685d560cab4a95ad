//! [`SqliteStore`]: the SQLite implementation of [`DecisionStore`].

use std::{path::Path, sync::Arc};

use chrono::Utc;
use rusqlite::{OptionalExtension as _, types::Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use pricewise_core::{
  context::ContextPatch,
  decision::{Decision, DecisionView, NewDecision},
  learning::{LearningSnapshot, OutcomeRecord},
  outcome::{MeasurableOutcome, NewOutcome, OutcomeUpdate, PlanTier},
  scenario::{NewScenarioSet, ScenarioSet},
  status::{StatusChange, TransitionPolicy},
  store::{ChangeNote, DecisionQuery, DecisionStore},
  verdict::Verdict,
};

use crate::{
  Error, Result,
  encode::{
    RawDecision, RawOutcome, decode_document, encode_document, encode_dt,
    encode_revision, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Pricewise decision store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection and policy are reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:   tokio_rusqlite::Connection,
  policy: Arc<TransitionPolicy>,
}

/// A row written in the same transaction as a decision update.
struct Companion {
  sql:    &'static str,
  values: Vec<Value>,
}

const INSERT_SCENARIO_SET: &str = "INSERT INTO scenario_sets (
     scenario_set_id, decision_id, created_at, document
   ) VALUES (?1, ?2, ?3, ?4)";

const INSERT_MEASURABLE_OUTCOME: &str = "INSERT INTO measurable_outcomes (
     outcome_id, decision_id, revision, updated_at, document
   ) VALUES (?1, ?2, ?3, ?4, ?5)";

impl Companion {
  fn scenario_set(set: &ScenarioSet) -> Result<Self> {
    Ok(Self {
      sql:    INSERT_SCENARIO_SET,
      values: vec![
        Value::Text(encode_uuid(set.scenario_set_id)),
        Value::Text(encode_uuid(set.decision_id)),
        Value::Text(encode_dt(set.created_at)),
        Value::Text(encode_document(set)?),
      ],
    })
  }

  fn measurable_outcome(outcome: &MeasurableOutcome) -> Result<Self> {
    Ok(Self {
      sql:    INSERT_MEASURABLE_OUTCOME,
      values: vec![
        Value::Text(encode_uuid(outcome.outcome_id)),
        Value::Text(encode_uuid(outcome.decision_id)),
        Value::Integer(encode_revision(outcome.revision)?),
        Value::Text(encode_dt(outcome.updated_at)),
        Value::Text(encode_document(outcome)?),
      ],
    })
  }
}

const DECISION_COLUMNS: &str = "decision_id, revision, is_deleted, document";

fn raw_decision(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawDecision> {
  Ok(RawDecision {
    decision_id: row.get(0)?,
    revision:    row.get(1)?,
    is_deleted:  row.get(2)?,
    document:    row.get(3)?,
  })
}

fn stale(id: Uuid, expected: u64, actual: u64) -> Error {
  Error::Core(pricewise_core::Error::StaleRevision { id, expected, actual })
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, policy: Arc::default() };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store: useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, policy: Arc::default() };
    store.init_schema().await?;
    Ok(store)
  }

  /// Replace the status transition policy. The default is permissive.
  pub fn with_transition_policy(mut self, policy: TransitionPolicy) -> Self {
    self.policy = Arc::new(policy);
    self
  }

  pub fn transition_policy(&self) -> &TransitionPolicy { &self.policy }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Loading ───────────────────────────────────────────────────────────────

  /// Load a decision regardless of its deletion flag.
  async fn load_any(&self, id: Uuid) -> Result<Option<Decision>> {
    let id_str = encode_uuid(id);
    let raw: Option<RawDecision> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {DECISION_COLUMNS} FROM decisions WHERE decision_id = ?1"),
              rusqlite::params![id_str],
              raw_decision,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawDecision::into_decision).transpose()
  }

  /// Load a live decision; missing and soft-deleted both read as not found.
  async fn load_live(&self, id: Uuid) -> Result<Decision> {
    match self.load_any(id).await? {
      Some(d) if !d.is_deleted => Ok(d),
      _ => Err(Error::Core(pricewise_core::Error::DecisionNotFound(id))),
    }
  }

  /// Load a live decision and check the caller's revision against it.
  async fn load_for_write(&self, id: Uuid, expected: u64) -> Result<Decision> {
    let decision = self.load_live(id).await?;
    decision.check_revision(expected)?;
    Ok(decision)
  }

  async fn load_set(&self, set_id: Uuid) -> Result<Option<ScenarioSet>> {
    let id_str = encode_uuid(set_id);
    let doc: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT document FROM scenario_sets WHERE scenario_set_id = ?1",
              rusqlite::params![id_str],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;
    doc.as_deref().map(decode_document).transpose()
  }

  async fn load_outcome(&self, decision_id: Uuid) -> Result<Option<MeasurableOutcome>> {
    let id_str = encode_uuid(decision_id);
    let raw: Option<RawOutcome> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT revision, document FROM measurable_outcomes WHERE decision_id = ?1",
              rusqlite::params![id_str],
              |r| Ok(RawOutcome { revision: r.get(0)?, document: r.get(1)? }),
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawOutcome::into_outcome).transpose()
  }

  // ── Writing ───────────────────────────────────────────────────────────────

  async fn insert_decision(&self, decision: &Decision) -> Result<()> {
    let id_str       = encode_uuid(decision.decision_id);
    let user_id      = decision.user_id.clone();
    let workspace_id = decision.workspace_id.clone();
    let revision     = encode_revision(decision.revision)?;
    let created_str  = encode_dt(decision.created_at);
    let updated_str  = encode_dt(decision.updated_at);
    let document     = encode_document(decision)?;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO decisions (
             decision_id, user_id, workspace_id, revision, is_deleted,
             created_at, updated_at, document
           ) VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?7)",
          rusqlite::params![
            id_str,
            user_id,
            workspace_id,
            revision,
            created_str,
            updated_str,
            document,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Check-and-swap `decision` over the stored row at revision `expected`,
  /// writing `companion` in the same transaction.
  ///
  /// On success `decision.revision` is `expected + 1`. If another writer got
  /// there first nothing is written and the error carries the stored
  /// revision.
  async fn commit(
    &self,
    decision: &mut Decision,
    expected: u64,
    companion: Option<Companion>,
  ) -> Result<()> {
    let id = decision.decision_id;
    decision.revision = expected + 1;

    let id_str       = encode_uuid(id);
    let expected_int = encode_revision(expected)?;
    let next_int     = encode_revision(decision.revision)?;
    let is_deleted   = decision.is_deleted;
    let updated_str  = encode_dt(decision.updated_at);
    let document     = encode_document(&*decision)?;

    let swapped = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(
          "UPDATE decisions
              SET document = ?1, revision = ?2, is_deleted = ?3, updated_at = ?4
            WHERE decision_id = ?5 AND revision = ?6",
          rusqlite::params![
            document,
            next_int,
            is_deleted,
            updated_str,
            id_str,
            expected_int,
          ],
        )?;
        // Dropping the transaction rolls it back.
        if changed == 0 {
          return Ok(false);
        }
        if let Some(c) = companion {
          tx.execute(c.sql, rusqlite::params_from_iter(c.values))?;
        }
        tx.commit()?;
        Ok(true)
      })
      .await?;

    if !swapped {
      decision.revision = expected;
      let actual = self.load_any(id).await?.map_or(0, |d| d.revision);
      warn!(%id, expected, actual, "lost revision race");
      return Err(stale(id, expected, actual));
    }
    Ok(())
  }

  /// Check-and-swap a measurable outcome at revision `expected`.
  async fn commit_outcome(
    &self,
    outcome: &mut MeasurableOutcome,
    expected: u64,
  ) -> Result<()> {
    outcome.revision = expected + 1;

    let id_str       = encode_uuid(outcome.outcome_id);
    let expected_int = encode_revision(expected)?;
    let next_int     = encode_revision(outcome.revision)?;
    let updated_str  = encode_dt(outcome.updated_at);
    let document     = encode_document(&*outcome)?;

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE measurable_outcomes
              SET document = ?1, revision = ?2, updated_at = ?3
            WHERE outcome_id = ?4 AND revision = ?5",
          rusqlite::params![document, next_int, updated_str, id_str, expected_int],
        )?)
      })
      .await?;

    if changed == 0 {
      outcome.revision = expected;
      let actual = self
        .load_outcome(outcome.decision_id)
        .await?
        .map_or(0, |o| o.revision);
      warn!(id = %outcome.outcome_id, expected, actual, "lost outcome revision race");
      return Err(stale(outcome.outcome_id, expected, actual));
    }
    Ok(())
  }
}

// ─── DecisionStore impl ──────────────────────────────────────────────────────

impl DecisionStore for SqliteStore {
  type Error = Error;

  // ── Decisions ─────────────────────────────────────────────────────────────

  async fn create_decision(&self, input: NewDecision) -> Result<Decision> {
    let decision = Decision::create(input, Utc::now())?;
    self.insert_decision(&decision).await?;
    info!(id = %decision.decision_id, user = %decision.user_id, "decision created");
    Ok(decision)
  }

  async fn get_decision(&self, id: Uuid) -> Result<Option<Decision>> {
    Ok(self.load_any(id).await?.filter(|d| !d.is_deleted))
  }

  async fn list_decisions<'a>(&'a self, query: &'a DecisionQuery) -> Result<Vec<Decision>> {
    let user_id         = query.user_id.clone();
    let workspace_id    = query.workspace_id.clone();
    let include_deleted = query.include_deleted;
    // SQLite treats a negative LIMIT as unbounded.
    let limit           = query
      .limit
      .map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));
    let offset          = query
      .offset
      .map_or(0, |o| i64::try_from(o).unwrap_or(i64::MAX));

    let raws: Vec<RawDecision> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {DECISION_COLUMNS} FROM decisions
            WHERE (?1 IS NULL OR user_id = ?1)
              AND (?2 IS NULL OR workspace_id = ?2)
              AND (?3 OR is_deleted = 0)
            ORDER BY created_at DESC, decision_id
            LIMIT ?4 OFFSET ?5"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![user_id, workspace_id, include_deleted, limit, offset],
            raw_decision,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDecision::into_decision).collect()
  }

  async fn soft_delete(&self, id: Uuid, expected_revision: u64) -> Result<Decision> {
    let mut decision = self.load_for_write(id, expected_revision).await?;
    decision.soft_delete(Utc::now())?;
    self.commit(&mut decision, expected_revision, None).await?;
    info!(%id, "decision soft-deleted");
    Ok(decision)
  }

  // ── Version ledger ────────────────────────────────────────────────────────

  async fn update_context(
    &self,
    id: Uuid,
    expected_revision: u64,
    patch: ContextPatch,
    note: ChangeNote,
  ) -> Result<Decision> {
    let mut decision = self.load_for_write(id, expected_revision).await?;
    let version = decision.update_context(&patch, note.reason, note.actor, Utc::now())?;
    self.commit(&mut decision, expected_revision, None).await?;
    info!(%id, version, "context updated");
    Ok(decision)
  }

  async fn regenerate_verdict(
    &self,
    id: Uuid,
    expected_revision: u64,
    verdict: Verdict,
    note: ChangeNote,
  ) -> Result<Decision> {
    let mut decision = self.load_for_write(id, expected_revision).await?;
    let version = decision.regenerate_verdict(verdict, note.reason, note.actor, Utc::now())?;
    self.commit(&mut decision, expected_revision, None).await?;
    info!(%id, version, "verdict regenerated");
    Ok(decision)
  }

  // ── Status log ────────────────────────────────────────────────────────────

  async fn transition(
    &self,
    id: Uuid,
    expected_revision: u64,
    change: StatusChange,
  ) -> Result<Decision> {
    let mut decision = self.load_for_write(id, expected_revision).await?;
    let event = decision.transition(change, &self.policy, Utc::now())?;
    let (from, to) = (event.previous, event.status);
    self.commit(&mut decision, expected_revision, None).await?;
    info!(%id, %from, %to, "status changed");
    Ok(decision)
  }

  // ── Scenarios ─────────────────────────────────────────────────────────────

  async fn accept_scenario_set(
    &self,
    id: Uuid,
    expected_revision: u64,
    input: NewScenarioSet,
  ) -> Result<(Decision, ScenarioSet)> {
    let mut decision = self.load_for_write(id, expected_revision).await?;
    let now = Utc::now();
    let set = ScenarioSet::accept(id, input, now)?;
    decision.attach_scenario_set(&set, now)?;

    let companion = Companion::scenario_set(&set)?;
    self.commit(&mut decision, expected_revision, Some(companion)).await?;
    info!(%id, set = %set.scenario_set_id, "scenario set accepted");
    Ok((decision, set))
  }

  async fn get_scenario_set(&self, scenario_set_id: Uuid) -> Result<Option<ScenarioSet>> {
    let Some(set) = self.load_set(scenario_set_id).await? else {
      return Ok(None);
    };
    // Sets of deleted decisions are hidden with them.
    Ok(self.get_decision(set.decision_id).await?.map(|_| set))
  }

  async fn apply_scenario(
    &self,
    id: Uuid,
    expected_revision: u64,
    scenario_id: String,
  ) -> Result<(Decision, MeasurableOutcome)> {
    let mut decision = self.load_for_write(id, expected_revision).await?;
    let set = match decision.scenario_set_id {
      Some(set_id) => self.load_set(set_id).await?,
      None => None,
    };
    let outcome = decision.apply_scenario(set.as_ref(), &scenario_id, Utc::now())?;

    let companion = Companion::measurable_outcome(&outcome)?;
    self.commit(&mut decision, expected_revision, Some(companion)).await?;
    info!(%id, scenario = %scenario_id, outcome = %outcome.outcome_id, "scenario applied");
    Ok((decision, outcome))
  }

  // ── Outcomes ──────────────────────────────────────────────────────────────

  async fn get_measurable_outcome(&self, decision_id: Uuid) -> Result<Option<MeasurableOutcome>> {
    if self.get_decision(decision_id).await?.is_none() {
      return Ok(None);
    }
    self.load_outcome(decision_id).await
  }

  async fn update_outcome(
    &self,
    decision_id: Uuid,
    expected_revision: u64,
    update: OutcomeUpdate,
    plan: PlanTier,
  ) -> Result<MeasurableOutcome> {
    self.load_live(decision_id).await?;
    let mut outcome = self
      .load_outcome(decision_id)
      .await?
      .ok_or(pricewise_core::Error::NoMeasurableOutcome(decision_id))?;
    if outcome.revision != expected_revision {
      return Err(stale(outcome.outcome_id, expected_revision, outcome.revision));
    }

    outcome.apply_update(update, plan, Utc::now())?;
    self.commit_outcome(&mut outcome, expected_revision).await?;
    info!(
      decision = %decision_id,
      outcome = %outcome.outcome_id,
      status = %outcome.status,
      kpis = outcome.kpis.len(),
      "outcome updated"
    );
    Ok(outcome)
  }

  async fn add_outcome(
    &self,
    id: Uuid,
    expected_revision: u64,
    input: NewOutcome,
  ) -> Result<Decision> {
    let mut decision = self.load_for_write(id, expected_revision).await?;
    let outcome = decision.add_outcome(input, Utc::now())?;
    let (outcome_id, is_correction) = (outcome.outcome_id, outcome.is_correction);
    self.commit(&mut decision, expected_revision, None).await?;
    info!(%id, outcome = %outcome_id, is_correction, "inline outcome recorded");
    Ok(decision)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn materialize(&self, id: Uuid) -> Result<Option<DecisionView>> {
    let Some(decision) = self.get_decision(id).await? else {
      return Ok(None);
    };
    let scenario_set = match decision.scenario_set_id {
      Some(set_id) => self.load_set(set_id).await?,
      None => None,
    };
    let measurable_outcome = self.load_outcome(id).await?;
    Ok(Some(DecisionView::build(decision, scenario_set, measurable_outcome)))
  }

  // ── Learning ──────────────────────────────────────────────────────────────

  async fn outcome_records(&self) -> Result<Vec<OutcomeRecord>> {
    // One row per (decision, set); only the set the decision points at
    // yields a record. Legacy outcomes live in the decision document, so the
    // measurable outcome is optional here.
    let rows: Vec<(RawDecision, String, Option<RawOutcome>)> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT d.decision_id, d.revision, d.is_deleted, d.document,
                  s.document, o.revision, o.document
             FROM decisions d
             JOIN scenario_sets s            ON s.decision_id = d.decision_id
             LEFT JOIN measurable_outcomes o ON o.decision_id = d.decision_id
            WHERE d.is_deleted = 0
            ORDER BY d.created_at, d.decision_id",
        )?;
        let rows = stmt
          .query_map([], |r| {
            let outcome_revision: Option<i64> = r.get(5)?;
            let outcome_document: Option<String> = r.get(6)?;
            let outcome = outcome_revision
              .zip(outcome_document)
              .map(|(revision, document)| RawOutcome { revision, document });
            Ok((raw_decision(r)?, r.get(4)?, outcome))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut records = Vec::new();
    for (raw, set_doc, raw_outcome) in rows {
      let decision = raw.into_decision()?;
      let set: ScenarioSet = decode_document(&set_doc)?;
      if decision.scenario_set_id != Some(set.scenario_set_id) {
        continue;
      }
      let outcome = raw_outcome.map(RawOutcome::into_outcome).transpose()?;
      if let Some(record) = OutcomeRecord::extract(&decision, &set, outcome.as_ref()) {
        records.push(record);
      }
    }
    debug!(count = records.len(), "outcome records extracted");
    Ok(records)
  }

  async fn save_learning_snapshot(&self, snapshot: LearningSnapshot) -> Result<()> {
    let id_str       = encode_uuid(snapshot.snapshot_id);
    let computed_str = encode_dt(snapshot.computed_at);
    let document     = encode_document(&snapshot)?;
    let groups       = snapshot.aggregates.len();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO learning_snapshots (snapshot_id, computed_at, document)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![id_str, computed_str, document],
        )?;
        Ok(())
      })
      .await?;
    info!(id = %snapshot.snapshot_id, groups, "learning snapshot saved");
    Ok(())
  }

  async fn latest_learning_snapshot(&self) -> Result<Option<LearningSnapshot>> {
    let doc: Option<String> = self
      .conn
      .call(|conn| {
        Ok(
          conn
            .query_row(
              "SELECT document FROM learning_snapshots
                ORDER BY computed_at DESC, rowid DESC LIMIT 1",
              [],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;
    doc.as_deref().map(decode_document).transpose()
  }
}

#[cfg(test)]
mod tests {
  use pricewise_core::{Classify, ErrorKind, outcome::OutcomeStatus};

  use super::*;
  use crate::tests::{new_decision, scenario_set, store, update, verdict};

  async fn row_count(s: &SqliteStore, table: &'static str) -> i64 {
    s.conn
      .call(move |conn| {
        Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?)
      })
      .await
      .unwrap()
  }

  #[tokio::test]
  async fn losing_commit_reports_stored_revision() {
    let s = store().await;
    let d = s.create_decision(new_decision("alice")).await.unwrap();
    let (mut winner, mut loser) = (d.clone(), d);
    winner
      .regenerate_verdict(verdict("first"), None, None, Utc::now())
      .unwrap();
    loser
      .regenerate_verdict(verdict("second"), None, None, Utc::now())
      .unwrap();

    s.commit(&mut winner, 1, None).await.unwrap();
    let err = s.commit(&mut loser, 1, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(matches!(
      err,
      Error::Core(pricewise_core::Error::StaleRevision { expected: 1, actual: 2, .. })
    ));
    assert_eq!(loser.revision, 1);

    let stored = s.get_decision(winner.decision_id).await.unwrap().unwrap();
    assert_eq!(stored.revision, 2);
    assert_eq!(stored.verdict.current().headline, "first");
  }

  #[tokio::test]
  async fn losing_commit_rolls_back_companion_row() {
    let s = store().await;
    let d = s.create_decision(new_decision("alice")).await.unwrap();
    let (d, set) = s.accept_scenario_set(d.decision_id, 1, scenario_set()).await.unwrap();
    let (mut winner, mut loser) = (d.clone(), d.clone());
    let won = winner.apply_scenario(Some(&set), "balanced", Utc::now()).unwrap();
    let lost = loser.apply_scenario(Some(&set), "aggressive", Utc::now()).unwrap();

    let companion = Companion::measurable_outcome(&won).unwrap();
    s.commit(&mut winner, 2, Some(companion)).await.unwrap();
    let companion = Companion::measurable_outcome(&lost).unwrap();
    let err = s.commit(&mut loser, 2, Some(companion)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    assert_eq!(row_count(&s, "measurable_outcomes").await, 1);
    let stored = s.get_measurable_outcome(d.decision_id).await.unwrap().unwrap();
    assert_eq!(stored.outcome_id, won.outcome_id);
    let decision = s.get_decision(d.decision_id).await.unwrap().unwrap();
    assert_eq!(decision.chosen_scenario_id.as_deref(), Some("balanced"));
    assert_eq!(decision.revision, 3);
  }

  #[tokio::test]
  async fn losing_outcome_commit_leaves_outcome_untouched() {
    let s = store().await;
    let d = s.create_decision(new_decision("alice")).await.unwrap();
    let (d, _) = s.accept_scenario_set(d.decision_id, 1, scenario_set()).await.unwrap();
    let (_, outcome) = s.apply_scenario(d.decision_id, 2, "balanced".into()).await.unwrap();
    let (mut winner, mut loser) = (outcome.clone(), outcome);
    winner
      .apply_update(update(OutcomeStatus::InProgress, vec![]), PlanTier::Starter, Utc::now())
      .unwrap();
    loser
      .apply_update(update(OutcomeStatus::Missed, vec![]), PlanTier::Starter, Utc::now())
      .unwrap();

    s.commit_outcome(&mut winner, 1).await.unwrap();
    let err = s.commit_outcome(&mut loser, 1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(loser.revision, 1);

    let stored = s.get_measurable_outcome(d.decision_id).await.unwrap().unwrap();
    assert_eq!(stored.revision, 2);
    assert_eq!(stored.status, OutcomeStatus::InProgress);
  }
}
