//! SQL schema for the Pricewise SQLite store.
//!
//! Aggregates are stored as JSON documents. The columns next to each document
//! exist for filtering and for the revision check-and-swap; the document is
//! the source of truth.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Decisions are never deleted; soft deletion flips is_deleted.
CREATE TABLE IF NOT EXISTS decisions (
    decision_id  TEXT PRIMARY KEY,
    user_id      TEXT NOT NULL,
    workspace_id TEXT NOT NULL,
    revision     INTEGER NOT NULL,   -- optimistic-concurrency token
    is_deleted   INTEGER NOT NULL DEFAULT 0,
    created_at   TEXT NOT NULL,      -- ISO 8601 UTC, fixed width
    updated_at   TEXT NOT NULL,
    document     TEXT NOT NULL       -- JSON-encoded Decision
);

-- Every accepted set is kept; the decision document names the current one.
CREATE TABLE IF NOT EXISTS scenario_sets (
    scenario_set_id TEXT PRIMARY KEY,
    decision_id     TEXT NOT NULL REFERENCES decisions(decision_id),
    created_at      TEXT NOT NULL,
    document        TEXT NOT NULL    -- JSON-encoded ScenarioSet
);

-- At most one measurable outcome per decision: a chosen path is final.
CREATE TABLE IF NOT EXISTS measurable_outcomes (
    outcome_id  TEXT PRIMARY KEY,
    decision_id TEXT NOT NULL REFERENCES decisions(decision_id),
    revision    INTEGER NOT NULL,
    updated_at  TEXT NOT NULL,
    document    TEXT NOT NULL,       -- JSON-encoded MeasurableOutcome
    UNIQUE (decision_id)
);

CREATE TABLE IF NOT EXISTS learning_snapshots (
    snapshot_id TEXT PRIMARY KEY,
    computed_at TEXT NOT NULL,
    document    TEXT NOT NULL        -- JSON-encoded LearningSnapshot
);

CREATE INDEX IF NOT EXISTS decisions_owner_idx   ON decisions(user_id, workspace_id);
CREATE INDEX IF NOT EXISTS decisions_created_idx ON decisions(created_at);
CREATE INDEX IF NOT EXISTS sets_decision_idx     ON scenario_sets(decision_id);
CREATE INDEX IF NOT EXISTS snapshots_time_idx    ON learning_snapshots(computed_at);

PRAGMA user_version = 1;
";
