//! Learning snapshots and the historical signals derived from them.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/learning/snapshots` | Recompute from all outcome records; 201 |
//! | `GET`  | `/learning/snapshots/latest` | Most recent snapshot |
//! | `GET`  | `/learning/signals` | `company_stage`, `primary_kpi`; optional `confidence_score` to adjust |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
  http::StatusCode,
};
use chrono::Utc;
use pricewise_core::{
  context::{CompanyStage, PrimaryKpi},
  learning::{HistoricalSignal, LearningSnapshot, apply_signals},
  store::DecisionStore,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ApiError;

/// Recompute aggregates over every outcome record and persist the snapshot.
///
/// Shared by the HTTP endpoint and the `pricewise learn` command.
pub async fn recompute<S: DecisionStore>(store: &S) -> Result<LearningSnapshot, S::Error> {
  let records = store.outcome_records().await?;
  let snapshot = LearningSnapshot::compute(&records, Utc::now());
  info!(
    records = records.len(),
    groups = snapshot.aggregates.len(),
    "learning aggregates recomputed"
  );
  store.save_learning_snapshot(snapshot.clone()).await?;
  Ok(snapshot)
}

/// `POST /learning/snapshots`
pub async fn recompute_handler<S>(
  State(store): State<Arc<S>>,
) -> Result<(StatusCode, Json<LearningSnapshot>), ApiError>
where
  S: DecisionStore,
{
  let snapshot = recompute(store.as_ref()).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(snapshot)))
}

/// `GET /learning/snapshots/latest`
pub async fn latest<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<LearningSnapshot>, ApiError>
where
  S: DecisionStore,
{
  let snapshot = store
    .latest_learning_snapshot()
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound("no learning snapshot yet".into()))?;
  Ok(Json(snapshot))
}

#[derive(Debug, Deserialize)]
pub struct SignalParams {
  pub company_stage:    CompanyStage,
  pub primary_kpi:      PrimaryKpi,
  /// A verdict confidence score to adjust with the returned signals.
  pub confidence_score: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct Signals {
  pub signals:             Vec<HistoricalSignal>,
  pub adjusted_confidence: Option<f64>,
}

/// `GET /learning/signals?company_stage=growth&primary_kpi=mrr`
///
/// Empty when no snapshot has been computed yet.
pub async fn signals<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<SignalParams>,
) -> Result<Json<Signals>, ApiError>
where
  S: DecisionStore,
{
  if let Some(score) = params.confidence_score
    && !(0.0..=1.0).contains(&score)
  {
    return Err(ApiError::Invalid(format!(
      "confidence_score {score} is outside [0, 1]"
    )));
  }

  let signals = store
    .latest_learning_snapshot()
    .await
    .map_err(ApiError::store)?
    .map(|s| s.signals_for(params.company_stage, params.primary_kpi))
    .unwrap_or_default();
  let adjusted_confidence = params.confidence_score.map(|score| apply_signals(score, &signals));
  Ok(Json(Signals { signals, adjusted_confidence }))
}
