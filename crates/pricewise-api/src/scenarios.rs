//! Handlers for scenario sets and the apply-scenario workflow.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/decisions/:id/scenarios` | Body: [`NewScenarioSet`]; `If-Match` required; 201 |
//! | `POST` | `/decisions/:id/scenarios/apply` | Body: `{"scenario_id":"..."}`; `If-Match` required; 201 |
//! | `GET`  | `/decisions/:id/scenarios/:scenario_id/delta` | Delta against the set's baseline |
//! | `GET`  | `/scenario-sets/:set_id` | Single scenario set |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::{HeaderMap, StatusCode},
  response::Response,
};
use pricewise_core::{
  decision::Decision,
  delta::DeltaValues,
  outcome::MeasurableOutcome,
  scenario::{NewScenarioSet, ScenarioSet},
  store::DecisionStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  decisions::{expected_revision, live_decision, tagged},
  error::ApiError,
};

// ─── Accept ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct Accepted {
  pub decision:     Decision,
  pub scenario_set: ScenarioSet,
}

/// `POST /decisions/:id/scenarios`: validates the generated set, recomputes
/// its deltas and points the decision at it.
pub async fn accept<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
  Json(body): Json<NewScenarioSet>,
) -> Result<Response, ApiError>
where
  S: DecisionStore,
{
  let expected = expected_revision(store.as_ref(), &headers, id).await?;
  let (decision, scenario_set) = store
    .accept_scenario_set(id, expected, body)
    .await
    .map_err(ApiError::store)?;
  let revision = decision.revision;
  Ok(tagged(
    StatusCode::CREATED,
    id,
    revision,
    Accepted { decision, scenario_set },
  ))
}

/// `GET /scenario-sets/:set_id`
pub async fn get_set<S>(
  State(store): State<Arc<S>>,
  Path(set_id): Path<Uuid>,
) -> Result<Json<ScenarioSet>, ApiError>
where
  S: DecisionStore,
{
  let set = store
    .get_scenario_set(set_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("scenario set {set_id} not found")))?;
  Ok(Json(set))
}

// ─── Apply ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ApplyBody {
  pub scenario_id: String,
}

#[derive(Debug, Serialize)]
pub struct Applied {
  pub decision:           Decision,
  pub measurable_outcome: MeasurableOutcome,
}

/// `POST /decisions/:id/scenarios/apply`: choose a path and seed its
/// pending outcome. The `ETag` is the decision's.
pub async fn apply<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
  Json(body): Json<ApplyBody>,
) -> Result<Response, ApiError>
where
  S: DecisionStore,
{
  let expected = expected_revision(store.as_ref(), &headers, id).await?;
  let (decision, measurable_outcome) = store
    .apply_scenario(id, expected, body.scenario_id)
    .await
    .map_err(ApiError::store)?;
  let revision = decision.revision;
  Ok(tagged(
    StatusCode::CREATED,
    id,
    revision,
    Applied { decision, measurable_outcome },
  ))
}

// ─── Delta ───────────────────────────────────────────────────────────────────

/// `GET /decisions/:id/scenarios/:scenario_id/delta`
pub async fn delta<S>(
  State(store): State<Arc<S>>,
  Path((id, scenario_id)): Path<(Uuid, String)>,
) -> Result<Json<DeltaValues>, ApiError>
where
  S: DecisionStore,
{
  let decision = live_decision(store.as_ref(), id).await?;
  let set_id = decision
    .scenario_set_id
    .ok_or(pricewise_core::Error::NoScenarioSet(id))
    .map_err(ApiError::store)?;
  let set = store
    .get_scenario_set(set_id)
    .await
    .map_err(ApiError::store)?
    .ok_or(pricewise_core::Error::ScenarioSetNotFound(set_id))
    .map_err(ApiError::store)?;
  let delta = set.delta_for(&scenario_id).map_err(ApiError::store)?;
  Ok(Json(delta))
}
