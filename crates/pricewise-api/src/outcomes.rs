//! Handlers for measurable outcomes and legacy inline outcomes.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/decisions/:id/outcome` | Measurable outcome, tagged with its own revision |
//! | `PUT`  | `/decisions/:id/outcome?plan=growth` | Body: [`OutcomeUpdate`]; `If-Match` on the outcome |
//! | `POST` | `/decisions/:id/outcomes` | Body: [`NewOutcome`]; `If-Match` on the decision; 201 |
//! | `GET`  | `/decisions/:id/outcomes/:outcome_id/chain` | The entry and each successive correction |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::{HeaderMap, StatusCode},
  response::Response,
};
use pricewise_core::{
  outcome::{MeasurableOutcome, NewOutcome, Outcome, OutcomeUpdate, PlanTier},
  store::DecisionStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  decisions::{expected_revision, live_decision, tagged},
  error::ApiError,
  etag::check_if_match,
};

async fn measurable<S: DecisionStore>(
  store: &S,
  decision_id: Uuid,
) -> Result<MeasurableOutcome, ApiError> {
  store
    .get_measurable_outcome(decision_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!("decision {decision_id} has no measurable outcome"))
    })
}

/// `GET /decisions/:id/outcome`
pub async fn get_measurable<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Response, ApiError>
where
  S: DecisionStore,
{
  let outcome = measurable(store.as_ref(), id).await?;
  Ok(tagged(StatusCode::OK, outcome.outcome_id, outcome.revision, outcome))
}

/// The caller's billing plan, supplied by the billing collaborator.
#[derive(Debug, Deserialize)]
pub struct PlanParams {
  pub plan: PlanTier,
}

/// `PUT /decisions/:id/outcome?plan=<starter|growth|enterprise>`
pub async fn update_measurable<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Query(params): Query<PlanParams>,
  headers: HeaderMap,
  Json(body): Json<OutcomeUpdate>,
) -> Result<Response, ApiError>
where
  S: DecisionStore,
{
  let current = measurable(store.as_ref(), id).await?;
  let expected = check_if_match(&headers, current.outcome_id, current.revision)?;
  let outcome = store
    .update_outcome(id, expected, body, params.plan)
    .await
    .map_err(ApiError::store)?;
  Ok(tagged(StatusCode::OK, outcome.outcome_id, outcome.revision, outcome))
}

/// `POST /decisions/:id/outcomes`: append an inline outcome or correction.
pub async fn add_inline<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
  Json(body): Json<NewOutcome>,
) -> Result<Response, ApiError>
where
  S: DecisionStore,
{
  let expected = expected_revision(store.as_ref(), &headers, id).await?;
  let decision = store
    .add_outcome(id, expected, body)
    .await
    .map_err(ApiError::store)?;
  Ok(tagged(StatusCode::CREATED, id, decision.revision, decision))
}

/// `GET /decisions/:id/outcomes/:outcome_id/chain`
pub async fn correction_chain<S>(
  State(store): State<Arc<S>>,
  Path((id, outcome_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Vec<Outcome>>, ApiError>
where
  S: DecisionStore,
{
  let decision = live_decision(store.as_ref(), id).await?;
  let chain: Vec<Outcome> = decision
    .correction_chain(outcome_id)
    .into_iter()
    .cloned()
    .collect();
  if chain.is_empty() {
    return Err(ApiError::NotFound(format!(
      "decision {id} has no outcome {outcome_id}"
    )));
  }
  Ok(Json(chain))
}
