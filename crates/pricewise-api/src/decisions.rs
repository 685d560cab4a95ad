//! Handlers for `/decisions` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/decisions` | Optional `user_id`, `workspace_id`, `include_deleted`, `limit`, `offset` |
//! | `POST`   | `/decisions` | Body: [`NewDecision`]; returns 201 + decision + `ETag` |
//! | `GET`    | `/decisions/:id` | The materialised [`DecisionView`](pricewise_core::decision::DecisionView) |
//! | `DELETE` | `/decisions/:id` | Soft delete; `If-Match` required |
//! | `POST`   | `/decisions/:id/context` | Body: [`ContextBody`]; `If-Match` required |
//! | `GET`    | `/decisions/:id/context/:version` | A current or archived context |
//! | `POST`   | `/decisions/:id/verdict` | Body: [`VerdictBody`]; `If-Match` required |
//! | `GET`    | `/decisions/:id/verdict/:version` | A current or archived verdict |
//! | `POST`   | `/decisions/:id/status` | Body: [`StatusChange`]; `If-Match` required |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::{HeaderMap, StatusCode, header},
  response::{IntoResponse, Response},
};
use pricewise_core::{
  context::{ContextPatch, DecisionContext},
  decision::{Decision, NewDecision},
  status::StatusChange,
  store::{ChangeNote, DecisionQuery, DecisionStore},
  verdict::Verdict,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  error::ApiError,
  etag::{check_if_match, compute_etag},
};

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// A JSON response carrying the `ETag` of revision `revision` of `id`.
pub(crate) fn tagged<T: Serialize>(
  status: StatusCode,
  id: Uuid,
  revision: u64,
  body: T,
) -> Response {
  (status, [(header::ETAG, compute_etag(id, revision))], Json(body)).into_response()
}

/// Fetch a live decision or fail with 404.
pub(crate) async fn live_decision<S: DecisionStore>(
  store: &S,
  id: Uuid,
) -> Result<Decision, ApiError> {
  store
    .get_decision(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("decision {id} not found")))
}

/// Resolve `If-Match` for a decision into the revision to check-and-swap on.
pub(crate) async fn expected_revision<S: DecisionStore>(
  store: &S,
  headers: &HeaderMap,
  id: Uuid,
) -> Result<u64, ApiError> {
  let current = live_decision(store, id).await?;
  check_if_match(headers, id, current.revision)
}

fn ok(decision: Decision) -> Response {
  tagged(StatusCode::OK, decision.decision_id, decision.revision, decision)
}

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub user_id:         Option<String>,
  pub workspace_id:    Option<String>,
  #[serde(default)]
  pub include_deleted: bool,
  pub limit:           Option<usize>,
  pub offset:          Option<usize>,
}

impl From<ListParams> for DecisionQuery {
  fn from(p: ListParams) -> Self {
    DecisionQuery {
      user_id:         p.user_id,
      workspace_id:    p.workspace_id,
      include_deleted: p.include_deleted,
      limit:           p.limit,
      offset:          p.offset,
    }
  }
}

/// `GET /decisions`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Decision>>, ApiError>
where
  S: DecisionStore,
{
  let query = DecisionQuery::from(params);
  let decisions = store.list_decisions(&query).await.map_err(ApiError::store)?;
  Ok(Json(decisions))
}

// ─── Create / read / delete ──────────────────────────────────────────────────

/// `POST /decisions`: returns 201 + the stored [`Decision`].
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewDecision>,
) -> Result<Response, ApiError>
where
  S: DecisionStore,
{
  let decision = store.create_decision(body).await.map_err(ApiError::store)?;
  Ok(tagged(
    StatusCode::CREATED,
    decision.decision_id,
    decision.revision,
    decision,
  ))
}

/// `GET /decisions/:id`: the read model, tagged with the decision revision.
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Response, ApiError>
where
  S: DecisionStore,
{
  let view = store
    .materialize(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("decision {id} not found")))?;
  let revision = view.decision.revision;
  Ok(tagged(StatusCode::OK, id, revision, view))
}

/// `DELETE /decisions/:id`: soft delete; 204 on success.
pub async fn delete_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
) -> Result<StatusCode, ApiError>
where
  S: DecisionStore,
{
  let expected = expected_revision(store.as_ref(), &headers, id).await?;
  store.soft_delete(id, expected).await.map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Versioned sub-documents ─────────────────────────────────────────────────

/// JSON body accepted by `POST /decisions/:id/context`.
#[derive(Debug, Deserialize)]
pub struct ContextBody {
  pub patch:  ContextPatch,
  #[serde(default)]
  pub reason: Option<String>,
  #[serde(default)]
  pub actor:  Option<String>,
}

/// `POST /decisions/:id/context`: archives the current context.
pub async fn update_context<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
  Json(body): Json<ContextBody>,
) -> Result<Response, ApiError>
where
  S: DecisionStore,
{
  let expected = expected_revision(store.as_ref(), &headers, id).await?;
  let note = ChangeNote { reason: body.reason, actor: body.actor };
  let decision = store
    .update_context(id, expected, body.patch, note)
    .await
    .map_err(ApiError::store)?;
  Ok(ok(decision))
}

/// JSON body accepted by `POST /decisions/:id/verdict`.
#[derive(Debug, Deserialize)]
pub struct VerdictBody {
  pub verdict: Verdict,
  #[serde(default)]
  pub reason:  Option<String>,
  #[serde(default)]
  pub actor:   Option<String>,
}

/// `POST /decisions/:id/verdict`: archives the current verdict.
pub async fn regenerate_verdict<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
  Json(body): Json<VerdictBody>,
) -> Result<Response, ApiError>
where
  S: DecisionStore,
{
  let expected = expected_revision(store.as_ref(), &headers, id).await?;
  let note = ChangeNote { reason: body.reason, actor: body.actor };
  let decision = store
    .regenerate_verdict(id, expected, body.verdict, note)
    .await
    .map_err(ApiError::store)?;
  Ok(ok(decision))
}

/// `GET /decisions/:id/context/:version`
pub async fn context_version<S>(
  State(store): State<Arc<S>>,
  Path((id, version)): Path<(Uuid, u32)>,
) -> Result<Json<DecisionContext>, ApiError>
where
  S: DecisionStore,
{
  let decision = live_decision(store.as_ref(), id).await?;
  decision
    .context
    .at_version(version)
    .cloned()
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("decision {id} has no context version {version}")))
}

/// `GET /decisions/:id/verdict/:version`
pub async fn verdict_version<S>(
  State(store): State<Arc<S>>,
  Path((id, version)): Path<(Uuid, u32)>,
) -> Result<Json<Verdict>, ApiError>
where
  S: DecisionStore,
{
  let decision = live_decision(store.as_ref(), id).await?;
  decision
    .verdict
    .at_version(version)
    .cloned()
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("decision {id} has no verdict version {version}")))
}

// ─── Status ──────────────────────────────────────────────────────────────────

/// `POST /decisions/:id/status`
pub async fn transition<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
  Json(change): Json<StatusChange>,
) -> Result<Response, ApiError>
where
  S: DecisionStore,
{
  let expected = expected_revision(store.as_ref(), &headers, id).await?;
  let decision = store
    .transition(id, expected, change)
    .await
    .map_err(ApiError::store)?;
  Ok(ok(decision))
}
