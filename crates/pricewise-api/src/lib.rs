//! JSON REST API for Pricewise.
//!
//! Exposes an axum [`Router`] backed by any
//! [`pricewise_core::store::DecisionStore`]. Auth, TLS, and transport
//! concerns are the caller's responsibility.
//!
//! Mutations are conditional: the caller echoes the resource's `ETag` in
//! `If-Match`. A missing header is 428, a mismatch is 412.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", pricewise_api::api_router(store.clone()))
//! ```

pub mod config;
pub mod decisions;
pub mod error;
pub mod etag;
pub mod learning;
pub mod outcomes;
pub mod scenarios;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use pricewise_core::store::DecisionStore;

pub use config::{ServerConfig, TransitionConfig};
pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: DecisionStore + 'static,
{
  Router::new()
    // Decisions
    .route("/decisions", get(decisions::list::<S>).post(decisions::create::<S>))
    .route(
      "/decisions/{id}",
      get(decisions::get_one::<S>).delete(decisions::delete_one::<S>),
    )
    .route("/decisions/{id}/context", post(decisions::update_context::<S>))
    .route(
      "/decisions/{id}/context/{version}",
      get(decisions::context_version::<S>),
    )
    .route("/decisions/{id}/verdict", post(decisions::regenerate_verdict::<S>))
    .route(
      "/decisions/{id}/verdict/{version}",
      get(decisions::verdict_version::<S>),
    )
    .route("/decisions/{id}/status", post(decisions::transition::<S>))
    // Scenarios
    .route("/decisions/{id}/scenarios", post(scenarios::accept::<S>))
    .route("/decisions/{id}/scenarios/apply", post(scenarios::apply::<S>))
    .route(
      "/decisions/{id}/scenarios/{scenario_id}/delta",
      get(scenarios::delta::<S>),
    )
    .route("/scenario-sets/{set_id}", get(scenarios::get_set::<S>))
    // Outcomes
    .route(
      "/decisions/{id}/outcome",
      get(outcomes::get_measurable::<S>).put(outcomes::update_measurable::<S>),
    )
    .route("/decisions/{id}/outcomes", post(outcomes::add_inline::<S>))
    .route(
      "/decisions/{id}/outcomes/{outcome_id}/chain",
      get(outcomes::correction_chain::<S>),
    )
    // Learning
    .route("/learning/snapshots", post(learning::recompute_handler::<S>))
    .route("/learning/snapshots/latest", get(learning::latest::<S>))
    .route("/learning/signals", get(learning::signals::<S>))
    .with_state(store)
}
