//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use pricewise_core::{Classify, ErrorKind};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  /// Malformed input caught in the handler; shares 422 with domain
  /// validation errors.
  #[error("invalid request: {0}")]
  Invalid(String),

  /// A mutation arrived without `If-Match`.
  #[error("If-Match header is required")]
  PreconditionRequired,

  /// `If-Match: *` names no revision, so it cannot guard a check-and-swap.
  #[error("If-Match must name a concrete ETag, not `*`")]
  WildcardIfMatch,

  /// `If-Match` names a representation that is no longer current.
  #[error("If-Match does not match the current ETag")]
  EtagMismatch,

  #[error("{source}")]
  Store {
    kind:   ErrorKind,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },
}

impl ApiError {
  /// Wrap a store error, keeping its classification for the status code.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Classify + Send + Sync + 'static,
  {
    ApiError::Store { kind: e.kind(), source: Box::new(e) }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
      ApiError::PreconditionRequired | ApiError::WildcardIfMatch => {
        StatusCode::PRECONDITION_REQUIRED
      }
      ApiError::EtagMismatch => StatusCode::PRECONDITION_FAILED,
      ApiError::Store { kind, .. } => match kind {
        ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Precondition => StatusCode::PRECONDITION_FAILED,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
      },
    }
  }

  fn kind(&self) -> ErrorKind {
    match self {
      ApiError::NotFound(_) => ErrorKind::NotFound,
      ApiError::Invalid(_) => ErrorKind::Validation,
      ApiError::PreconditionRequired
      | ApiError::WildcardIfMatch
      | ApiError::EtagMismatch => {
        ErrorKind::Precondition
      }
      ApiError::Store { kind, .. } => *kind,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }
    let body = json!({ "error": self.to_string(), "kind": self.kind() });
    (status, Json(body)).into_response()
  }
}

/// Invalid settings detected after deserialisation.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("unknown decision status {status:?} in [transitions]; expected one of {expected}")]
  UnknownStatus { status: String, expected: String },
}
