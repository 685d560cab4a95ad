//! Error type for `pricewise-store-sqlite`.

use pricewise_core::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] pricewise_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  /// A stored row disagrees with its own document.
  #[error("corrupt row: {0}")]
  Corrupt(String),
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Error::Core(e) => e.kind(),
      Error::Database(_) | Error::Json(_) | Error::Uuid(_) | Error::Corrupt(_) => {
        ErrorKind::Internal
      }
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
