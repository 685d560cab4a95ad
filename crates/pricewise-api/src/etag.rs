//! ETag computation and `If-Match` checking.
//!
//! ETags are SHA-256 hashes over a resource id and its revision. They are
//! opaque to clients; the revision is recovered by comparing against the
//! stored resource, never by decoding the tag.

use axum::http::{HeaderMap, header};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::ApiError;

/// Compute a strong ETag for revision `revision` of resource `id`.
pub fn compute_etag(id: Uuid, revision: u64) -> String {
  let mut hasher = Sha256::new();
  hasher.update(id.as_bytes());
  hasher.update(revision.to_le_bytes());
  format!("\"{}\"", hex::encode(hasher.finalize()))
}

/// Some clients send tags without quotes or with a weak prefix.
pub fn strip_etag_quotes(tag: &str) -> &str {
  let tag = tag.trim();
  tag.strip_prefix("W/").unwrap_or(tag).trim_matches('"')
}

/// Check `If-Match` against the current revision of `id`.
///
/// Returns `revision` on success so handlers can pass it on as the expected
/// revision. `*` is refused: it would match whatever revision the handler
/// just read.
pub fn check_if_match(
  headers: &HeaderMap,
  id: Uuid,
  revision: u64,
) -> Result<u64, ApiError> {
  let raw = headers
    .get(header::IF_MATCH)
    .ok_or(ApiError::PreconditionRequired)?
    .to_str()
    .map_err(|_| ApiError::Invalid("If-Match is not valid ASCII".into()))?;

  let tags: Vec<&str> = raw.split(',').map(strip_etag_quotes).collect();
  if tags.contains(&"*") {
    return Err(ApiError::WildcardIfMatch);
  }

  let current = compute_etag(id, revision);
  let current = strip_etag_quotes(&current);
  let matched = tags.contains(&current);

  if matched { Ok(revision) } else { Err(ApiError::EtagMismatch) }
}
