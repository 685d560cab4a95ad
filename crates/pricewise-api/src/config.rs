//! Runtime configuration, deserialised from `config.toml` layered under
//! `PRICEWISE_*` environment variables.

use std::{collections::BTreeMap, path::PathBuf, str::FromStr};

use pricewise_core::status::{DecisionStatus, TransitionPolicy};
use serde::Deserialize;
use strum::IntoEnumIterator as _;

use crate::error::ConfigError;

// ─── Server ──────────────────────────────────────────────────────────────────

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
  pub host:        String,
  pub port:        u16,
  pub store_path:  PathBuf,
  #[serde(default)]
  pub transitions: TransitionConfig,
}

// ─── Transitions ─────────────────────────────────────────────────────────────

/// Which status transition graph to start from.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransitionPreset {
  /// Any status may follow any other.
  #[default]
  Permissive,
  /// See [`TransitionPolicy::recommended`].
  Recommended,
}

/// The `[transitions]` table.
///
/// ```toml
/// [transitions]
/// preset = "permissive"
/// require_timestamps = true
///
/// [transitions.allowed]
/// proposed = ["accepted", "rejected"]
/// accepted = ["implemented"]
/// ```
///
/// An `allowed` table replaces the preset with an explicit whitelist.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct TransitionConfig {
  #[serde(default)]
  pub preset:             TransitionPreset,
  #[serde(default)]
  pub allowed:            Option<BTreeMap<String, Vec<String>>>,
  #[serde(default)]
  pub require_timestamps: bool,
}

fn parse_status(raw: &str) -> Result<DecisionStatus, ConfigError> {
  DecisionStatus::from_str(raw.trim())
    .map_err(|_| ConfigError::UnknownStatus {
      status:   raw.to_owned(),
      expected: DecisionStatus::iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", "),
    })
}

impl TransitionConfig {
  pub fn policy(&self) -> Result<TransitionPolicy, ConfigError> {
    let policy = match (&self.allowed, self.preset) {
      (Some(allowed), _) => {
        let mut pairs = Vec::new();
        for (from, targets) in allowed {
          let from = parse_status(from)?;
          for to in targets {
            pairs.push((from, parse_status(to)?));
          }
        }
        TransitionPolicy::whitelist(pairs)
      }
      (None, TransitionPreset::Permissive) => TransitionPolicy::permissive(),
      (None, TransitionPreset::Recommended) => TransitionPolicy::recommended(),
    };
    Ok(policy.with_required_timestamps(self.require_timestamps))
  }
}
