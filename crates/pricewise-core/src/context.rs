//! Decision context: the business facts a verdict was reasoned from.
//!
//! The context is versioned independently of the verdict. Updates arrive as a
//! [`ContextPatch`] carrying raw strings (as produced by forms and inference
//! output) and are validated against the closed vocabularies below.

use std::{collections::BTreeMap, str::FromStr};

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::{Error, Result};

// ─── Vocabularies ────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  EnumString,
  Display,
  AsRefStr,
  EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CompanyStage {
  PreRevenue,
  Early,
  Growth,
  Scale,
  Enterprise,
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  EnumString,
  Display,
  AsRefStr,
  EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BusinessModel {
  Subscription,
  UsageBased,
  Freemium,
  Marketplace,
  Transactional,
  Hybrid,
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  EnumString,
  Display,
  AsRefStr,
  EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MarketType {
  B2b,
  B2c,
  B2b2c,
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  EnumString,
  Display,
  AsRefStr,
  EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MarketSegment {
  Smb,
  MidMarket,
  Enterprise,
  Consumer,
  Prosumer,
  Developer,
}

/// The business metric a decision is primarily trying to move. The
/// `snake_case` name doubles as the KPI key in metric maps and outcome KPIs.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  EnumString,
  Display,
  AsRefStr,
  EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PrimaryKpi {
  Mrr,
  Arpu,
  Churn,
  Conversion,
  Expansion,
  Activation,
}

// ─── Context ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionContext {
  pub company_stage:   Option<CompanyStage>,
  pub business_model:  Option<BusinessModel>,
  pub market_type:     Option<MarketType>,
  pub market_segment:  Option<MarketSegment>,
  pub primary_kpi:     Option<PrimaryKpi>,
  /// Free-text description of the current price points.
  pub pricing_summary: Option<String>,
  /// Current business metrics keyed by KPI key (e.g. `"mrr"`, `"churn"`).
  /// Seeds KPI baselines when a scenario is applied.
  #[serde(default)]
  pub metrics:         BTreeMap<String, f64>,
  pub notes:           Option<String>,
}

impl DecisionContext {
  /// The current value of a business metric, if known.
  pub fn metric(&self, key: &str) -> Option<f64> {
    self.metrics.get(key).copied()
  }
}

// ─── Patch ───────────────────────────────────────────────────────────────────

/// A partial context update. Unset fields keep their current value; metrics
/// merge by key.
///
/// Vocabulary fields are raw strings so that unknown values surface as
/// [`Error::UnknownValue`] rather than a decoding failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContextPatch {
  pub company_stage:   Option<String>,
  pub business_model:  Option<String>,
  pub market_type:     Option<String>,
  pub market_segment:  Option<String>,
  pub primary_kpi:     Option<String>,
  pub pricing_summary: Option<String>,
  pub metrics:         BTreeMap<String, f64>,
  pub notes:           Option<String>,
}

impl ContextPatch {
  /// Validate the patch and produce the context that results from applying it
  /// to `current`. `current` is not modified.
  pub fn apply_to(&self, current: &DecisionContext) -> Result<DecisionContext> {
    let mut next = current.clone();

    if let Some(raw) = &self.company_stage {
      next.company_stage = Some(parse_vocab("company_stage", raw)?);
    }
    if let Some(raw) = &self.business_model {
      next.business_model = Some(parse_vocab("business_model", raw)?);
    }
    if let Some(raw) = &self.market_type {
      next.market_type = Some(parse_vocab("market_type", raw)?);
    }
    if let Some(raw) = &self.market_segment {
      next.market_segment = Some(parse_vocab("market_segment", raw)?);
    }
    if let Some(raw) = &self.primary_kpi {
      next.primary_kpi = Some(parse_vocab("primary_kpi", raw)?);
    }
    if let Some(summary) = &self.pricing_summary {
      next.pricing_summary = Some(summary.clone());
    }
    if let Some(notes) = &self.notes {
      next.notes = Some(notes.clone());
    }

    for (key, value) in &self.metrics {
      if key.trim().is_empty() {
        return Err(Error::invalid("metrics", "metric key must not be empty"));
      }
      if !value.is_finite() {
        return Err(Error::invalid("metrics", format!("{key} is not finite")));
      }
      next.metrics.insert(key.clone(), *value);
    }

    Ok(next)
  }
}

fn parse_vocab<T: FromStr>(field: &'static str, raw: &str) -> Result<T> {
  raw.trim().parse().map_err(|_| Error::UnknownValue {
    field,
    value: raw.to_owned(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::{Classify, ErrorKind};

  #[test]
  fn patch_parses_known_values() {
    let patch = ContextPatch {
      company_stage: Some("growth".into()),
      market_segment: Some("mid_market".into()),
      primary_kpi: Some("mrr".into()),
      ..Default::default()
    };

    let next = patch.apply_to(&DecisionContext::default()).unwrap();
    assert_eq!(next.company_stage, Some(CompanyStage::Growth));
    assert_eq!(next.market_segment, Some(MarketSegment::MidMarket));
    assert_eq!(next.primary_kpi, Some(PrimaryKpi::Mrr));
    assert_eq!(next.business_model, None);
  }

  #[test]
  fn patch_rejects_unknown_vocabulary() {
    for patch in [
      ContextPatch { company_stage: Some("unicorn".into()), ..Default::default() },
      ContextPatch { business_model: Some("barter".into()), ..Default::default() },
      ContextPatch { market_type: Some("b2g".into()), ..Default::default() },
      ContextPatch { market_segment: Some("galactic".into()), ..Default::default() },
      ContextPatch { primary_kpi: Some("vibes".into()), ..Default::default() },
    ] {
      let err = patch.apply_to(&DecisionContext::default()).unwrap_err();
      assert_eq!(err.kind(), ErrorKind::Validation, "{err}");
    }
  }

  #[test]
  fn patch_keeps_unset_fields_and_merges_metrics() {
    let mut current = DecisionContext {
      company_stage: Some(CompanyStage::Early),
      notes: Some("keep me".into()),
      ..Default::default()
    };
    current.metrics.insert("mrr".into(), 10_000.0);
    current.metrics.insert("churn".into(), 4.0);

    let mut patch = ContextPatch::default();
    patch.metrics.insert("churn".into(), 3.5);
    patch.metrics.insert("arpu".into(), 49.0);

    let next = patch.apply_to(&current).unwrap();
    assert_eq!(next.company_stage, Some(CompanyStage::Early));
    assert_eq!(next.notes.as_deref(), Some("keep me"));
    assert_eq!(next.metric("mrr"), Some(10_000.0));
    assert_eq!(next.metric("churn"), Some(3.5));
    assert_eq!(next.metric("arpu"), Some(49.0));
  }

  #[test]
  fn patch_rejects_non_finite_metrics() {
    let mut patch = ContextPatch::default();
    patch.metrics.insert("mrr".into(), f64::NAN);
    assert!(patch.apply_to(&DecisionContext::default()).is_err());
  }
}
