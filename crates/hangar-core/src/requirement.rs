//! Canonical requirements: the published AD/SB items.
//!
//! Requirements are owned by the external catalog-import process. The engine
//! reads them; it never edits one, and deactivation is the only change a
//! published requirement ever sees.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{
  reference::normalize_name,
  source::{TypeIdentity, designator_is_usable},
};

// ─── Kind ────────────────────────────────────────────────────────────────────

/// Airworthiness Directive or Service Bulletin.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum RequirementKind {
  #[serde(rename = "AD")]
  #[strum(serialize = "AD")]
  Ad,
  #[serde(rename = "SB")]
  #[strum(serialize = "SB")]
  Sb,
}

// ─── Recurrence ──────────────────────────────────────────────────────────────

/// The repetition rule attached to a requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecurrencePolicy {
  /// One-time action; nothing recurs.
  #[default]
  Once,
  Years(u32),
  Hours(u32),
  Cycles(u32),
  CalendarMonths(u32),
}

// ─── Applicability ───────────────────────────────────────────────────────────

/// Which aircraft a requirement applies to.
///
/// `model` may list several models separated by commas (`"150, 152, 172"`);
/// each entry also matches model families (`172` covers `172M`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applicability {
  pub designator:   Option<String>,
  pub manufacturer: Option<String>,
  pub model:        Option<String>,
}

impl Applicability {
  /// Whether an aircraft with `identity` falls under this applicability.
  ///
  /// Designator equality is sufficient. Otherwise manufacturer must match
  /// exactly (after normalization) and model must match per
  /// [`model_matches`]. An applicability with no usable fields matches
  /// nothing.
  pub fn covers(&self, identity: &TypeIdentity) -> bool {
    if let (Some(ours), Some(theirs)) =
      (self.designator.as_deref(), identity.designator.as_deref())
      && designator_is_usable(ours)
      && designator_is_usable(theirs)
      && ours.trim().eq_ignore_ascii_case(theirs.trim())
    {
      return true;
    }

    let (Some(req_mfr), Some(req_model), Some(ac_mfr), Some(ac_model)) = (
      self.manufacturer.as_deref(),
      self.model.as_deref(),
      identity.manufacturer.as_deref(),
      identity.model.as_deref(),
    ) else {
      return false;
    };

    let req_mfr = normalize_name(req_mfr);
    !req_mfr.is_empty()
      && req_mfr == normalize_name(ac_mfr)
      && model_matches(ac_model, req_model)
  }
}

/// Match an aircraft model against a requirement's model list.
///
/// Each comma-separated token matches on equality or when either side is a
/// prefix of the other.
pub fn model_matches(aircraft_model: &str, pattern: &str) -> bool {
  let aircraft = normalize_name(aircraft_model);
  if aircraft.is_empty() {
    return false;
  }
  pattern
    .split(',')
    .map(normalize_name)
    .filter(|token| !token.is_empty())
    .any(|token| aircraft.starts_with(&token) || token.starts_with(&aircraft))
}

// ─── Requirement ─────────────────────────────────────────────────────────────

/// A published regulatory item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRequirement {
  pub reference:         String,
  pub kind:              RequirementKind,
  pub title:             Option<String>,
  pub applicability:     Applicability,
  pub effective_date:    Option<NaiveDate>,
  pub recurrence_policy: RecurrencePolicy,
  /// Meaningful for service bulletins only; ADs are always mandatory.
  pub mandatory:         bool,
  /// Deactivated requirements are kept for history but apply to nothing.
  pub active:            bool,
}

impl CanonicalRequirement {
  /// Convenience constructor: active, non-recurring, no dates or title.
  pub fn new(
    reference: impl Into<String>,
    kind: RequirementKind,
    applicability: Applicability,
  ) -> Self {
    Self {
      reference: reference.into(),
      kind,
      title: None,
      applicability,
      effective_date: None,
      recurrence_policy: RecurrencePolicy::Once,
      mandatory: matches!(kind, RequirementKind::Ad),
      active: true,
    }
  }

  pub fn applies_to(&self, identity: &TypeIdentity) -> bool {
    self.active && self.applicability.covers(identity)
  }
}
