//! Interfaces to the engine's external collaborators.
//!
//! The registry lookup, the regulator catalog, and document ingestion are
//! owned by other processes. The engine only consumes them through these
//! traits.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{evidence::EvidenceRecord, reference::TypeKey, requirement::CanonicalRequirement};

// ─── Identity ────────────────────────────────────────────────────────────────

/// Placeholder values seen in registry exports that must never be used as a
/// designator.
const PLACEHOLDER_DESIGNATORS: [&str; 6] = ["", "AUCUN", "N/A", "NONE", "NULL", "UNKNOWN"];

/// Type identity of an aircraft as reported by the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeIdentity {
  /// Type-certificate designator.
  pub designator:   Option<String>,
  pub manufacturer: Option<String>,
  pub model:        Option<String>,
}

impl TypeIdentity {
  /// The collaborative grouping key, when both manufacturer and model are
  /// known.
  pub fn type_key(&self) -> Option<TypeKey> {
    TypeKey::new(self.manufacturer.as_deref()?, self.model.as_deref()?)
  }

  /// The designator, if it is usable for catalog lookups.
  pub fn usable_designator(&self) -> Option<&str> {
    self
      .designator
      .as_deref()
      .filter(|d| designator_is_usable(d))
      .map(str::trim)
  }

  /// Whether there is enough here to query the catalog at all.
  pub fn is_resolved(&self) -> bool {
    self.usable_designator().is_some() || self.type_key().is_some()
  }
}

/// `false` for blanks, registry placeholders, and strings shaped like a
/// registration mark (`C-GABC`, `CGABC`).
pub fn designator_is_usable(designator: &str) -> bool {
  let cleaned = designator.trim().to_ascii_uppercase();
  if PLACEHOLDER_DESIGNATORS.contains(&cleaned.as_str()) {
    return false;
  }
  let looks_like_registration = cleaned.starts_with("C-")
    || (cleaned.len() == 5
      && cleaned.starts_with('C')
      && cleaned[1..].chars().all(|c| c.is_ascii_alphabetic()));
  !looks_like_registration
}

// ─── Evidence ────────────────────────────────────────────────────────────────

/// Everything known from an aircraft's paperwork.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvidenceSet {
  pub records:          Vec<EvidenceRecord>,
  /// The most recent moment any evidence was observed.
  pub last_observed_at: Option<DateTime<Utc>>,
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// Maps a registration mark to a type identity.
pub trait IdentityResolver: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// `None` when the registry has no usable entry. Callers must not guess.
  fn resolve_identity<'a>(
    &'a self,
    registration: &'a str,
  ) -> impl Future<Output = Result<Option<TypeIdentity>, Self::Error>> + Send + 'a;
}

/// Read-only view of the regulator's AD/SB catalog.
pub trait Catalog: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// All active requirements applicable to `identity`, in catalog order.
  fn applicable_requirements<'a>(
    &'a self,
    identity: &'a TypeIdentity,
  ) -> impl Future<Output = Result<Vec<CanonicalRequirement>, Self::Error>> + Send + 'a;

  /// Version label of the most recent catalog import (e.g. `"2026-06"`).
  fn current_version(
    &self,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + '_;
}

/// Evidence extracted from an aircraft's documents or entered by hand.
pub trait EvidenceSource: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn evidence_for(
    &self,
    aircraft_id: Uuid,
  ) -> impl Future<Output = Result<EvidenceSet, Self::Error>> + Send + '_;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn placeholders_and_registrations_are_not_designators() {
    for bad in ["", "  ", "n/a", "None", "UNKNOWN", "aucun", "C-GABC", "CGABC"] {
      assert!(!designator_is_usable(bad), "{bad:?} should be rejected");
    }
    for good in ["3A12", "A-7", "CF-1234"] {
      assert!(designator_is_usable(good), "{good:?} should be accepted");
    }
  }

  #[test]
  fn identity_without_designator_or_type_is_unresolved() {
    let identity = TypeIdentity {
      designator:   Some("NONE".into()),
      manufacturer: Some("Cessna".into()),
      model:        None,
    };
    assert!(!identity.is_resolved());
    assert!(identity.type_key().is_none());
  }

  #[test]
  fn identity_with_make_and_model_is_resolved() {
    let identity = TypeIdentity {
      designator:   None,
      manufacturer: Some("Piper".into()),
      model:        Some("PA-28".into()),
    };
    assert!(identity.is_resolved());
    assert_eq!(identity.type_key().unwrap().as_str(), "PIPER::PA28");
  }
}
