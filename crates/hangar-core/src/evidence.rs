//! Evidence records: what an aircraft's paperwork says was done.
//!
//! Evidence is append-only and owned by the ingestion side. The `reference`
//! is kept exactly as written on the document; normalization happens only at
//! comparison time, so the raw value is never lost.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::requirement::RequirementKind;

/// Where an evidence record came from.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EvidenceOrigin {
  /// Extracted from a scanned or uploaded document.
  #[default]
  Document,
  /// Typed in by a user.
  Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
  /// The reference as written on the source document.
  pub reference:       String,
  pub kind:            RequirementKind,
  pub compliance_date: Option<NaiveDate>,
  pub airframe_hours:  Option<f64>,
  pub description:     Option<String>,
  pub source:          EvidenceOrigin,
  pub observed_at:     DateTime<Utc>,
}

impl EvidenceRecord {
  /// Convenience constructor with no compliance data.
  pub fn new(
    reference: impl Into<String>,
    kind: RequirementKind,
    observed_at: DateTime<Utc>,
  ) -> Self {
    Self {
      reference: reference.into(),
      kind,
      compliance_date: None,
      airframe_hours: None,
      description: None,
      source: EvidenceOrigin::default(),
      observed_at,
    }
  }

  /// The date this record says the work was done, falling back to the day
  /// the record was observed.
  pub fn recorded_date(&self) -> NaiveDate {
    self
      .compliance_date
      .unwrap_or_else(|| self.observed_at.date_naive())
  }
}
