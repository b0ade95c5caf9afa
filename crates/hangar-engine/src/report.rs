//! Comparison and baseline reports for one aircraft.
//!
//! Gathers the identity, the applicable requirements, and the evidence from
//! the collaborators, then hands them to the pure functions in
//! [`hangar_core::compare`].

use chrono::{NaiveDate, Utc};
use hangar_core::{
  compare::{self, BaselineReport, ComparisonReport},
  requirement::CanonicalRequirement,
  source::{Catalog, EvidenceSet, EvidenceSource, IdentityResolver, TypeIdentity},
  store::{AuditSink, DetectionStore},
};
use uuid::Uuid;

use crate::{Engine, Error, Result};

struct Inputs {
  identity:     TypeIdentity,
  requirements: Vec<CanonicalRequirement>,
  evidence:     EvidenceSet,
}

impl<S, X> Engine<S, X>
where
  S: DetectionStore + AuditSink + 'static,
  X: IdentityResolver + Catalog + EvidenceSource + 'static,
{
  async fn report_inputs(&self, aircraft_id: Uuid) -> Result<Inputs> {
    let aircraft = self.require_aircraft(aircraft_id).await?;
    let identity = self
      .sources
      .resolve_identity(&aircraft.registration)
      .await
      .map_err(Error::source)?
      .filter(TypeIdentity::is_resolved)
      .ok_or_else(|| {
        Error::NotFound(format!("registry identity for {}", aircraft.registration))
      })?;
    let requirements = self
      .sources
      .applicable_requirements(&identity)
      .await
      .map_err(Error::source)?;
    let evidence = self
      .sources
      .evidence_for(aircraft_id)
      .await
      .map_err(Error::source)?;
    Ok(Inputs { identity, requirements, evidence })
  }

  /// Compare the aircraft's paperwork with the catalog as of today (UTC).
  pub async fn comparison(&self, aircraft_id: Uuid) -> Result<ComparisonReport> {
    self.comparison_as_of(aircraft_id, Utc::now().date_naive()).await
  }

  pub async fn comparison_as_of(
    &self,
    aircraft_id: Uuid,
    today: NaiveDate,
  ) -> Result<ComparisonReport> {
    let inputs = self.report_inputs(aircraft_id).await?;
    Ok(compare::compare(
      &inputs.identity,
      &inputs.requirements,
      &inputs.evidence.records,
      inputs.evidence.last_observed_at,
      today,
    ))
  }

  pub async fn baseline(&self, aircraft_id: Uuid) -> Result<BaselineReport> {
    let inputs = self.report_inputs(aircraft_id).await?;
    Ok(compare::baseline(&inputs.requirements, &inputs.evidence.records))
  }
}
