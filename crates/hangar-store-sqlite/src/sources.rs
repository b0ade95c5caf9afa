//! The collaborator tables: aircraft, registry, catalog, and evidence.
//!
//! These are written by the fleet surface and the import/ingestion
//! processes through the inherent methods below, and read by the engine
//! through [`IdentityResolver`], [`Catalog`], and [`EvidenceSource`].

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use hangar_core::{
  evidence::EvidenceRecord,
  knowledge::Aircraft,
  reference::normalize_registration,
  requirement::CanonicalRequirement,
  source::{Catalog, EvidenceSet, EvidenceSource, IdentityResolver, TypeIdentity},
};

use crate::{
  encode::{
    encode_date, encode_dt, encode_recurrence, encode_uuid, RawEvidence, RawRequirement,
  },
  store::SqliteStore,
  Error, Result,
};

// ─── Writes ──────────────────────────────────────────────────────────────────

impl SqliteStore {
  /// Register an aircraft for `owner_id`.
  pub async fn add_aircraft(
    &self,
    owner_id: impl Into<String>,
    registration: impl Into<String>,
  ) -> Result<Aircraft> {
    let aircraft = Aircraft {
      aircraft_id:  Uuid::new_v4(),
      owner_id:     owner_id.into(),
      registration: registration.into(),
      created_at:   Utc::now(),
    };

    let id_str = encode_uuid(aircraft.aircraft_id);
    let owner = aircraft.owner_id.clone();
    let registration = aircraft.registration.clone();
    let created_at = encode_dt(aircraft.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO aircraft (aircraft_id, owner_id, registration, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, owner, registration, created_at],
        )?;
        Ok(())
      })
      .await?;

    Ok(aircraft)
  }

  /// Remove an aircraft and, by cascade, its evidence, knowledge, and alerts.
  /// The type pool keeps what it learned. Returns `false` if it did not
  /// exist.
  pub async fn remove_aircraft(&self, aircraft_id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(aircraft_id);
    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM aircraft WHERE aircraft_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;
    Ok(removed == 1)
  }

  /// Insert or replace the registry entry for a registration mark.
  pub async fn upsert_registry(&self, registration: &str, identity: TypeIdentity) -> Result<()> {
    let key = normalize_registration(registration);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO registry (registration_norm, designator, manufacturer, model)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT(registration_norm) DO UPDATE SET
             designator = excluded.designator,
             manufacturer = excluded.manufacturer,
             model = excluded.model",
          rusqlite::params![key, identity.designator, identity.manufacturer, identity.model],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Append a requirement to the catalog under `catalog_version`.
  pub async fn publish_requirement(
    &self,
    requirement: &CanonicalRequirement,
    catalog_version: &str,
  ) -> Result<()> {
    let reference = requirement.reference.clone();
    let kind = requirement.kind.to_string();
    let title = requirement.title.clone();
    let applicability = requirement.applicability.clone();
    let effective_date = requirement.effective_date.map(encode_date);
    let recurrence = encode_recurrence(&requirement.recurrence_policy)?;
    let mandatory = requirement.mandatory;
    let active = requirement.active;
    let version = catalog_version.to_owned();
    let published_at = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO requirements
             (reference, kind, title, designator, manufacturer, model, effective_date,
              recurrence, mandatory, active, catalog_version, published_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
          rusqlite::params![
            reference,
            kind,
            title,
            applicability.designator,
            applicability.manufacturer,
            applicability.model,
            effective_date,
            recurrence,
            mandatory,
            active,
            version,
            published_at
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Deactivate every catalog entry with this exact reference. Returns how
  /// many rows changed.
  pub async fn deactivate_requirement(&self, reference: &str) -> Result<usize> {
    let reference = reference.to_owned();
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE requirements SET active = 0 WHERE reference = ?1 AND active = 1",
          rusqlite::params![reference],
        )?)
      })
      .await?;
    Ok(changed)
  }

  /// Append an evidence record for an aircraft.
  pub async fn record_evidence(&self, aircraft_id: Uuid, record: &EvidenceRecord) -> Result<()> {
    let evidence_id = encode_uuid(Uuid::new_v4());
    let aircraft_str = encode_uuid(aircraft_id);
    let reference = record.reference.clone();
    let kind = record.kind.to_string();
    let compliance_date = record.compliance_date.map(encode_date);
    let airframe_hours = record.airframe_hours;
    let description = record.description.clone();
    let source = record.source.to_string();
    let observed_at = encode_dt(record.observed_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO evidence
             (evidence_id, aircraft_id, reference, kind, compliance_date, airframe_hours,
              description, source, observed_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            evidence_id,
            aircraft_str,
            reference,
            kind,
            compliance_date,
            airframe_hours,
            description,
            source,
            observed_at
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Reads ───────────────────────────────────────────────────────────────────

impl IdentityResolver for SqliteStore {
  type Error = Error;

  async fn resolve_identity<'a>(&'a self, registration: &'a str) -> Result<Option<TypeIdentity>> {
    let key = normalize_registration(registration);
    if key.is_empty() {
      return Ok(None);
    }

    let identity = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT designator, manufacturer, model FROM registry WHERE registration_norm = ?1",
              rusqlite::params![key],
              |r| {
                Ok(TypeIdentity {
                  designator:   r.get(0)?,
                  manufacturer: r.get(1)?,
                  model:        r.get(2)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    Ok(identity.filter(TypeIdentity::is_resolved))
  }
}

impl Catalog for SqliteStore {
  type Error = Error;

  async fn applicable_requirements<'a>(
    &'a self,
    identity: &'a TypeIdentity,
  ) -> Result<Vec<CanonicalRequirement>> {
    let raws: Vec<RawRequirement> = self
      .conn
      .call(|conn| {
        let sql = format!(
          "SELECT {} FROM requirements WHERE active = 1 ORDER BY requirement_id",
          RawRequirement::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], RawRequirement::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut applicable = Vec::new();
    for raw in raws {
      let requirement = raw.into_requirement()?;
      if requirement.applies_to(identity) {
        applicable.push(requirement);
      }
    }
    Ok(applicable)
  }

  async fn current_version(&self) -> Result<Option<String>> {
    let version = self
      .conn
      .call(|conn| {
        Ok(
          conn
            .query_row(
              "SELECT catalog_version FROM requirements ORDER BY requirement_id DESC LIMIT 1",
              [],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;
    Ok(version)
  }
}

impl EvidenceSource for SqliteStore {
  type Error = Error;

  async fn evidence_for(&self, aircraft_id: Uuid) -> Result<EvidenceSet> {
    let id_str = encode_uuid(aircraft_id);
    let raws: Vec<RawEvidence> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM evidence WHERE aircraft_id = ?1 ORDER BY rowid",
          RawEvidence::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawEvidence::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let records = raws
      .into_iter()
      .map(RawEvidence::into_record)
      .collect::<Result<Vec<_>>>()?;
    let last_observed_at = records.iter().map(|r| r.observed_at).max();

    Ok(EvidenceSet { records, last_observed_at })
  }
}
