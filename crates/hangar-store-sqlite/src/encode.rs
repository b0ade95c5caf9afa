//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings and calendar dates as ISO
//! `YYYY-MM-DD`. Enums use their wire names. Recurrence policies and
//! reference lists are stored as compact JSON. UUIDs are stored as hyphenated
//! lowercase strings.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use hangar_core::{
  alert::{Alert, AlertStatus},
  audit::{AuditEvent, AuditEventType},
  evidence::{EvidenceOrigin, EvidenceRecord},
  knowledge::{Aircraft, AircraftKnowledgeState},
  reference::TypeKey,
  requirement::{Applicability, CanonicalRequirement, RecurrencePolicy, RequirementKind},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> / NaiveDate ───────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn decode_kind(s: &str) -> Result<RequirementKind> {
  s.parse()
    .map_err(|_| hangar_core::Error::UnknownKind(s.to_owned()).into())
}

pub fn decode_alert_status(s: &str) -> Result<AlertStatus> {
  s.parse()
    .map_err(|_| hangar_core::Error::UnknownAlertStatus(s.to_owned()).into())
}

pub fn decode_event_type(s: &str) -> Result<AuditEventType> {
  s.parse()
    .map_err(|_| hangar_core::Error::UnknownEventType(s.to_owned()).into())
}

pub fn decode_origin(s: &str) -> Result<EvidenceOrigin> {
  s.parse()
    .map_err(|_| hangar_core::Error::InvalidIdentifier(s.to_owned()).into())
}

pub fn decode_type_key(s: &str) -> Result<TypeKey> { Ok(s.parse()?) }

// ─── JSON columns ────────────────────────────────────────────────────────────

pub fn encode_recurrence(policy: &RecurrencePolicy) -> Result<String> {
  Ok(serde_json::to_string(policy)?)
}

pub fn decode_recurrence(s: &str) -> Result<RecurrencePolicy> {
  Ok(serde_json::from_str(s)?)
}

pub fn encode_refs(refs: &[String]) -> Result<String> { Ok(serde_json::to_string(refs)?) }

pub fn decode_refs(s: &str) -> Result<Vec<String>> { Ok(serde_json::from_str(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from an `aircraft` row.
pub struct RawAircraft {
  pub aircraft_id:  String,
  pub owner_id:     String,
  pub registration: String,
  pub created_at:   String,
}

impl RawAircraft {
  pub const COLUMNS: &'static str = "aircraft_id, owner_id, registration, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      aircraft_id:  row.get(0)?,
      owner_id:     row.get(1)?,
      registration: row.get(2)?,
      created_at:   row.get(3)?,
    })
  }

  pub fn into_aircraft(self) -> Result<Aircraft> {
    Ok(Aircraft {
      aircraft_id:  decode_uuid(&self.aircraft_id)?,
      owner_id:     self.owner_id,
      registration: self.registration,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

/// A `knowledge_states` row plus its `known_references`.
pub struct RawKnowledge {
  pub aircraft_id:            String,
  pub type_key:               Option<String>,
  pub last_processed_version: Option<String>,
  pub alert_active:           bool,
  pub new_count:              u32,
  pub last_reviewed_at:       Option<String>,
  pub updated_at:             String,
  pub known_references:       Vec<String>,
}

impl RawKnowledge {
  /// Read one state and its references. Works inside a transaction.
  pub fn read(
    conn: &rusqlite::Connection,
    aircraft_id: &str,
  ) -> rusqlite::Result<Option<Self>> {
    use rusqlite::OptionalExtension as _;

    let row = conn
      .query_row(
        "SELECT aircraft_id, type_key, last_processed_version, alert_active,
                new_count, last_reviewed_at, updated_at
         FROM knowledge_states WHERE aircraft_id = ?1",
        rusqlite::params![aircraft_id],
        |r| {
          Ok(Self {
            aircraft_id:            r.get(0)?,
            type_key:               r.get(1)?,
            last_processed_version: r.get(2)?,
            alert_active:           r.get(3)?,
            new_count:              r.get(4)?,
            last_reviewed_at:       r.get(5)?,
            updated_at:             r.get(6)?,
            known_references:       Vec::new(),
          })
        },
      )
      .optional()?;

    let Some(mut raw) = row else {
      return Ok(None);
    };

    let mut stmt = conn.prepare(
      "SELECT reference FROM known_references WHERE aircraft_id = ?1 ORDER BY reference",
    )?;
    raw.known_references = stmt
      .query_map(rusqlite::params![aircraft_id], |r| r.get(0))?
      .collect::<rusqlite::Result<_>>()?;

    Ok(Some(raw))
  }

  pub fn into_state(self) -> Result<AircraftKnowledgeState> {
    Ok(AircraftKnowledgeState {
      aircraft_id:            decode_uuid(&self.aircraft_id)?,
      type_key:               self.type_key.as_deref().map(decode_type_key).transpose()?,
      known_references:       self.known_references.into_iter().collect(),
      last_processed_version: self.last_processed_version,
      alert_active:           self.alert_active,
      new_count:              self.new_count,
      last_reviewed_at:       self.last_reviewed_at.as_deref().map(decode_dt).transpose()?,
      updated_at:             decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from an `alerts` row.
pub struct RawAlert {
  pub alert_id:     String,
  pub type_key:     String,
  pub aircraft_id:  String,
  pub reference:    String,
  pub kind:         String,
  pub status:       String,
  pub created_at:   String,
  pub read_at:      Option<String>,
  pub dismissed_at: Option<String>,
}

impl RawAlert {
  pub const COLUMNS: &'static str = "alerts.alert_id, alerts.type_key, alerts.aircraft_id, \
     alerts.reference, alerts.kind, alerts.status, alerts.created_at, alerts.read_at, \
     alerts.dismissed_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      alert_id:     row.get(0)?,
      type_key:     row.get(1)?,
      aircraft_id:  row.get(2)?,
      reference:    row.get(3)?,
      kind:         row.get(4)?,
      status:       row.get(5)?,
      created_at:   row.get(6)?,
      read_at:      row.get(7)?,
      dismissed_at: row.get(8)?,
    })
  }

  pub fn into_alert(self) -> Result<Alert> {
    Ok(Alert {
      id:           decode_uuid(&self.alert_id)?,
      type_key:     decode_type_key(&self.type_key)?,
      aircraft_id:  decode_uuid(&self.aircraft_id)?,
      reference:    self.reference,
      kind:         decode_kind(&self.kind)?,
      status:       decode_alert_status(&self.status)?,
      created_at:   decode_dt(&self.created_at)?,
      read_at:      self.read_at.as_deref().map(decode_dt).transpose()?,
      dismissed_at: self.dismissed_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

/// Raw strings read directly from an `audit_log` row.
pub struct RawAuditEvent {
  pub event_id:     String,
  pub event_type:   String,
  pub aircraft_id:  Option<String>,
  pub version:      Option<String>,
  pub new_count:    u32,
  pub refs:         String,
  pub triggered_by: String,
  pub notes:        Option<String>,
  pub at:           String,
}

impl RawAuditEvent {
  pub const COLUMNS: &'static str =
    "event_id, event_type, aircraft_id, version, new_count, refs, triggered_by, notes, at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      event_id:     row.get(0)?,
      event_type:   row.get(1)?,
      aircraft_id:  row.get(2)?,
      version:      row.get(3)?,
      new_count:    row.get(4)?,
      refs:         row.get(5)?,
      triggered_by: row.get(6)?,
      notes:        row.get(7)?,
      at:           row.get(8)?,
    })
  }

  pub fn into_event(self) -> Result<AuditEvent> {
    Ok(AuditEvent {
      id:           decode_uuid(&self.event_id)?,
      event_type:   decode_event_type(&self.event_type)?,
      aircraft_id:  self.aircraft_id.as_deref().map(decode_uuid).transpose()?,
      version:      self.version,
      new_count:    self.new_count,
      refs:         decode_refs(&self.refs)?,
      triggered_by: self.triggered_by,
      notes:        self.notes,
      at:           decode_dt(&self.at)?,
    })
  }
}

/// Raw strings read directly from a `requirements` row.
pub struct RawRequirement {
  pub reference:      String,
  pub kind:           String,
  pub title:          Option<String>,
  pub designator:     Option<String>,
  pub manufacturer:   Option<String>,
  pub model:          Option<String>,
  pub effective_date: Option<String>,
  pub recurrence:     String,
  pub mandatory:      bool,
  pub active:         bool,
}

impl RawRequirement {
  pub const COLUMNS: &'static str = "reference, kind, title, designator, manufacturer, model, \
     effective_date, recurrence, mandatory, active";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      reference:      row.get(0)?,
      kind:           row.get(1)?,
      title:          row.get(2)?,
      designator:     row.get(3)?,
      manufacturer:   row.get(4)?,
      model:          row.get(5)?,
      effective_date: row.get(6)?,
      recurrence:     row.get(7)?,
      mandatory:      row.get(8)?,
      active:         row.get(9)?,
    })
  }

  pub fn into_requirement(self) -> Result<CanonicalRequirement> {
    Ok(CanonicalRequirement {
      reference:         self.reference,
      kind:              decode_kind(&self.kind)?,
      title:             self.title,
      applicability:     Applicability {
        designator:   self.designator,
        manufacturer: self.manufacturer,
        model:        self.model,
      },
      effective_date:    self.effective_date.as_deref().map(decode_date).transpose()?,
      recurrence_policy: decode_recurrence(&self.recurrence)?,
      mandatory:         self.mandatory,
      active:            self.active,
    })
  }
}

/// Raw strings read directly from an `evidence` row.
pub struct RawEvidence {
  pub reference:       String,
  pub kind:            String,
  pub compliance_date: Option<String>,
  pub airframe_hours:  Option<f64>,
  pub description:     Option<String>,
  pub source:          String,
  pub observed_at:     String,
}

impl RawEvidence {
  pub const COLUMNS: &'static str =
    "reference, kind, compliance_date, airframe_hours, description, source, observed_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      reference:       row.get(0)?,
      kind:            row.get(1)?,
      compliance_date: row.get(2)?,
      airframe_hours:  row.get(3)?,
      description:     row.get(4)?,
      source:          row.get(5)?,
      observed_at:     row.get(6)?,
    })
  }

  pub fn into_record(self) -> Result<EvidenceRecord> {
    Ok(EvidenceRecord {
      reference:       self.reference,
      kind:            decode_kind(&self.kind)?,
      compliance_date: self.compliance_date.as_deref().map(decode_date).transpose()?,
      airframe_hours:  self.airframe_hours,
      description:     self.description,
      source:          decode_origin(&self.source)?,
      observed_at:     decode_dt(&self.observed_at)?,
    })
  }
}

/// Collect decoded references into the set form used by the traits.
pub fn into_set(refs: Vec<String>) -> BTreeSet<String> { refs.into_iter().collect() }
