//! Audit trail records.
//!
//! Events are append-only. Nothing in the engine updates or deletes one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// At most this many references are stored on a single event.
pub const MAX_AUDIT_REFS: usize = 50;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
  DetectionStarted,
  NewItemsFound,
  DetectionCompleted,
  AlertCleared,
  /// One aircraft could not be processed during a batch.
  DetectionFailed,
}

/// A stored audit event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
  pub id:           Uuid,
  pub event_type:   AuditEventType,
  pub aircraft_id:  Option<Uuid>,
  pub version:      Option<String>,
  pub new_count:    u32,
  pub refs:         Vec<String>,
  /// `system`, `scheduled`, `admin`, or `user:<id>`.
  pub triggered_by: String,
  pub notes:        Option<String>,
  pub at:           DateTime<Utc>,
}

/// Input to [`crate::store::AuditSink::append_audit`]. The id and timestamp
/// are assigned by the sink.
#[derive(Debug, Clone)]
pub struct NewAuditEvent {
  pub event_type:   AuditEventType,
  pub aircraft_id:  Option<Uuid>,
  pub version:      Option<String>,
  pub new_count:    u32,
  pub refs:         Vec<String>,
  pub triggered_by: String,
  pub notes:        Option<String>,
}

impl NewAuditEvent {
  pub fn new(event_type: AuditEventType, triggered_by: impl Into<String>) -> Self {
    Self {
      event_type,
      aircraft_id: None,
      version: None,
      new_count: 0,
      refs: Vec::new(),
      triggered_by: triggered_by.into(),
      notes: None,
    }
  }

  pub fn aircraft(mut self, aircraft_id: Uuid) -> Self {
    self.aircraft_id = Some(aircraft_id);
    self
  }

  pub fn version(mut self, version: impl Into<String>) -> Self {
    self.version = Some(version.into());
    self
  }

  pub fn new_count(mut self, count: u32) -> Self {
    self.new_count = count;
    self
  }

  /// Attach references, keeping at most [`MAX_AUDIT_REFS`].
  pub fn refs<I, S>(mut self, refs: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.refs = refs.into_iter().take(MAX_AUDIT_REFS).map(Into::into).collect();
    self
  }

  pub fn notes(mut self, notes: impl Into<String>) -> Self {
    self.notes = Some(notes.into());
    self
  }
}
