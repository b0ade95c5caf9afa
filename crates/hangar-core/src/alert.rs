//! Collaborative alerts: "a reference new to your aircraft type was seen on
//! another owner's aircraft".
//!
//! Alerts are informational. They are created only by the fan-out and change
//! only through explicit read/dismiss actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::{reference::TypeKey, requirement::RequirementKind};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum AlertStatus {
  Unread,
  Read,
  /// Terminal: hidden from lists and counts.
  Dismissed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
  pub id:           Uuid,
  pub type_key:     TypeKey,
  pub aircraft_id:  Uuid,
  pub reference:    String,
  pub kind:         RequirementKind,
  pub status:       AlertStatus,
  pub created_at:   DateTime<Utc>,
  pub read_at:      Option<DateTime<Utc>>,
  pub dismissed_at: Option<DateTime<Utc>>,
}

impl Alert {
  /// Factual, non-committal description for display.
  pub fn message(&self) -> String {
    format!(
      "A new {} reference ({}) was published for aircraft type {}. Review it with your maintenance engineer.",
      self.kind, self.reference, self.type_key
    )
  }
}

/// An owner's alerts together with the counts over their non-dismissed
/// alerts. The counts ignore any status filter applied to `alerts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertList {
  pub alerts:       Vec<Alert>,
  pub total_count:  usize,
  pub unread_count: usize,
}

/// Unread and total (non-dismissed) counts for one owner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertCounts {
  pub unread_count: usize,
  pub total_count:  usize,
}
