//! Per-aircraft and per-type knowledge of catalog references.
//!
//! Both reference sets only ever grow. A reference, once known for an
//! aircraft or a type, is never forgotten.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{reference::TypeKey, requirement::RequirementKind};

/// An aircraft record as kept by the fleet surface. The engine reads it to
/// find the owner and registration; it never writes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aircraft {
  pub aircraft_id:  Uuid,
  pub owner_id:     String,
  pub registration: String,
  pub created_at:   DateTime<Utc>,
}

/// What the detection loop knows about one aircraft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AircraftKnowledgeState {
  pub aircraft_id:            Uuid,
  /// `None` when the registry gave a designator but no make/model; such an
  /// aircraft takes part in detection but not in collaborative fan-out.
  pub type_key:               Option<TypeKey>,
  pub known_references:       BTreeSet<String>,
  pub last_processed_version: Option<String>,
  pub alert_active:           bool,
  pub new_count:              u32,
  pub last_reviewed_at:       Option<DateTime<Utc>>,
  pub updated_at:             DateTime<Utc>,
}

impl AircraftKnowledgeState {
  /// The state of an aircraft that has never been processed.
  pub fn empty(aircraft_id: Uuid, now: DateTime<Utc>) -> Self {
    Self {
      aircraft_id,
      type_key: None,
      known_references: BTreeSet::new(),
      last_processed_version: None,
      alert_active: false,
      new_count: 0,
      last_reviewed_at: None,
      updated_at: now,
    }
  }
}

/// Input to [`crate::store::DetectionStore::merge_known_references`].
#[derive(Debug, Clone)]
pub struct KnowledgeMerge {
  pub aircraft_id: Uuid,
  /// Fan-out only happens when this is set.
  pub type_key:    Option<TypeKey>,
  /// Every reference currently applicable to the aircraft, with its kind.
  pub applicable:  BTreeMap<String, RequirementKind>,
  pub version:     String,
}

/// Result of a merge: which references were new, the state afterwards, and
/// the fan-out committed with it.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
  pub new_references: BTreeSet<String>,
  pub state:          AircraftKnowledgeState,
  /// `Some` when the merge found new references and carried a type key.
  pub fan_out:        Option<FanOutResult>,
}

/// What one aircraft's new references did to its type pool and to the other
/// aircraft of that type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanOutResult {
  pub type_key:          TypeKey,
  /// References this aircraft was first to add to the type pool.
  pub globally_new:      Vec<String>,
  pub alerts_created:    usize,
  pub aircraft_notified: usize,
}

/// The union of references ever detected for one aircraft type, across all
/// owners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalTypePool {
  pub type_key:         TypeKey,
  pub known_references: BTreeSet<String>,
}

/// Result of a review: whether an active alert was cleared, and its count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewOutcome {
  pub alert_cleared:      bool,
  pub previous_new_count: u32,
  pub state:              AircraftKnowledgeState,
}

/// Reference count for one type pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypePoolSize {
  pub type_key:        TypeKey,
  pub reference_count: usize,
}

/// Totals across every type pool. Counts only; nothing here says anything
/// about a particular aircraft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
  pub total_references: usize,
  pub total_alerts:     usize,
  /// Largest pools first, at most [`PoolStats::TOP_TYPES`].
  pub top_types:        Vec<TypePoolSize>,
}

impl PoolStats {
  pub const TOP_TYPES: usize = 20;
}
