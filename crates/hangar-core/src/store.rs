//! The `DetectionStore` and `AuditSink` traits.
//!
//! The traits are implemented by storage backends (e.g.
//! `hangar-store-sqlite`). The engine depends on this abstraction, not on any
//! concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  alert::{Alert, AlertCounts, AlertList, AlertStatus},
  audit::{AuditEvent, NewAuditEvent},
  knowledge::{
    Aircraft, AircraftKnowledgeState, GlobalTypePool, KnowledgeMerge, MergeOutcome, PoolStats,
    ReviewOutcome,
  },
  reference::TypeKey,
};

// ─── DetectionStore ──────────────────────────────────────────────────────────

/// Persistence for detection state, the global type pools, and alerts.
///
/// [`merge_known_references`](Self::merge_known_references) is the one
/// write the detection loop makes per aircraft. It commits the knowledge
/// update, the type pool update, and the resulting alerts together, so a
/// failed merge leaves nothing behind and the aircraft can simply be run
/// again.
///
/// All methods return `Send` futures so the trait can be used from spawned
/// tokio tasks.
pub trait DetectionStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Aircraft (read-only) ──────────────────────────────────────────────

  /// Retrieve an aircraft by id. Returns `None` if not found.
  fn get_aircraft(
    &self,
    aircraft_id: Uuid,
  ) -> impl Future<Output = Result<Option<Aircraft>, Self::Error>> + Send + '_;

  /// List aircraft, optionally restricted to one owner.
  fn list_aircraft<'a>(
    &'a self,
    owner_id: Option<&'a str>,
  ) -> impl Future<Output = Result<Vec<Aircraft>, Self::Error>> + Send + 'a;

  // ── Knowledge state ───────────────────────────────────────────────────

  /// The aircraft's knowledge state, or `None` if it was never processed.
  fn get_knowledge(
    &self,
    aircraft_id: Uuid,
  ) -> impl Future<Output = Result<Option<AircraftKnowledgeState>, Self::Error>> + Send + '_;

  /// Atomically:
  /// - compute `new = applicable − known`,
  /// - set `known = known ∪ applicable`, the type key, and the version,
  /// - if `new` is non-empty, raise the alert with `new_count = |new|`;
  ///   otherwise leave any existing alert exactly as it was,
  /// - if `new` is non-empty and the merge carries a type key `T`, add `new`
  ///   to the pool for `T` if absent, and for every reference this inserted,
  ///   create one UNREAD alert on each other aircraft whose knowledge state
  ///   carries `T` (at most one alert per aircraft and reference, ever).
  ///
  /// Recipients are the aircraft that carry `T` when the merge commits. An
  /// aircraft of the same type that has not been processed yet is not a
  /// recipient; it picks the references up from its own run instead. Within
  /// the first batch for a type, how many peers are alerted therefore
  /// depends on the order in which aircraft are merged.
  ///
  /// Creates the state on first use.
  fn merge_known_references(
    &self,
    merge: KnowledgeMerge,
  ) -> impl Future<Output = Result<MergeOutcome, Self::Error>> + Send + '_;

  /// Clear the alert flag and count, stamp `last_reviewed_at`, and report
  /// what was cleared. Creates an empty state if none exists.
  fn mark_reviewed(
    &self,
    aircraft_id: Uuid,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<ReviewOutcome, Self::Error>> + Send + '_;

  // ── Global type pool ──────────────────────────────────────────────────

  fn get_type_pool<'a>(
    &'a self,
    type_key: &'a TypeKey,
  ) -> impl Future<Output = Result<Option<GlobalTypePool>, Self::Error>> + Send + 'a;

  /// Totals across all pools, with the largest pools first.
  fn pool_stats(&self) -> impl Future<Output = Result<PoolStats, Self::Error>> + Send + '_;

  // ── Alerts ────────────────────────────────────────────────────────────

  /// Alerts on the owner's aircraft, newest first, read together with
  /// [`alert_counts`](Self::alert_counts). With no `status` filter,
  /// dismissed alerts are excluded.
  fn list_alerts<'a>(
    &'a self,
    owner_id: &'a str,
    status: Option<AlertStatus>,
  ) -> impl Future<Output = Result<AlertList, Self::Error>> + Send + 'a;

  /// Counts over the owner's non-dismissed alerts, the set
  /// [`list_alerts`](Self::list_alerts) returns unfiltered.
  fn alert_counts<'a>(
    &'a self,
    owner_id: &'a str,
  ) -> impl Future<Output = Result<AlertCounts, Self::Error>> + Send + 'a;

  /// Move an alert to `status`. Idempotent; a dismissed alert stays
  /// dismissed. Returns `None` if the alert does not exist.
  fn set_alert_status(
    &self,
    alert_id: Uuid,
    status: AlertStatus,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<Alert>, Self::Error>> + Send + '_;

  /// Mark every UNREAD alert of the owner as READ; returns how many changed.
  fn mark_all_read<'a>(
    &'a self,
    owner_id: &'a str,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + 'a;
}

// ─── AuditSink ───────────────────────────────────────────────────────────────

/// Append-only audit storage.
pub trait AuditSink: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Persist an event; the sink assigns its id and timestamp.
  fn append_audit(
    &self,
    event: NewAuditEvent,
  ) -> impl Future<Output = Result<AuditEvent, Self::Error>> + Send + '_;

  /// Most recent events first, optionally for one aircraft.
  fn audit_log(
    &self,
    aircraft_id: Option<Uuid>,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<AuditEvent>, Self::Error>> + Send + '_;
}
