//! Engine tests against an in-memory `SqliteStore`.

use std::sync::{
  Arc,
  atomic::{AtomicUsize, Ordering},
};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use hangar_core::{
  alert::{Alert, AlertCounts, AlertList, AlertStatus},
  audit::{AuditEvent, AuditEventType, NewAuditEvent},
  compare::ComparisonStatus,
  evidence::EvidenceRecord,
  knowledge::{
    Aircraft, AircraftKnowledgeState, GlobalTypePool, KnowledgeMerge, MergeOutcome, PoolStats,
    ReviewOutcome,
  },
  reference::TypeKey,
  requirement::{Applicability, CanonicalRequirement, RecurrencePolicy, RequirementKind},
  source::{Catalog, EvidenceSet, EvidenceSource, IdentityResolver, TypeIdentity},
  store::{AuditSink, DetectionStore},
};
use hangar_store_sqlite::SqliteStore;
use pretty_assertions::assert_eq;
use uuid::Uuid;

use crate::{
  DetectionOutcome, DetectionRequest, DetectionScope, Engine, EngineConfig, Error, SkipReason,
};

// ─── Fixtures ────────────────────────────────────────────────────────────────

type SqliteEngine = Engine<SqliteStore, SqliteStore>;

async fn setup() -> (SqliteEngine, Arc<SqliteStore>) {
  let store = Arc::new(SqliteStore::open_in_memory().await.expect("in-memory store"));
  let engine = Engine::new(Arc::clone(&store), Arc::clone(&store), EngineConfig::default());
  (engine, store)
}

fn cessna() -> TypeIdentity {
  TypeIdentity {
    designator:   Some("3A12".into()),
    manufacturer: Some("Cessna".into()),
    model:        Some("172M".into()),
  }
}

fn ad(reference: &str) -> CanonicalRequirement {
  CanonicalRequirement::new(
    reference,
    RequirementKind::Ad,
    Applicability { designator: Some("3A12".into()), ..Default::default() },
  )
}

async fn cessna_owned_by(store: &SqliteStore, owner: &str, registration: &str) -> Aircraft {
  store.upsert_registry(registration, cessna()).await.unwrap();
  store.add_aircraft(owner, registration).await.unwrap()
}

fn run(scope: DetectionScope, version: &str) -> DetectionRequest {
  DetectionRequest {
    scope,
    version: Some(version.into()),
    force: false,
    triggered_by: Some("scheduled".into()),
  }
}

fn new_refs(outcome: &DetectionOutcome) -> Vec<String> {
  match outcome {
    DetectionOutcome::Processed { new_refs, .. } => new_refs.clone(),
    other => panic!("expected processed, got {other:?}"),
  }
}

// ─── Detection loop ──────────────────────────────────────────────────────────

#[tokio::test]
async fn first_run_detects_every_applicable_reference() {
  let (engine, store) = setup().await;
  let a = cessna_owned_by(&store, "owner-1", "C-GAAA").await;
  store.publish_requirement(&ad("CF-2020-01"), "2026-01").await.unwrap();
  store.publish_requirement(&ad("CF-2021-07"), "2026-01").await.unwrap();

  let summary = engine
    .trigger_detection(run(DetectionScope::Aircraft(a.aircraft_id), "2026-01"))
    .await
    .unwrap();

  assert_eq!(summary.processed, 1);
  assert_eq!(summary.with_new_items, 1);
  assert_eq!(summary.total_new, 2);
  assert_eq!(
    new_refs(&summary.results[0].outcome),
    vec!["CF-2020-01".to_owned(), "CF-2021-07".to_owned()]
  );

  let status = engine.alert_status(a.aircraft_id).await.unwrap();
  assert!(status.alert_active);
  assert_eq!(status.new_count, 2);
  assert_eq!(status.last_processed_version.as_deref(), Some("2026-01"));

  let types: Vec<_> = engine
    .audit_log(None, None)
    .await
    .unwrap()
    .into_iter()
    .map(|e| e.event_type)
    .collect();
  assert_eq!(
    types,
    vec![
      AuditEventType::DetectionCompleted,
      AuditEventType::NewItemsFound,
      AuditEventType::DetectionStarted,
    ]
  );
}

#[tokio::test]
async fn same_version_twice_is_skipped_and_changes_nothing() {
  let (engine, store) = setup().await;
  let a = cessna_owned_by(&store, "owner-1", "C-GAAA").await;
  store.publish_requirement(&ad("CF-2020-01"), "2026-01").await.unwrap();

  engine.trigger_detection(run(DetectionScope::All, "2026-01")).await.unwrap();
  let before = store.get_knowledge(a.aircraft_id).await.unwrap().unwrap();

  let again = engine.trigger_detection(run(DetectionScope::All, "2026-01")).await.unwrap();
  assert_eq!(again.skipped, 1);
  assert_eq!(again.total_new, 0);
  assert_eq!(
    again.results[0].outcome,
    DetectionOutcome::Skipped {
      reason: SkipReason::AlreadyProcessed { version: "2026-01".into() },
    }
  );

  let after = store.get_knowledge(a.aircraft_id).await.unwrap().unwrap();
  assert_eq!(after, before);
}

#[tokio::test]
async fn forced_rerun_finds_nothing_new_and_keeps_alert() {
  let (engine, store) = setup().await;
  let a = cessna_owned_by(&store, "owner-1", "C-GAAA").await;
  store.publish_requirement(&ad("CF-2020-01"), "2026-01").await.unwrap();
  engine.trigger_detection(run(DetectionScope::All, "2026-01")).await.unwrap();

  let mut forced = run(DetectionScope::All, "2026-01");
  forced.force = true;
  let summary = engine.trigger_detection(forced).await.unwrap();

  assert_eq!(summary.processed, 1);
  assert!(new_refs(&summary.results[0].outcome).is_empty());
  let status = engine.alert_status(a.aircraft_id).await.unwrap();
  assert!(status.alert_active);
  assert_eq!(status.new_count, 1);
}

#[tokio::test]
async fn new_catalog_version_reports_only_the_addition() {
  let (engine, store) = setup().await;
  let a = cessna_owned_by(&store, "owner-1", "C-GAAA").await;
  store.publish_requirement(&ad("CF-2020-01"), "2026-01").await.unwrap();
  engine.trigger_detection(run(DetectionScope::All, "2026-01")).await.unwrap();
  engine.mark_reviewed(a.aircraft_id, Some("user:owner-1")).await.unwrap();

  store.publish_requirement(&ad("CF-2026-03"), "2026-02").await.unwrap();
  let summary = engine.trigger_detection(run(DetectionScope::All, "2026-02")).await.unwrap();

  assert_eq!(new_refs(&summary.results[0].outcome), vec!["CF-2026-03".to_owned()]);
  assert_eq!(summary.results[0].previous_version.as_deref(), Some("2026-01"));
  assert_eq!(engine.alert_status(a.aircraft_id).await.unwrap().new_count, 1);
}

#[tokio::test]
async fn withdrawn_requirements_stay_known() {
  let (engine, store) = setup().await;
  let a = cessna_owned_by(&store, "owner-1", "C-GAAA").await;
  store.publish_requirement(&ad("CF-2020-01"), "2026-01").await.unwrap();
  store.publish_requirement(&ad("CF-2019-02"), "2026-01").await.unwrap();
  engine.trigger_detection(run(DetectionScope::All, "2026-01")).await.unwrap();

  store.deactivate_requirement("CF-2019-02").await.unwrap();
  engine.trigger_detection(run(DetectionScope::All, "2026-02")).await.unwrap();

  let state = store.get_knowledge(a.aircraft_id).await.unwrap().unwrap();
  assert!(state.known_references.contains("CF-2019-02"));
  assert_eq!(state.known_references.len(), 2);
}

#[tokio::test]
async fn unresolved_identity_is_skipped_without_state() {
  let (engine, store) = setup().await;
  let a = store.add_aircraft("owner-1", "C-GNEW").await.unwrap();
  store.publish_requirement(&ad("CF-2020-01"), "2026-01").await.unwrap();

  let summary = engine.trigger_detection(run(DetectionScope::All, "2026-01")).await.unwrap();

  assert_eq!(summary.skipped, 1);
  assert_eq!(
    summary.results[0].outcome,
    DetectionOutcome::Skipped { reason: SkipReason::IdentityUnresolved }
  );
  assert!(store.get_knowledge(a.aircraft_id).await.unwrap().is_none());
}

#[tokio::test]
async fn version_defaults_to_catalog_version() {
  let (engine, store) = setup().await;
  cessna_owned_by(&store, "owner-1", "C-GAAA").await;
  store.publish_requirement(&ad("CF-2020-01"), "2026-05").await.unwrap();

  let summary = engine.trigger_detection(DetectionRequest::default()).await.unwrap();
  assert_eq!(summary.version, "2026-05");
  assert_eq!(summary.triggered_by, "system");
}

#[tokio::test]
async fn empty_catalog_version_falls_back_to_month() {
  let (engine, _store) = setup().await;
  let summary = engine.trigger_detection(DetectionRequest::default()).await.unwrap();
  assert_eq!(summary.version, Utc::now().format("%Y-%m").to_string());
  assert!(summary.results.is_empty());
}

#[tokio::test]
async fn unknown_aircraft_scope_is_not_found() {
  let (engine, _store) = setup().await;
  let err = engine
    .trigger_detection(run(DetectionScope::Aircraft(Uuid::new_v4()), "2026-01"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn owner_scope_only_touches_that_owner() {
  let (engine, store) = setup().await;
  let mine = cessna_owned_by(&store, "owner-1", "C-GAAA").await;
  let theirs = cessna_owned_by(&store, "owner-2", "C-GBBB").await;
  store.publish_requirement(&ad("CF-2020-01"), "2026-01").await.unwrap();

  let summary = engine
    .trigger_detection(run(DetectionScope::Owner("owner-1".into()), "2026-01"))
    .await
    .unwrap();

  assert_eq!(summary.results.len(), 1);
  assert_eq!(summary.results[0].aircraft_id, mine.aircraft_id);
  assert!(store.get_knowledge(theirs.aircraft_id).await.unwrap().is_none());
}

// ─── Collaborative fan-out ───────────────────────────────────────────────────

#[tokio::test]
async fn fan_out_alerts_each_other_aircraft_exactly_once() {
  let (engine, store) = setup().await;
  let fleet = [
    cessna_owned_by(&store, "owner-1", "C-GAAA").await,
    cessna_owned_by(&store, "owner-2", "C-GBBB").await,
    cessna_owned_by(&store, "owner-3", "C-GCCC").await,
  ];

  // Empty catalog: every aircraft gets a typed knowledge state first.
  engine.trigger_detection(run(DetectionScope::All, "2026-01")).await.unwrap();

  store.publish_requirement(&ad("CF-2026-01"), "2026-02").await.unwrap();
  let summary = engine.trigger_detection(run(DetectionScope::All, "2026-02")).await.unwrap();
  assert_eq!(summary.with_new_items, 3);

  let fan_outs: Vec<_> = summary
    .results
    .iter()
    .filter_map(|r| match &r.outcome {
      DetectionOutcome::Processed { fan_out: Some(f), .. } => Some((r.aircraft_id, f.clone())),
      _ => None,
    })
    .collect();
  let first: Vec<_> = fan_outs.iter().filter(|(_, f)| !f.globally_new.is_empty()).collect();
  assert_eq!(first.len(), 1, "exactly one aircraft adds the reference to the pool");
  let (source, result) = first[0];
  assert_eq!(result.alerts_created, 2);
  assert_eq!(result.aircraft_notified, 2);

  for aircraft in &fleet {
    let listed = engine.list_alerts(&aircraft.owner_id, None).await.unwrap();
    let expected = usize::from(aircraft.aircraft_id != *source);
    assert_eq!(listed.alerts.len(), expected, "alerts for {}", aircraft.registration);
    assert_eq!(listed.total_count, expected);
  }

  // A forced rerun adds nothing to the pool and creates no duplicates.
  let mut forced = run(DetectionScope::All, "2026-02");
  forced.force = true;
  engine.trigger_detection(forced).await.unwrap();
  let total: usize = {
    let mut n = 0;
    for aircraft in &fleet {
      n += engine.alert_counts(&aircraft.owner_id).await.unwrap().total_count;
    }
    n
  };
  assert_eq!(total, 2);

  let pool = engine.type_pool("CESSNA::172M").await.unwrap();
  assert!(pool.known_references.contains("CF-2026-01"));

  let stats = engine.pool_stats().await.unwrap();
  assert_eq!((stats.total_references, stats.total_alerts), (1, 2));
  assert_eq!(stats.top_types.len(), 1);
  assert_eq!(stats.top_types[0].type_key.as_str(), "CESSNA::172M");
}

#[tokio::test]
async fn aircraft_without_type_key_does_not_fan_out() {
  let (engine, store) = setup().await;
  store
    .upsert_registry(
      "C-GDES",
      TypeIdentity { designator: Some("3A12".into()), manufacturer: None, model: None },
    )
    .await
    .unwrap();
  store.add_aircraft("owner-1", "C-GDES").await.unwrap();
  store.publish_requirement(&ad("CF-2020-01"), "2026-01").await.unwrap();

  let summary = engine.trigger_detection(run(DetectionScope::All, "2026-01")).await.unwrap();
  match &summary.results[0].outcome {
    DetectionOutcome::Processed { type_key, fan_out, new_refs, designator } => {
      assert!(type_key.is_none());
      assert!(fan_out.is_none());
      assert_eq!(new_refs.len(), 1);
      assert_eq!(designator.as_deref(), Some("3A12"));
    }
    other => panic!("expected processed, got {other:?}"),
  }
}

// ─── Review and alerts ───────────────────────────────────────────────────────

#[tokio::test]
async fn double_review_reports_nothing_the_second_time() {
  let (engine, store) = setup().await;
  let a = cessna_owned_by(&store, "owner-1", "C-GAAA").await;
  for r in ["CF-1", "CF-2", "CF-3"] {
    store.publish_requirement(&ad(r), "2026-01").await.unwrap();
  }
  engine.trigger_detection(run(DetectionScope::All, "2026-01")).await.unwrap();

  let first = engine.mark_reviewed(a.aircraft_id, Some("user:owner-1")).await.unwrap();
  assert!(first.alert_cleared);
  assert_eq!(first.previous_new_count, 3);

  let second = engine.mark_reviewed(a.aircraft_id, None).await.unwrap();
  assert!(!second.alert_cleared);
  assert_eq!(second.previous_new_count, 0);

  let cleared: Vec<_> = engine
    .audit_log(Some(a.aircraft_id), None)
    .await
    .unwrap()
    .into_iter()
    .filter(|e| e.event_type == AuditEventType::AlertCleared)
    .collect();
  assert_eq!(cleared.len(), 2);
  assert_eq!(cleared[0].new_count, 0);
  assert_eq!(cleared[0].triggered_by, "system");
  assert_eq!(cleared[1].new_count, 3);
  assert_eq!(cleared[1].triggered_by, "user:owner-1");
}

#[tokio::test]
async fn review_of_unknown_aircraft_is_not_found() {
  let (engine, _store) = setup().await;
  assert!(matches!(
    engine.mark_reviewed(Uuid::new_v4(), None).await,
    Err(Error::NotFound(_))
  ));
  assert!(matches!(engine.alert_status(Uuid::new_v4()).await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn alert_ids_and_statuses_are_validated() {
  let (engine, _store) = setup().await;

  assert!(matches!(engine.mark_alert_read("not-a-uuid").await, Err(Error::InvalidInput(_))));
  assert!(matches!(
    engine.dismiss_alert(&Uuid::new_v4().to_string()).await,
    Err(Error::NotFound(_))
  ));
  assert!(matches!(
    engine.list_alerts("owner-1", Some("archived")).await,
    Err(Error::InvalidInput(_))
  ));
  assert!(engine.list_alerts("owner-1", Some("unread")).await.unwrap().alerts.is_empty());
  assert!(matches!(engine.type_pool("no-separator").await, Err(Error::InvalidInput(_))));
  assert!(matches!(engine.type_pool("PIPER::PA28").await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn audit_limit_is_clamped() {
  let (engine, _store) = setup().await;
  for _ in 0..3 {
    engine.trigger_detection(run(DetectionScope::All, "2026-01")).await.unwrap();
  }
  assert_eq!(engine.audit_log(None, Some(0)).await.unwrap().len(), 1);
  assert_eq!(engine.audit_log(None, Some(10_000)).await.unwrap().len(), 6);
}

// ─── Failure isolation ───────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
enum FlakyError {
  #[error(transparent)]
  Store(#[from] hangar_store_sqlite::Error),
  #[error("registry unavailable")]
  Unavailable,
}

/// Delegates to the SQLite store except for one registration whose lookup
/// always fails.
struct FlakyRegistry {
  inner:  Arc<SqliteStore>,
  broken: String,
}

impl IdentityResolver for FlakyRegistry {
  type Error = FlakyError;

  async fn resolve_identity<'a>(
    &'a self,
    registration: &'a str,
  ) -> Result<Option<TypeIdentity>, FlakyError> {
    if registration == self.broken {
      return Err(FlakyError::Unavailable);
    }
    Ok(self.inner.resolve_identity(registration).await?)
  }
}

impl Catalog for FlakyRegistry {
  type Error = FlakyError;

  async fn applicable_requirements<'a>(
    &'a self,
    identity: &'a TypeIdentity,
  ) -> Result<Vec<CanonicalRequirement>, FlakyError> {
    Ok(self.inner.applicable_requirements(identity).await?)
  }

  async fn current_version(&self) -> Result<Option<String>, FlakyError> {
    Ok(self.inner.current_version().await?)
  }
}

impl EvidenceSource for FlakyRegistry {
  type Error = FlakyError;

  async fn evidence_for(&self, aircraft_id: Uuid) -> Result<EvidenceSet, FlakyError> {
    Ok(self.inner.evidence_for(aircraft_id).await?)
  }
}

#[tokio::test]
async fn one_failing_aircraft_does_not_stop_the_batch() {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let sources = Arc::new(FlakyRegistry { inner: Arc::clone(&store), broken: "C-GBAD".into() });
  let engine = Engine::new(
    Arc::clone(&store),
    sources,
    EngineConfig { max_concurrency: 2, ..Default::default() },
  );

  let good = cessna_owned_by(&store, "owner-1", "C-GOOD").await;
  let bad = cessna_owned_by(&store, "owner-2", "C-GBAD").await;
  let other = cessna_owned_by(&store, "owner-3", "C-GOTH").await;
  store.publish_requirement(&ad("CF-2020-01"), "2026-01").await.unwrap();

  let summary = engine.trigger_detection(run(DetectionScope::All, "2026-01")).await.unwrap();
  assert_eq!((summary.processed, summary.failed), (2, 1));

  let ids: Vec<_> = summary.results.iter().map(|r| r.aircraft_id).collect();
  assert_eq!(ids, vec![good.aircraft_id, bad.aircraft_id, other.aircraft_id]);
  assert!(matches!(summary.results[1].outcome, DetectionOutcome::Failed { .. }));

  let failures = engine.audit_log(Some(bad.aircraft_id), None).await.unwrap();
  assert_eq!(failures.len(), 1);
  assert_eq!(failures[0].event_type, AuditEventType::DetectionFailed);
}

#[derive(Debug, thiserror::Error)]
enum FaultyError {
  #[error(transparent)]
  Store(#[from] hangar_store_sqlite::Error),
  #[error("storage write failed")]
  Injected,
}

/// Delegates to the SQLite store, but fails the next `failing_merges`
/// merges before they reach it and, with `audit_down`, every audit append.
struct FaultyStore {
  inner:          Arc<SqliteStore>,
  failing_merges: AtomicUsize,
  audit_down:     bool,
}

impl FaultyStore {
  fn new(inner: Arc<SqliteStore>) -> Self {
    Self { inner, failing_merges: AtomicUsize::new(0), audit_down: false }
  }
}

impl DetectionStore for FaultyStore {
  type Error = FaultyError;

  async fn get_aircraft(&self, aircraft_id: Uuid) -> Result<Option<Aircraft>, FaultyError> {
    Ok(self.inner.get_aircraft(aircraft_id).await?)
  }

  async fn list_aircraft<'a>(
    &'a self,
    owner_id: Option<&'a str>,
  ) -> Result<Vec<Aircraft>, FaultyError> {
    Ok(self.inner.list_aircraft(owner_id).await?)
  }

  async fn get_knowledge(
    &self,
    aircraft_id: Uuid,
  ) -> Result<Option<AircraftKnowledgeState>, FaultyError> {
    Ok(self.inner.get_knowledge(aircraft_id).await?)
  }

  async fn merge_known_references(
    &self,
    merge: KnowledgeMerge,
  ) -> Result<MergeOutcome, FaultyError> {
    let failing = self
      .failing_merges
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
      .is_ok();
    if failing {
      return Err(FaultyError::Injected);
    }
    Ok(self.inner.merge_known_references(merge).await?)
  }

  async fn mark_reviewed(
    &self,
    aircraft_id: Uuid,
    at: DateTime<Utc>,
  ) -> Result<ReviewOutcome, FaultyError> {
    Ok(self.inner.mark_reviewed(aircraft_id, at).await?)
  }

  async fn get_type_pool<'a>(
    &'a self,
    type_key: &'a TypeKey,
  ) -> Result<Option<GlobalTypePool>, FaultyError> {
    Ok(self.inner.get_type_pool(type_key).await?)
  }

  async fn pool_stats(&self) -> Result<PoolStats, FaultyError> {
    Ok(self.inner.pool_stats().await?)
  }

  async fn list_alerts<'a>(
    &'a self,
    owner_id: &'a str,
    status: Option<AlertStatus>,
  ) -> Result<AlertList, FaultyError> {
    Ok(self.inner.list_alerts(owner_id, status).await?)
  }

  async fn alert_counts<'a>(&'a self, owner_id: &'a str) -> Result<AlertCounts, FaultyError> {
    Ok(self.inner.alert_counts(owner_id).await?)
  }

  async fn set_alert_status(
    &self,
    alert_id: Uuid,
    status: AlertStatus,
    at: DateTime<Utc>,
  ) -> Result<Option<Alert>, FaultyError> {
    Ok(self.inner.set_alert_status(alert_id, status, at).await?)
  }

  async fn mark_all_read<'a>(
    &'a self,
    owner_id: &'a str,
    at: DateTime<Utc>,
  ) -> Result<usize, FaultyError> {
    Ok(self.inner.mark_all_read(owner_id, at).await?)
  }
}

impl AuditSink for FaultyStore {
  type Error = FaultyError;

  async fn append_audit(&self, event: NewAuditEvent) -> Result<AuditEvent, FaultyError> {
    if self.audit_down {
      return Err(FaultyError::Injected);
    }
    Ok(self.inner.append_audit(event).await?)
  }

  async fn audit_log(
    &self,
    aircraft_id: Option<Uuid>,
    limit: usize,
  ) -> Result<Vec<AuditEvent>, FaultyError> {
    Ok(self.inner.audit_log(aircraft_id, limit).await?)
  }
}

fn faulty_engine(
  store: FaultyStore,
) -> (Engine<FaultyStore, SqliteStore>, Arc<FaultyStore>, Arc<SqliteStore>) {
  let inner = Arc::clone(&store.inner);
  let store = Arc::new(store);
  let engine = Engine::new(
    Arc::clone(&store),
    Arc::clone(&inner),
    EngineConfig { max_concurrency: 1, ..Default::default() },
  );
  (engine, store, inner)
}

#[tokio::test]
async fn failed_merge_is_picked_up_by_a_plain_rerun() {
  let inner = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let (engine, store, inner) = faulty_engine(FaultyStore::new(inner));
  let source = cessna_owned_by(&inner, "owner-1", "C-GAAA").await;
  let peer = cessna_owned_by(&inner, "owner-2", "C-GBBB").await;

  // Both aircraft carry the type before the catalog has anything for it.
  engine.trigger_detection(run(DetectionScope::All, "2026-01")).await.unwrap();
  inner.publish_requirement(&ad("CF-2026-01"), "2026-02").await.unwrap();

  store.failing_merges.store(1, Ordering::SeqCst);
  let failed = engine
    .trigger_detection(run(DetectionScope::Aircraft(source.aircraft_id), "2026-02"))
    .await
    .unwrap();
  assert_eq!(failed.failed, 1);
  assert!(matches!(failed.results[0].outcome, DetectionOutcome::Failed { .. }));

  let state = inner.get_knowledge(source.aircraft_id).await.unwrap().unwrap();
  assert_eq!(state.last_processed_version.as_deref(), Some("2026-01"));
  assert!(state.known_references.is_empty());
  assert_eq!(engine.alert_counts("owner-2").await.unwrap().total_count, 0);

  let retried = engine
    .trigger_detection(run(DetectionScope::Aircraft(source.aircraft_id), "2026-02"))
    .await
    .unwrap();
  assert_eq!((retried.processed, retried.failed), (1, 0));
  match &retried.results[0].outcome {
    DetectionOutcome::Processed { new_refs, fan_out: Some(fan_out), .. } => {
      assert_eq!(new_refs, &vec!["CF-2026-01".to_owned()]);
      assert_eq!(fan_out.globally_new, vec!["CF-2026-01".to_owned()]);
      assert_eq!(fan_out.alerts_created, 1);
    }
    other => panic!("expected processed with fan-out, got {other:?}"),
  }

  let listed = engine.list_alerts("owner-2", None).await.unwrap();
  assert_eq!(listed.total_count, 1);
  assert_eq!(listed.alerts[0].aircraft_id, peer.aircraft_id);
  assert_eq!(listed.alerts[0].reference, "CF-2026-01");

  // The peer's own run learns the reference without a second alert.
  engine.trigger_detection(run(DetectionScope::All, "2026-02")).await.unwrap();
  assert_eq!(engine.alert_counts("owner-2").await.unwrap().total_count, 1);
  assert_eq!(engine.alert_counts("owner-1").await.unwrap().total_count, 0);
}

#[tokio::test]
async fn audit_outage_does_not_block_detection_or_review() {
  let inner = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let (engine, _store, inner) =
    faulty_engine(FaultyStore { audit_down: true, ..FaultyStore::new(inner) });
  let a = cessna_owned_by(&inner, "owner-1", "C-GAAA").await;
  inner.publish_requirement(&ad("CF-2020-01"), "2026-01").await.unwrap();

  let summary = engine.trigger_detection(run(DetectionScope::All, "2026-01")).await.unwrap();
  assert_eq!((summary.processed, summary.failed, summary.total_new), (1, 0, 1));
  let state = inner.get_knowledge(a.aircraft_id).await.unwrap().unwrap();
  assert!(state.alert_active);
  assert_eq!(state.last_processed_version.as_deref(), Some("2026-01"));

  let outcome = engine.mark_reviewed(a.aircraft_id, Some("user:owner-1")).await.unwrap();
  assert!(outcome.alert_cleared);
  assert_eq!(outcome.previous_new_count, 1);
  let state = inner.get_knowledge(a.aircraft_id).await.unwrap().unwrap();
  assert!(!state.alert_active);
  assert!(state.last_reviewed_at.is_some());

  assert!(inner.audit_log(None, 100).await.unwrap().is_empty());
}

// ─── Reports ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn comparison_classifies_the_aircraft_paperwork() {
  let (engine, store) = setup().await;
  let a = cessna_owned_by(&store, "owner-1", "C-GAAA").await;

  let mut recurring = ad("CF-2020-01");
  recurring.recurrence_policy = RecurrencePolicy::Years(5);
  let mut fresh = ad("CF-2025-09");
  fresh.effective_date = NaiveDate::from_ymd_opt(2025, 9, 1);
  store.publish_requirement(&recurring, "2026-01").await.unwrap();
  store.publish_requirement(&fresh, "2026-01").await.unwrap();

  let observed = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
  let mut logged = EvidenceRecord::new("cf 2020-01", RequirementKind::Ad, observed);
  logged.compliance_date = NaiveDate::from_ymd_opt(2020, 6, 1);
  store.record_evidence(a.aircraft_id, &logged).await.unwrap();

  let report = engine
    .comparison_as_of(a.aircraft_id, NaiveDate::from_ymd_opt(2025, 5, 1).unwrap())
    .await
    .unwrap();

  assert_eq!(report.total_requirements, 2);
  assert_eq!(report.found_count + report.missing_count, report.total_requirements);
  assert_eq!(report.new_regulatory, vec!["CF-2025-09".to_owned()]);
  let recurring_row = report
    .items
    .iter()
    .find(|i| i.reference == "CF-2020-01")
    .unwrap();
  assert_eq!(recurring_row.status, ComparisonStatus::DueSoon);

  let baseline = engine.baseline(a.aircraft_id).await.unwrap();
  assert_eq!(baseline.total_references, 2);
  assert_eq!(baseline.total_seen, 1);
  assert_eq!(baseline.total_not_seen, 1);
}

#[tokio::test]
async fn comparison_without_registry_identity_is_not_found() {
  let (engine, store) = setup().await;
  let a = store.add_aircraft("owner-1", "C-GNEW").await.unwrap();
  assert!(matches!(engine.comparison(a.aircraft_id).await, Err(Error::NotFound(_))));
}
