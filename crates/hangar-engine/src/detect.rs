//! The versioned detection loop.
//!
//! For each aircraft, the loop asks the catalog which references currently
//! apply and merges them into the aircraft's known set. References that were
//! not known before are "new": they raise the aircraft's alert and are fanned
//! out to other aircraft of the same type. The store commits the merge and
//! its fan-out together, so the version is only recorded once the alerts
//! exist. A run for a version the aircraft has already processed is skipped
//! unless forced, so runs can be repeated and retried freely.

use std::{
  collections::{BTreeMap, HashMap},
  fmt,
  sync::Arc,
};

use chrono::{DateTime, Utc};
use hangar_core::{
  audit::{AuditEventType, NewAuditEvent},
  knowledge::{Aircraft, KnowledgeMerge},
  reference::TypeKey,
  requirement::RequirementKind,
  source::{Catalog, EvidenceSource, IdentityResolver, TypeIdentity},
  store::{AuditSink, DetectionStore},
};
use serde::{Deserialize, Serialize};
use tokio::{sync::Semaphore, task::JoinSet};
use uuid::Uuid;

use crate::{Engine, Error, FanOutResult, Result};

// ─── Request ─────────────────────────────────────────────────────────────────

/// Which aircraft a detection run covers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum DetectionScope {
  Aircraft(Uuid),
  Owner(String),
  #[default]
  All,
}

impl fmt::Display for DetectionScope {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Aircraft(id) => write!(f, "aircraft {id}"),
      Self::Owner(owner) => write!(f, "owner {owner}"),
      Self::All => f.write_str("all aircraft"),
    }
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionRequest {
  pub scope:        DetectionScope,
  /// Catalog version to process; defaults to the catalog's current version.
  pub version:      Option<String>,
  /// Process aircraft even if they already saw this version.
  pub force:        bool,
  pub triggered_by: Option<String>,
}

// ─── Outcome ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
  AlreadyProcessed { version: String },
  /// The registry had no usable identity for the registration.
  IdentityUnresolved,
}

/// What happened to one aircraft in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DetectionOutcome {
  Skipped {
    reason: SkipReason,
  },
  Processed {
    designator: Option<String>,
    type_key:   Option<TypeKey>,
    new_refs:   Vec<String>,
    fan_out:    Option<FanOutResult>,
  },
  Failed {
    error: String,
  },
}

impl DetectionOutcome {
  /// Number of new references, zero unless processed.
  pub fn new_count(&self) -> usize {
    match self {
      Self::Processed { new_refs, .. } => new_refs.len(),
      Self::Skipped { .. } | Self::Failed { .. } => 0,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AircraftDetectionResult {
  pub aircraft_id:      Uuid,
  pub registration:     String,
  pub previous_version: Option<String>,
  pub outcome:          DetectionOutcome,
}

/// Totals for a whole run plus one result per aircraft, in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionSummary {
  pub version:        String,
  pub triggered_by:   String,
  pub started_at:     DateTime<Utc>,
  pub finished_at:    DateTime<Utc>,
  pub processed:      usize,
  pub with_new_items: usize,
  pub skipped:        usize,
  pub failed:         usize,
  pub total_new:      usize,
  pub results:        Vec<AircraftDetectionResult>,
}

// ─── Loop ────────────────────────────────────────────────────────────────────

impl<S, X> Engine<S, X>
where
  S: DetectionStore + AuditSink + 'static,
  X: IdentityResolver + Catalog + EvidenceSource + 'static,
{
  /// Run detection over `request.scope`.
  ///
  /// Only resolving the scope and the version can fail the whole run. A
  /// failure on one aircraft becomes that aircraft's
  /// [`DetectionOutcome::Failed`] and the rest carry on.
  pub async fn trigger_detection(&self, request: DetectionRequest) -> Result<DetectionSummary> {
    let triggered_by = request
      .triggered_by
      .filter(|t| !t.trim().is_empty())
      .unwrap_or_else(|| self.config.triggered_by.clone());
    let version = match request.version.filter(|v| !v.trim().is_empty()) {
      Some(v) => v,
      None => self.default_version().await?,
    };
    let aircraft = self.aircraft_in_scope(&request.scope).await?;

    let started_at = Utc::now();
    tracing::info!(
      scope = %request.scope,
      %version,
      %triggered_by,
      aircraft = aircraft.len(),
      force = request.force,
      "detection run started"
    );
    self
      .audit
      .record(
        NewAuditEvent::new(AuditEventType::DetectionStarted, triggered_by.as_str())
          .version(version.as_str())
          .notes(format!("scope: {}; aircraft: {}", request.scope, aircraft.len())),
      )
      .await;

    let results = self
      .run_batch(aircraft, &version, request.force, &triggered_by)
      .await;

    let mut summary = DetectionSummary {
      version,
      triggered_by,
      started_at,
      finished_at: Utc::now(),
      processed: 0,
      with_new_items: 0,
      skipped: 0,
      failed: 0,
      total_new: 0,
      results,
    };
    for result in &summary.results {
      match &result.outcome {
        DetectionOutcome::Processed { new_refs, .. } => {
          summary.processed += 1;
          if !new_refs.is_empty() {
            summary.with_new_items += 1;
            summary.total_new += new_refs.len();
          }
        }
        DetectionOutcome::Skipped { .. } => summary.skipped += 1,
        DetectionOutcome::Failed { .. } => summary.failed += 1,
      }
    }

    tracing::info!(
      version = %summary.version,
      processed = summary.processed,
      with_new_items = summary.with_new_items,
      skipped = summary.skipped,
      failed = summary.failed,
      total_new = summary.total_new,
      "detection run finished"
    );
    self
      .audit
      .record(
        NewAuditEvent::new(AuditEventType::DetectionCompleted, summary.triggered_by.as_str())
          .version(summary.version.as_str())
          .new_count(saturating_u32(summary.total_new))
          .notes(format!(
            "processed: {}; with new items: {}; skipped: {}; failed: {}",
            summary.processed, summary.with_new_items, summary.skipped, summary.failed
          )),
      )
      .await;

    Ok(summary)
  }

  /// The catalog's current version, or the current UTC month when the
  /// catalog has none.
  async fn default_version(&self) -> Result<String> {
    Ok(
      self
        .current_version()
        .await?
        .unwrap_or_else(|| Utc::now().format("%Y-%m").to_string()),
    )
  }

  async fn aircraft_in_scope(&self, scope: &DetectionScope) -> Result<Vec<Aircraft>> {
    match scope {
      DetectionScope::Aircraft(id) => {
        let aircraft = self
          .store
          .get_aircraft(*id)
          .await
          .map_err(Error::store)?
          .ok_or_else(|| Error::NotFound(format!("aircraft {id}")))?;
        Ok(vec![aircraft])
      }
      DetectionScope::Owner(owner) => {
        self.store.list_aircraft(Some(owner)).await.map_err(Error::store)
      }
      DetectionScope::All => self.store.list_aircraft(None).await.map_err(Error::store),
    }
  }

  /// Process every aircraft on its own task, at most `max_concurrency` at a
  /// time. Results come back in input order.
  async fn run_batch(
    &self,
    aircraft: Vec<Aircraft>,
    version: &str,
    force: bool,
    triggered_by: &str,
  ) -> Vec<AircraftDetectionResult> {
    let permits = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
    let mut tasks = JoinSet::new();
    let mut pending = HashMap::new();

    for (index, target) in aircraft.iter().enumerate() {
      let engine = self.clone();
      let permits = Arc::clone(&permits);
      let target = target.clone();
      let version = version.to_owned();
      let triggered_by = triggered_by.to_owned();

      let handle = tasks.spawn(async move {
        // The semaphore is never closed, so acquiring cannot fail.
        let _permit = permits.acquire_owned().await;
        engine.detect_aircraft(&target, &version, force, &triggered_by).await
      });
      pending.insert(handle.id(), index);
    }

    let mut slots: Vec<Option<AircraftDetectionResult>> = vec![None; aircraft.len()];
    while let Some(joined) = tasks.join_next_with_id().await {
      match joined {
        Ok((id, result)) => {
          if let Some(&index) = pending.get(&id) {
            slots[index] = Some(result);
          }
        }
        Err(e) => {
          tracing::warn!(error = %e, "detection task did not complete");
        }
      }
    }

    let mut results = Vec::with_capacity(aircraft.len());
    for (target, slot) in aircraft.into_iter().zip(slots) {
      if let Some(result) = slot {
        results.push(result);
        continue;
      }
      let error = "detection task did not complete".to_owned();
      self
        .audit
        .record(
          NewAuditEvent::new(AuditEventType::DetectionFailed, triggered_by)
            .aircraft(target.aircraft_id)
            .version(version)
            .notes(error.as_str()),
        )
        .await;
      results.push(AircraftDetectionResult {
        aircraft_id:      target.aircraft_id,
        registration:     target.registration,
        previous_version: None,
        outcome:          DetectionOutcome::Failed { error },
      });
    }
    results
  }

  /// Run one aircraft through the loop, turning any error into a
  /// [`DetectionOutcome::Failed`] and auditing it.
  pub(crate) async fn detect_aircraft(
    &self,
    aircraft: &Aircraft,
    version: &str,
    force: bool,
    triggered_by: &str,
  ) -> AircraftDetectionResult {
    let (previous_version, outcome) =
      match self.try_detect(aircraft, version, force, triggered_by).await {
        Ok(done) => done,
        Err(e) => {
          tracing::warn!(
            aircraft_id = %aircraft.aircraft_id,
            registration = %aircraft.registration,
            error = %e,
            "detection failed for aircraft"
          );
          self
            .audit
            .record(
              NewAuditEvent::new(AuditEventType::DetectionFailed, triggered_by)
                .aircraft(aircraft.aircraft_id)
                .version(version)
                .notes(e.to_string()),
            )
            .await;
          (None, DetectionOutcome::Failed { error: e.to_string() })
        }
      };

    AircraftDetectionResult {
      aircraft_id: aircraft.aircraft_id,
      registration: aircraft.registration.clone(),
      previous_version,
      outcome,
    }
  }

  /// A failed merge leaves the aircraft exactly as it was, so the next run
  /// for the same version processes it again.
  async fn try_detect(
    &self,
    aircraft: &Aircraft,
    version: &str,
    force: bool,
    triggered_by: &str,
  ) -> Result<(Option<String>, DetectionOutcome)> {
    let aircraft_id = aircraft.aircraft_id;
    let state = self
      .store
      .get_knowledge(aircraft_id)
      .await
      .map_err(Error::store)?;
    let previous_version = state.and_then(|s| s.last_processed_version);

    if !force && previous_version.as_deref() == Some(version) {
      tracing::debug!(%aircraft_id, %version, "version already processed");
      let reason = SkipReason::AlreadyProcessed { version: version.to_owned() };
      return Ok((previous_version, DetectionOutcome::Skipped { reason }));
    }

    let identity = self
      .sources
      .resolve_identity(&aircraft.registration)
      .await
      .map_err(Error::source)?
      .filter(TypeIdentity::is_resolved);
    let Some(identity) = identity else {
      tracing::warn!(
        %aircraft_id,
        registration = %aircraft.registration,
        "no usable registry identity; skipping"
      );
      let reason = SkipReason::IdentityUnresolved;
      return Ok((previous_version, DetectionOutcome::Skipped { reason }));
    };

    let requirements = self
      .sources
      .applicable_requirements(&identity)
      .await
      .map_err(Error::source)?;

    let mut kinds: BTreeMap<String, RequirementKind> = BTreeMap::new();
    for requirement in requirements {
      kinds.entry(requirement.reference).or_insert(requirement.kind);
    }

    let type_key = identity.type_key();
    let merged = self
      .store
      .merge_known_references(KnowledgeMerge {
        aircraft_id,
        type_key: type_key.clone(),
        applicable: kinds,
        version: version.to_owned(),
      })
      .await
      .map_err(Error::store)?;

    let new_refs: Vec<String> = merged.new_references.into_iter().collect();
    let fan_out = merged.fan_out;

    if !new_refs.is_empty() {
      tracing::info!(
        %aircraft_id,
        registration = %aircraft.registration,
        %version,
        new = new_refs.len(),
        "new catalog references detected"
      );
      self
        .audit
        .record(
          NewAuditEvent::new(AuditEventType::NewItemsFound, triggered_by)
            .aircraft(aircraft_id)
            .version(version)
            .new_count(saturating_u32(new_refs.len()))
            .refs(new_refs.iter().cloned()),
        )
        .await;
    }

    if let Some(result) = fan_out.as_ref().filter(|r| !r.globally_new.is_empty()) {
      tracing::info!(
        type_key = %result.type_key,
        source_aircraft = %aircraft_id,
        globally_new = result.globally_new.len(),
        alerts = result.alerts_created,
        aircraft = result.aircraft_notified,
        "collaborative alerts fanned out"
      );
    }

    let designator = identity.usable_designator().map(str::to_owned);
    Ok((previous_version, DetectionOutcome::Processed {
      designator,
      type_key,
      new_refs,
      fan_out,
    }))
  }
}

pub(crate) fn saturating_u32(n: usize) -> u32 { u32::try_from(n).unwrap_or(u32::MAX) }
