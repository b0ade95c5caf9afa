//! The Hangar detection engine.
//!
//! [`Engine`] ties the pure pieces in `hangar-core` to a [`DetectionStore`]
//! and to the external registry, catalog, and evidence collaborators. It owns
//! the versioned per-aircraft detection loop, the collaborative fan-out
//! across owners of the same aircraft type, the audit trail, and the
//! alert/review operations the API exposes.
//!
//! Every signal it produces is factual: a reference was found, is missing,
//! is new, or has a next-due date inside the review window.

mod audit;
mod detect;
mod report;
mod review;

pub mod error;

use std::sync::Arc;

use hangar_core::{
  source::{Catalog, EvidenceSource, IdentityResolver},
  store::{AuditSink, DetectionStore},
};
use serde::{Deserialize, Serialize};

use crate::audit::BestEffortAudit;

pub use detect::{
  AircraftDetectionResult, DetectionOutcome, DetectionRequest, DetectionScope, DetectionSummary,
  SkipReason,
};
pub use error::{Error, Result};
pub use hangar_core::knowledge::FanOutResult;
pub use review::{AlertStatusView, DEFAULT_AUDIT_LIMIT, MAX_AUDIT_LIMIT};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Tunables for the detection loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Upper bound on aircraft processed at the same time in a batch.
  pub max_concurrency: usize,
  /// Recorded on audit events when the caller does not name a trigger.
  pub triggered_by:    String,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self { max_concurrency: 8, triggered_by: "system".into() }
  }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// The detection engine over a store `S` and a collaborator bundle `X`.
///
/// With the SQLite backend both are the same `SqliteStore`
/// behind two `Arc`s. Cloning is cheap.
pub struct Engine<S, X> {
  store:   Arc<S>,
  sources: Arc<X>,
  audit:   BestEffortAudit<S>,
  config:  EngineConfig,
}

impl<S, X> Clone for Engine<S, X> {
  fn clone(&self) -> Self {
    Self {
      store:   Arc::clone(&self.store),
      sources: Arc::clone(&self.sources),
      audit:   self.audit.clone(),
      config:  self.config.clone(),
    }
  }
}

impl<S, X> Engine<S, X>
where
  S: DetectionStore + AuditSink + 'static,
  X: IdentityResolver + Catalog + EvidenceSource + 'static,
{
  pub fn new(store: Arc<S>, sources: Arc<X>, config: EngineConfig) -> Self {
    let audit = BestEffortAudit::new(Arc::clone(&store));
    Self { store, sources, audit, config }
  }

  pub fn config(&self) -> &EngineConfig { &self.config }

  /// The catalog's current version label, or `None` before the first
  /// import.
  pub async fn current_version(&self) -> Result<Option<String>> {
    self.sources.current_version().await.map_err(Error::source)
  }
}

#[cfg(test)]
mod tests;
