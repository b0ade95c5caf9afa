//! Handlers for detection runs.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/detection` | Body: [`TriggerBody`]; returns the run's [`DetectionSummary`] |
//! | `GET`  | `/version`   | `{"version": ...}`; `null` before the first catalog import |

use axum::{Json, extract::State};
use hangar_core::{
  source::{Catalog, EvidenceSource, IdentityResolver},
  store::{AuditSink, DetectionStore},
};
use hangar_engine::{DetectionRequest, DetectionScope, DetectionSummary, Engine};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

// ─── Trigger ──────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /detection`. With neither `aircraft_id` nor
/// `owner_id`, every aircraft is processed.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TriggerBody {
  pub aircraft_id:  Option<Uuid>,
  pub owner_id:     Option<String>,
  pub version:      Option<String>,
  pub force:        bool,
  pub triggered_by: Option<String>,
}

impl TryFrom<TriggerBody> for DetectionRequest {
  type Error = ApiError;

  fn try_from(b: TriggerBody) -> Result<Self, ApiError> {
    let scope = match (b.aircraft_id, b.owner_id) {
      (Some(_), Some(_)) => {
        return Err(ApiError::BadRequest(
          "give at most one of aircraft_id and owner_id".into(),
        ));
      }
      (Some(id), None) => DetectionScope::Aircraft(id),
      (None, Some(owner)) => DetectionScope::Owner(owner),
      (None, None) => DetectionScope::All,
    };
    Ok(DetectionRequest {
      scope,
      version: b.version,
      force: b.force,
      triggered_by: b.triggered_by,
    })
  }
}

/// `POST /detection`
pub async fn trigger<S, X>(
  State(engine): State<Engine<S, X>>,
  Json(body): Json<TriggerBody>,
) -> Result<Json<DetectionSummary>, ApiError>
where
  S: DetectionStore + AuditSink + 'static,
  X: IdentityResolver + Catalog + EvidenceSource + 'static,
{
  let request = DetectionRequest::try_from(body)?;
  let summary = engine.trigger_detection(request).await?;
  Ok(Json(summary))
}

// ─── Version ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct VersionBody {
  pub version: Option<String>,
}

/// `GET /version`
pub async fn version<S, X>(
  State(engine): State<Engine<S, X>>,
) -> Result<Json<VersionBody>, ApiError>
where
  S: DetectionStore + AuditSink + 'static,
  X: IdentityResolver + Catalog + EvidenceSource + 'static,
{
  let version = engine.current_version().await?;
  Ok(Json(VersionBody { version }))
}
