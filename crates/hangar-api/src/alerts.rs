//! Handlers for collaborative alerts.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/owners/{owner}/alerts`          | Optional `?status=unread\|read\|dismissed`; newest first, with counts |
//! | `GET`  | `/owners/{owner}/alerts/count`    | `{"unread_count", "total_count"}` |
//! | `POST` | `/owners/{owner}/alerts/read-all` | `{"updated": n}` |
//! | `POST` | `/alerts/{id}/read`               | Idempotent |
//! | `POST` | `/alerts/{id}/dismiss`            | Idempotent; dismissed is final |
//!
//! Alert ids are taken as raw strings so that a malformed id is a JSON 400
//! from the engine rather than a path rejection.

use axum::{
  Json,
  extract::{Path, Query, State},
};
use hangar_core::{
  alert::{Alert, AlertCounts, AlertList},
  source::{Catalog, EvidenceSource, IdentityResolver},
  store::{AuditSink, DetectionStore},
};
use hangar_engine::Engine;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// An alert plus its display message.
#[derive(Debug, Serialize)]
pub struct AlertBody {
  #[serde(flatten)]
  pub alert:   Alert,
  pub message: String,
}

impl From<Alert> for AlertBody {
  fn from(alert: Alert) -> Self {
    let message = alert.message();
    Self { alert, message }
  }
}

/// An owner's alerts with the counts `/alerts/count` would report.
#[derive(Debug, Serialize)]
pub struct AlertListBody {
  pub alerts:       Vec<AlertBody>,
  pub total_count:  usize,
  pub unread_count: usize,
}

impl From<AlertList> for AlertListBody {
  fn from(list: AlertList) -> Self {
    Self {
      alerts:       list.alerts.into_iter().map(AlertBody::from).collect(),
      total_count:  list.total_count,
      unread_count: list.unread_count,
    }
  }
}

// ─── Per owner ───────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub status: Option<String>,
}

/// `GET /owners/{owner}/alerts[?status=...]`
pub async fn list<S, X>(
  State(engine): State<Engine<S, X>>,
  Path(owner): Path<String>,
  Query(params): Query<ListParams>,
) -> Result<Json<AlertListBody>, ApiError>
where
  S: DetectionStore + AuditSink + 'static,
  X: IdentityResolver + Catalog + EvidenceSource + 'static,
{
  let list = engine.list_alerts(&owner, params.status.as_deref()).await?;
  Ok(Json(list.into()))
}

/// `GET /owners/{owner}/alerts/count`
pub async fn count<S, X>(
  State(engine): State<Engine<S, X>>,
  Path(owner): Path<String>,
) -> Result<Json<AlertCounts>, ApiError>
where
  S: DetectionStore + AuditSink + 'static,
  X: IdentityResolver + Catalog + EvidenceSource + 'static,
{
  Ok(Json(engine.alert_counts(&owner).await?))
}

#[derive(Debug, Serialize)]
pub struct ReadAllBody {
  pub updated: usize,
}

/// `POST /owners/{owner}/alerts/read-all`
pub async fn read_all<S, X>(
  State(engine): State<Engine<S, X>>,
  Path(owner): Path<String>,
) -> Result<Json<ReadAllBody>, ApiError>
where
  S: DetectionStore + AuditSink + 'static,
  X: IdentityResolver + Catalog + EvidenceSource + 'static,
{
  let updated = engine.mark_all_read(&owner).await?;
  Ok(Json(ReadAllBody { updated }))
}

// ─── Single alert ────────────────────────────────────────────────────────────

/// `POST /alerts/{id}/read`
pub async fn read_one<S, X>(
  State(engine): State<Engine<S, X>>,
  Path(id): Path<String>,
) -> Result<Json<AlertBody>, ApiError>
where
  S: DetectionStore + AuditSink + 'static,
  X: IdentityResolver + Catalog + EvidenceSource + 'static,
{
  Ok(Json(engine.mark_alert_read(&id).await?.into()))
}

/// `POST /alerts/{id}/dismiss`
pub async fn dismiss_one<S, X>(
  State(engine): State<Engine<S, X>>,
  Path(id): Path<String>,
) -> Result<Json<AlertBody>, ApiError>
where
  S: DetectionStore + AuditSink + 'static,
  X: IdentityResolver + Catalog + EvidenceSource + 'static,
{
  Ok(Json(engine.dismiss_alert(&id).await?.into()))
}
