//! Handlers for `/aircraft/{id}/...` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/aircraft/{id}/alert-status`  | Detection alert flag and count |
//! | `POST` | `/aircraft/{id}/mark-reviewed` | Optional `?reviewer=`; clears the alert |
//! | `GET`  | `/aircraft/{id}/comparison`    | Paperwork vs catalog, as of today (UTC) |
//! | `GET`  | `/aircraft/{id}/baseline`      | Catalog references with times seen |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use hangar_core::{
  compare::{BaselineReport, ComparisonReport},
  knowledge::ReviewOutcome,
  source::{Catalog, EvidenceSource, IdentityResolver},
  store::{AuditSink, DetectionStore},
};
use hangar_engine::{AlertStatusView, Engine};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

/// `GET /aircraft/{id}/alert-status`
pub async fn alert_status<S, X>(
  State(engine): State<Engine<S, X>>,
  Path(id): Path<Uuid>,
) -> Result<Json<AlertStatusView>, ApiError>
where
  S: DetectionStore + AuditSink + 'static,
  X: IdentityResolver + Catalog + EvidenceSource + 'static,
{
  Ok(Json(engine.alert_status(id).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewParams {
  /// Recorded on the audit event, e.g. `user:<id>`.
  pub reviewer: Option<String>,
}

/// `POST /aircraft/{id}/mark-reviewed[?reviewer=...]`
pub async fn mark_reviewed<S, X>(
  State(engine): State<Engine<S, X>>,
  Path(id): Path<Uuid>,
  Query(params): Query<ReviewParams>,
) -> Result<Json<ReviewOutcome>, ApiError>
where
  S: DetectionStore + AuditSink + 'static,
  X: IdentityResolver + Catalog + EvidenceSource + 'static,
{
  let outcome = engine.mark_reviewed(id, params.reviewer.as_deref()).await?;
  Ok(Json(outcome))
}

/// `GET /aircraft/{id}/comparison`
pub async fn comparison<S, X>(
  State(engine): State<Engine<S, X>>,
  Path(id): Path<Uuid>,
) -> Result<Json<ComparisonReport>, ApiError>
where
  S: DetectionStore + AuditSink + 'static,
  X: IdentityResolver + Catalog + EvidenceSource + 'static,
{
  Ok(Json(engine.comparison(id).await?))
}

/// `GET /aircraft/{id}/baseline`
pub async fn baseline<S, X>(
  State(engine): State<Engine<S, X>>,
  Path(id): Path<Uuid>,
) -> Result<Json<BaselineReport>, ApiError>
where
  S: DetectionStore + AuditSink + 'static,
  X: IdentityResolver + Catalog + EvidenceSource + 'static,
{
  Ok(Json(engine.baseline(id).await?))
}
