//! Handlers for the audit trail and the global type pools.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/audit-log`              | Optional `?aircraft_id`, `?limit` (1..=500, default 100) |
//! | `GET`  | `/type-pools`             | Totals and the largest pools |
//! | `GET`  | `/type-pools/{type_key}`  | e.g. `/type-pools/CESSNA::172M` |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use hangar_core::{
  audit::AuditEvent,
  knowledge::{GlobalTypePool, PoolStats},
  source::{Catalog, EvidenceSource, IdentityResolver},
  store::{AuditSink, DetectionStore},
};
use hangar_engine::Engine;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct LogParams {
  pub aircraft_id: Option<String>,
  pub limit:       Option<usize>,
}

/// `GET /audit-log[?aircraft_id=...][&limit=...]`
pub async fn log<S, X>(
  State(engine): State<Engine<S, X>>,
  Query(params): Query<LogParams>,
) -> Result<Json<Vec<AuditEvent>>, ApiError>
where
  S: DetectionStore + AuditSink + 'static,
  X: IdentityResolver + Catalog + EvidenceSource + 'static,
{
  let aircraft_id = params
    .aircraft_id
    .as_deref()
    .map(|s| {
      Uuid::parse_str(s).map_err(|_| ApiError::BadRequest(format!("malformed aircraft id {s:?}")))
    })
    .transpose()?;
  Ok(Json(engine.audit_log(aircraft_id, params.limit).await?))
}

/// `GET /type-pools/{type_key}`
pub async fn type_pool<S, X>(
  State(engine): State<Engine<S, X>>,
  Path(type_key): Path<String>,
) -> Result<Json<GlobalTypePool>, ApiError>
where
  S: DetectionStore + AuditSink + 'static,
  X: IdentityResolver + Catalog + EvidenceSource + 'static,
{
  Ok(Json(engine.type_pool(&type_key).await?))
}

/// `GET /type-pools`
pub async fn stats<S, X>(State(engine): State<Engine<S, X>>) -> Result<Json<PoolStats>, ApiError>
where
  S: DetectionStore + AuditSink + 'static,
  X: IdentityResolver + Catalog + EvidenceSource + 'static,
{
  Ok(Json(engine.pool_stats().await?))
}
