//! JSON REST API for Hangar.
//!
//! Exposes an axum [`Router`] over an [`Engine`]. Auth, TLS, and transport
//! concerns are the caller's responsibility; owner and aircraft ids arrive
//! already authorized.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", hangar_api::api_router(engine.clone()))
//! ```

pub mod aircraft;
pub mod alerts;
pub mod audit;
pub mod detection;
pub mod error;

use axum::{
  Router,
  routing::{get, post},
};
use hangar_core::{
  source::{Catalog, EvidenceSource, IdentityResolver},
  store::{AuditSink, DetectionStore},
};
use hangar_engine::Engine;

pub use error::ApiError;

/// Build a fully-materialised API router for `engine`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, X>(engine: Engine<S, X>) -> Router<()>
where
  S: DetectionStore + AuditSink + 'static,
  X: IdentityResolver + Catalog + EvidenceSource + 'static,
{
  Router::new()
    // Detection
    .route("/detection", post(detection::trigger::<S, X>))
    .route("/version", get(detection::version::<S, X>))
    // Aircraft
    .route("/aircraft/{id}/alert-status", get(aircraft::alert_status::<S, X>))
    .route("/aircraft/{id}/mark-reviewed", post(aircraft::mark_reviewed::<S, X>))
    .route("/aircraft/{id}/comparison", get(aircraft::comparison::<S, X>))
    .route("/aircraft/{id}/baseline", get(aircraft::baseline::<S, X>))
    // Collaborative alerts
    .route("/owners/{owner}/alerts", get(alerts::list::<S, X>))
    .route("/owners/{owner}/alerts/count", get(alerts::count::<S, X>))
    .route("/owners/{owner}/alerts/read-all", post(alerts::read_all::<S, X>))
    .route("/alerts/{id}/read", post(alerts::read_one::<S, X>))
    .route("/alerts/{id}/dismiss", post(alerts::dismiss_one::<S, X>))
    // Audit and pools
    .route("/audit-log", get(audit::log::<S, X>))
    .route("/type-pools", get(audit::stats::<S, X>))
    .route("/type-pools/{type_key}", get(audit::type_pool::<S, X>))
    .with_state(engine)
}
