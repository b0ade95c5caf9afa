//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("internal error: {0}")]
  Internal(#[source] hangar_engine::Error),
}

impl From<hangar_engine::Error> for ApiError {
  fn from(e: hangar_engine::Error) -> Self {
    match e {
      hangar_engine::Error::NotFound(m) => ApiError::NotFound(m),
      hangar_engine::Error::InvalidInput(m) => ApiError::BadRequest(m),
      other => ApiError::Internal(other),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Internal(e) => {
        tracing::error!(error = %e, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
