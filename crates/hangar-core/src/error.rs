//! Error types for `hangar-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown requirement kind: {0:?}")]
  UnknownKind(String),

  #[error("unknown alert status: {0:?}")]
  UnknownAlertStatus(String),

  #[error("unknown audit event type: {0:?}")]
  UnknownEventType(String),

  #[error("invalid identifier: {0:?}")]
  InvalidIdentifier(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
