//! Error type for `hangar-engine`.

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("invalid input: {0}")]
  InvalidInput(String),

  /// The detection store failed; callers may retry.
  #[error("store error: {0}")]
  Store(#[source] BoxError),

  /// The registry, catalog, or evidence collaborator failed.
  #[error("source error: {0}")]
  Source(#[source] BoxError),
}

impl Error {
  pub(crate) fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }

  pub(crate) fn source(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Source(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
