//! Error types for `dossier-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  /// The resource does not exist or belongs to another owner. The two cases
  /// are deliberately reported the same way.
  #[error("resource not found: {0}")]
  NotFound(Uuid),

  #[error("validation failed: {0}")]
  Validation(String),

  #[error("duplicate {kind}: {key:?} is already in use")]
  Duplicate { kind: &'static str, key: String },

  /// Concurrent writers kept changing the resource between read and write.
  #[error("resource {0} is being modified concurrently, try again")]
  Contended(Uuid),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub(crate) fn validation(message: impl Into<String>) -> Self {
    Self::Validation(message.into())
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
