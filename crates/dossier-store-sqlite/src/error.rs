//! Error type for `dossier-store-sqlite`.

use dossier_core::store::StoreError;
use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[source] tokio_rusqlite::Error),

  /// A natural-key uniqueness constraint was violated.
  #[error("conflict: {0}")]
  Conflict(String),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("row {0} missing after write")]
  MissingRow(uuid::Uuid),
}

impl From<tokio_rusqlite::Error> for Error {
  fn from(e: tokio_rusqlite::Error) -> Self {
    if let tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(
      failure,
      Some(message),
    )) = &e
      && failure.code == ErrorCode::ConstraintViolation
      && message.contains("natural_key")
    {
      return Self::Conflict(message.clone());
    }
    Self::Database(e)
  }
}

impl StoreError for Error {
  fn is_conflict(&self) -> bool { matches!(self, Self::Conflict(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
