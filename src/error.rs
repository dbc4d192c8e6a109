use serde::Serialize;

use crate::auth::AuthError;
use crate::cycle::CycleError;
use crate::llm::LlmError;

/// ---------------------------------------------------------------------------
/// Command Error
/// ---------------------------------------------------------------------------

/// Error returned by every Tauri command.
/// Serialized to the frontend as its display string.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
  #[error("{0}")]
  Validation(String),

  #[error("Not found: {0}")]
  NotFound(String),

  #[error("Not signed in")]
  NotAuthenticated,

  #[error("Database error: {0}")]
  Database(#[from] sqlx::Error),

  #[error(transparent)]
  Auth(#[from] AuthError),

  #[error(transparent)]
  Llm(#[from] LlmError),

  #[error(transparent)]
  Cycle(#[from] CycleError),
}

impl AppError {
  pub fn validation(message: impl Into<String>) -> Self {
    AppError::Validation(message.into())
  }
}

impl Serialize for AppError {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    serializer.serialize_str(&self.to_string())
  }
}

pub type AppResult<T> = Result<T, AppError>;
