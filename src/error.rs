//! Error types: domain errors per concern, and `AppError` mapping them onto HTTP responses.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::json;
use thiserror::Error;

/// Rejections raised by the exam session state machine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
  #[error("no questions available for this exam")]
  Empty,

  /// Validation: submit without a selected answer. No state change.
  #[error("no answer selected; please select an answer before submitting")]
  NoAnswerSelected,

  #[error("'{0}' is not an option of the current question")]
  UnknownOption(String),

  #[error("question index {index} is out of range (exam has {len} questions)")]
  IndexOutOfRange { index: usize, len: usize },

  #[error("already at the first question")]
  AtFirstQuestion,

  #[error("exam already finished")]
  Finalized,
}

/// Failures of the personalised exam generation call.
#[derive(Debug, Error)]
pub enum GenerationError {
  #[error("AI generated an empty exam. Please try different parameters.")]
  EmptyExam,

  #[error("AI practice is not configured on this server")]
  Unavailable,

  #[error("exam length must be between {min} and {max} questions")]
  InvalidLength { min: u32, max: u32 },

  #[error("model call failed: {0}")]
  Upstream(String),

  #[error("could not parse model output: {0}")]
  MalformedOutput(String),
}

/// Failures of the hand-off key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("failed to serialize value for '{key}': {source}")]
  Serialize { key: String, source: serde_json::Error },

  #[error("stored value under '{key}' is corrupted: {source}")]
  Corrupted { key: String, source: serde_json::Error },
}

/// Application error returned by HTTP handlers.
#[derive(Debug, Error)]
pub enum AppError {
  // 400
  #[error("{0}")]
  BadRequest(String),

  // 404: data-absent (unknown subject, empty batch, missing summary)
  #[error("{0}")]
  NotFound(String),

  // 409
  #[error("{0}")]
  Conflict(String),

  // 422: user-facing validation notice
  #[error("{0}")]
  Validation(String),

  // 502
  #[error("{0}")]
  Upstream(String),

  // 503
  #[error("{0}")]
  Unavailable(String),

  // 500
  #[error("{0}")]
  Internal(String),
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let (status, message) = match self {
      AppError::Internal(msg) => {
        tracing::error!(target: "exam_backend", "Internal Server Error: {}", msg);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
      }
      AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
      AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
      AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
      AppError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
      AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
      AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}

impl From<SessionError> for AppError {
  fn from(err: SessionError) -> Self {
    match err {
      SessionError::Empty => AppError::NotFound(err.to_string()),
      SessionError::NoAnswerSelected => AppError::Validation(err.to_string()),
      SessionError::Finalized => AppError::Conflict(err.to_string()),
      SessionError::UnknownOption(_)
      | SessionError::IndexOutOfRange { .. }
      | SessionError::AtFirstQuestion => AppError::BadRequest(err.to_string()),
    }
  }
}

impl From<GenerationError> for AppError {
  fn from(err: GenerationError) -> Self {
    match err {
      GenerationError::InvalidLength { .. } => AppError::BadRequest(err.to_string()),
      GenerationError::Unavailable => AppError::Unavailable(err.to_string()),
      GenerationError::EmptyExam
      | GenerationError::Upstream(_)
      | GenerationError::MalformedOutput(_) => AppError::Upstream(err.to_string()),
    }
  }
}

impl From<StoreError> for AppError {
  fn from(err: StoreError) -> Self {
    match err {
      StoreError::Serialize { .. } => AppError::Internal(err.to_string()),
      StoreError::Corrupted { .. } => AppError::NotFound(err.to_string()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn session_errors_map_to_statuses() {
    let status = |e: SessionError| AppError::from(e).into_response().status();
    assert_eq!(status(SessionError::NoAnswerSelected), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(status(SessionError::Empty), StatusCode::NOT_FOUND);
    assert_eq!(status(SessionError::Finalized), StatusCode::CONFLICT);
    assert_eq!(status(SessionError::IndexOutOfRange { index: 9, len: 2 }), StatusCode::BAD_REQUEST);
  }

  #[test]
  fn empty_generation_is_an_upstream_failure() {
    let resp = AppError::from(GenerationError::EmptyExam).into_response();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
  }
}
