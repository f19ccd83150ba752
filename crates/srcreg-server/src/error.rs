//! Error types and axum `IntoResponse` implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use srcreg_core::check::Checklist;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Validation failed; nothing was written.
  #[error("record rejected: {}", .0.summary())]
  Rejected(Box<Checklist>),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("{0} requires explicit confirmation")]
  ConfirmationRequired(&'static str),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// A save stopped partway. `completed` lists the documents already
  /// written, in write order.
  #[error(
    "save failed writing {failed} after {} document(s): {reason}",
    completed.len()
  )]
  PartialSave {
    completed: Vec<String>,
    failed:    String,
    reason:    String,
  },

  #[error(transparent)]
  Core(srcreg_core::Error),

  #[error(transparent)]
  Artifacts(srcreg_artifacts::Error),
}

impl From<srcreg_core::Error> for Error {
  fn from(e: srcreg_core::Error) -> Self {
    match e {
      srcreg_core::Error::Rejected(checklist) => Self::Rejected(checklist),
      srcreg_core::Error::NotFound(key) => Self::NotFound(key),
      srcreg_core::Error::ConfirmationRequired(what) => {
        Self::ConfirmationRequired(what)
      }
      other => Self::Core(other),
    }
  }
}

impl From<srcreg_artifacts::Error> for Error {
  fn from(e: srcreg_artifacts::Error) -> Self {
    match e {
      srcreg_artifacts::Error::Core(core) => core.into(),
      other => Self::Artifacts(other),
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let message = self.to_string();
    let (status, body) = match self {
      Error::Rejected(checklist) => {
        let mut body = serde_json::to_value(&*checklist).unwrap_or_default();
        body["error"] = json!(message);
        (StatusCode::UNPROCESSABLE_ENTITY, body)
      }
      Error::NotFound(_) => (StatusCode::NOT_FOUND, json!({ "error": message })),
      Error::ConfirmationRequired(what) => (
        StatusCode::CONFLICT,
        json!({ "error": message, "confirm": what }),
      ),
      Error::BadRequest(_) => (StatusCode::BAD_REQUEST, json!({ "error": message })),
      Error::PartialSave {
        completed,
        failed,
        reason,
      } => (
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({
          "error": message,
          "kind": "PartialSaveFailure",
          "completed": completed,
          "failed": failed,
          "reason": reason,
        }),
      ),
      Error::Core(_) | Error::Artifacts(_) => (
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "error": message }),
      ),
    };
    (status, Json(body)).into_response()
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
