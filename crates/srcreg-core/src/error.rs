//! Error types for `srcreg-core`.

use thiserror::Error;

use crate::check::Checklist;

#[derive(Debug, Error)]
pub enum Error {
  /// The candidate failed validation. The checklist carries every issue
  /// found, not just the first one.
  #[error("record rejected: {}", .0.summary())]
  Rejected(Box<Checklist>),

  #[error("no record resolves from key {0:?}")]
  NotFound(String),

  #[error("alias chain loops: {}", .0.join(" -> "))]
  AliasCycle(Vec<String>),

  #[error(
    "alias conflict: {old_key:?} already maps to {existing:?}, not {proposed:?}"
  )]
  AliasConflict {
    old_key:  String,
    existing: String,
    proposed: String,
  },

  #[error("{0} requires explicit confirmation")]
  ConfirmationRequired(&'static str),

  /// The persisted state does not parse or breaks the schema. Requires
  /// manual repair.
  #[error("corrupt registry ({location}): {}", .problems.join("; "))]
  CorruptRegistry { location: String, problems: Vec<String> },

  /// An import already breaks an invariant. Every conflict is listed.
  #[error("bootstrap found {} conflict(s): {}", .0.len(), .0.join("; "))]
  Bootstrap(Vec<String>),

  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub fn rejected(checklist: crate::check::Checklist) -> Self {
    Self::Rejected(Box::new(checklist))
  }

  /// Wrap a backend error.
  pub fn storage<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Storage(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
