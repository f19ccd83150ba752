//! Error types for `srcreg-artifacts`.

use thiserror::Error;

use crate::drift::ArtifactDrift;

#[derive(Debug, Error)]
pub enum Error {
  #[error("xml error: {0}")]
  Xml(String),

  #[error("workbook has no worksheet named {0:?}")]
  MissingSheet(&'static str),

  /// Committed artifacts differ from what the registry renders to.
  #[error(
    "generated artifacts drifted: {}",
    .0.iter().map(|d| d.summary()).collect::<Vec<_>>().join("; ")
  )]
  Drift(Vec<ArtifactDrift>),

  #[error(transparent)]
  Core(#[from] srcreg_core::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
