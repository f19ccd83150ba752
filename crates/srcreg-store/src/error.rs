//! Error type for `srcreg-store`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("failed to read {path}: {source}")]
  Read {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to write {path}: {source}")]
  Write {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// Raised by [`crate::MemoryStorage`] when a write failure is injected.
  #[error("write to {0} refused")]
  Refused(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
