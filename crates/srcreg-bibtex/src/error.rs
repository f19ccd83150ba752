//! Error types for the srcreg-bibtex codec.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
  #[error("no BibTeX entry found")]
  NoEntry,

  #[error("entry starting at byte {0} is never closed")]
  Unterminated(usize),

  #[error("@{entry_type} entry at byte {offset} has no key")]
  MissingKey { entry_type: String, offset: usize },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
