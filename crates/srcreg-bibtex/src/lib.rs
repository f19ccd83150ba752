//! BibTeX codec for the source registry.
//!
//! Converts between bibliography text and [`srcreg_core`] record types. Pure
//! synchronous; no I/O.
//!
//! # Quick start
//!
//! ```no_run
//! use srcreg_bibtex::parse;
//!
//! let entry = parse("@article{Smith2020, title = {Wealth Taxes}, year = 2020}").unwrap();
//! assert_eq!(entry.key, "Smith2020");
//! ```

pub mod error;
mod parse;
mod serialize;

pub use error::{Error, Result};
use srcreg_core::{
  normalize,
  record::{BibFields, SourceRecord},
};

// ─── Public types ────────────────────────────────────────────────────────────

/// One parsed bibliography entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibEntry {
  /// Lower-cased entry type, e.g. `article`.
  pub entry_type: String,
  pub key:        String,
  /// Fields in file order with lower-cased names.
  pub fields:     Vec<(String, String)>,
}

impl BibEntry {
  pub fn get(&self, name: &str) -> Option<&str> {
    self
      .fields
      .iter()
      .find(|(n, _)| n == name)
      .map(|(_, v)| v.as_str())
  }

  /// Map onto the record's bibliography block. Unknown fields go to
  /// `extra_fields`; whitespace is collapsed.
  pub fn to_bib_fields(&self) -> BibFields {
    let mut bib = BibFields {
      entry_type: self.entry_type.clone(),
      ..BibFields::default()
    };
    for (name, value) in &self.fields {
      let value = normalize::whitespace(value);
      let slot = if name == "entry_type" {
        None
      } else {
        bib.field_mut(name)
      };
      match slot {
        Some(slot) => *slot = value,
        None => {
          bib.extra_fields.insert(name.clone(), value);
        }
      }
    }
    bib
  }
}

// ─── Public API ──────────────────────────────────────────────────────────────

/// Parse the first entry in `input`, e.g. a pasted citation.
pub fn parse(input: &str) -> Result<BibEntry> {
  parse::scan(input)
    .into_iter()
    .next()
    .unwrap_or(Err(Error::NoEntry))
}

/// Parse every entry in `input`.
///
/// A malformed entry yields `Err(…)` in its position without aborting the
/// rest. Entries are returned in file order, duplicates included.
pub fn parse_many(input: &str) -> Vec<Result<BibEntry>> { parse::scan(input) }

/// Render `bib` as one entry keyed by `key`.
pub fn render_entry(key: &str, bib: &BibFields) -> String {
  serialize::render_entry(key, bib)
}

/// Render a record under its citekey (or source, for legacy records without
/// one). Returns `None` when the record has neither.
pub fn render_record(record: &SourceRecord) -> Option<String> {
  serialize::render_record(record)
}

/// Render the bibliography file for `records`, in the order given.
pub fn render_all<'a>(
  records: impl IntoIterator<Item = &'a SourceRecord>,
) -> String {
  serialize::render_all(records)
}

// ─── Round-trip test ─────────────────────────────────────────────────────────
