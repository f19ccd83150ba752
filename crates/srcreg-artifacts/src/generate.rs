//! Rendering of the derived artifacts from the canonical registry.

use sha2::{Digest, Sha256};
use srcreg_core::{registry::Registry, store::Document};

use crate::{
  Result,
  sheet::{SheetRow, write_sheet},
};

/// The dictionary sheet and bibliography rendered from one registry state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
  pub sheet:        String,
  pub bibliography: String,
}

impl Artifacts {
  /// Artifacts paired with the document each one is written to.
  pub fn documents(&self) -> [(Document, &str); 2] {
    [
      (Document::Sheet, self.sheet.as_str()),
      (Document::Bibliography, self.bibliography.as_str()),
    ]
  }
}

/// One sheet row per record, in registry order.
pub fn sheet_rows(registry: &Registry) -> Vec<SheetRow> {
  registry.records().iter().map(SheetRow::from_record).collect()
}

/// Render both artifacts. The same registry always yields the same bytes.
pub fn render(registry: &Registry) -> Result<Artifacts> {
  Ok(Artifacts {
    sheet:        write_sheet(&sheet_rows(registry))?,
    bibliography: srcreg_bibtex::render_all(registry.records()),
  })
}

/// Hex SHA-256 of a document's text.
pub fn digest(text: &str) -> String {
  hex::encode(Sha256::digest(text.as_bytes()))
}

#[cfg(test)]
mod tests {
  use srcreg_core::record::SourceRecord;

  use super::*;

  fn registry() -> Registry {
    let mut a = SourceRecord {
      id: "src-b".into(),
      source: "Zucman2019".into(),
      citekey: "Zucman2019".into(),
      ..Default::default()
    };
    a.bib.entry_type = "article".into();
    a.bib.title = "Global Wealth Inequality".into();
    let mut b = SourceRecord {
      id: "src-a".into(),
      source: "Alvaredo2018".into(),
      citekey: "Alvaredo2018".into(),
      ..Default::default()
    };
    b.bib.entry_type = "book".into();
    Registry::from_records(vec![a, b])
  }

  #[test]
  fn rendering_twice_is_byte_identical() {
    let first = render(&registry()).unwrap();
    let second = render(&registry()).unwrap();
    assert_eq!(first, second);
    assert_eq!(digest(&first.sheet), digest(&second.sheet));
  }

  #[test]
  fn one_row_and_entry_per_record_in_key_order() {
    let artifacts = render(&registry()).unwrap();
    let alvaredo = artifacts.bibliography.find("@book{Alvaredo2018,").unwrap();
    let zucman = artifacts.bibliography.find("@article{Zucman2019,").unwrap();
    assert!(alvaredo < zucman);
    assert_eq!(sheet_rows(&registry()).len(), 2);
    assert_eq!(artifacts.sheet.matches("<Row>").count(), 3);
  }

  #[test]
  fn digest_is_hex_sha256() {
    assert_eq!(
      digest(""),
      "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
  }
}
