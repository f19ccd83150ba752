//! Where each registry document lives on disk.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use srcreg_core::store::Document;

/// Document paths. Relative paths are resolved against `root`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoragePaths {
  pub root:         PathBuf,
  pub registry:     PathBuf,
  pub aliases:      PathBuf,
  pub change_log:   PathBuf,
  pub schema:       PathBuf,
  pub sheet:        PathBuf,
  pub bibliography: PathBuf,
  pub report:       PathBuf,
}

impl Default for StoragePaths {
  fn default() -> Self {
    Self {
      root:         PathBuf::from("."),
      registry:     PathBuf::from("metadata/sources/sources.json"),
      aliases:      PathBuf::from("metadata/sources/aliases.json"),
      change_log:   PathBuf::from("metadata/sources/change_log.json"),
      schema:       PathBuf::from("metadata/sources/schema.json"),
      sheet:        PathBuf::from("handmade_tables/dictionary.xml"),
      bibliography: PathBuf::from(
        "documentation/BibTeX files/GCWealthProject_DataSourcesLibrary.bib",
      ),
      report:       PathBuf::from("metadata/sources/reconciliation_report.md"),
    }
  }
}

impl StoragePaths {
  /// Default layout under `root`.
  pub fn under(root: impl Into<PathBuf>) -> Self {
    Self {
      root: root.into(),
      ..Self::default()
    }
  }

  pub fn path(&self, doc: Document) -> PathBuf {
    let rel: &Path = match doc {
      Document::Registry => &self.registry,
      Document::Aliases => &self.aliases,
      Document::ChangeLog => &self.change_log,
      Document::Schema => &self.schema,
      Document::Sheet => &self.sheet,
      Document::Bibliography => &self.bibliography,
      Document::Report => &self.report,
    };
    if rel.is_absolute() {
      rel.to_path_buf()
    } else {
      self.root.join(rel)
    }
  }
}
