//! Source records: the canonical unit of the registry.
//!
//! A record describes one bibliographic data source. `source` and `citekey`
//! are populated from a single key for new records; legacy records may carry
//! different values and that divergence is tolerated, not propagated.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::normalize;

// ─── Field lists ─────────────────────────────────────────────────────────────

/// Top-level fields shown on the editing surface, in form order.
pub const USER_FIELDS: &[&str] = &[
  "section",
  "aggsource",
  "legend",
  "source",
  "citekey",
  "data_type",
  "link",
  "ref_link",
  "inclusion_in_warehouse",
  "multigeo_reference",
  "metadata",
  "metadatalink",
];

/// Bibliography fields, in the order they are rendered.
pub const BIB_FIELDS: &[&str] = &[
  "entry_type",
  "title",
  "author",
  "year",
  "month",
  "journal",
  "booktitle",
  "volume",
  "number",
  "pages",
  "institution",
  "publisher",
  "doi",
  "url",
  "urldate",
  "abstract",
  "keywords",
  "note",
];

// ─── Review notes ────────────────────────────────────────────────────────────

/// Comment-only fields carried over from the legacy dictionary. Retained in
/// storage, never edited through the form and blank in generated artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewNotes {
  pub qcommentsforta:       String,
  pub tareply:              String,
  pub tacomments:           String,
  pub arjcomments:          String,
  pub arjreplies:           String,
  pub seeaggsourcelisthere: String,
}

// ─── Bibliography block ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BibFields {
  /// BibTeX entry type, e.g. `article` or `techreport`.
  pub entry_type:   String,
  pub title:        String,
  pub author:       String,
  pub year:         String,
  pub month:        String,
  pub journal:      String,
  pub booktitle:    String,
  pub volume:       String,
  pub number:       String,
  pub pages:        String,
  pub institution:  String,
  pub publisher:    String,
  pub doi:          String,
  pub url:          String,
  pub urldate:      String,
  #[serde(rename = "abstract")]
  pub abstract_text: String,
  pub keywords:     String,
  pub note:         String,
  /// Fields outside the fixed set, rendered after it in name order.
  pub extra_fields: BTreeMap<String, String>,
}

impl BibFields {
  pub fn field(&self, name: &str) -> Option<&str> {
    Some(match name {
      "entry_type" => &self.entry_type,
      "title" => &self.title,
      "author" => &self.author,
      "year" => &self.year,
      "month" => &self.month,
      "journal" => &self.journal,
      "booktitle" => &self.booktitle,
      "volume" => &self.volume,
      "number" => &self.number,
      "pages" => &self.pages,
      "institution" => &self.institution,
      "publisher" => &self.publisher,
      "doi" => &self.doi,
      "url" => &self.url,
      "urldate" => &self.urldate,
      "abstract" => &self.abstract_text,
      "keywords" => &self.keywords,
      "note" => &self.note,
      _ => return None,
    })
  }

  pub fn field_mut(&mut self, name: &str) -> Option<&mut String> {
    Some(match name {
      "entry_type" => &mut self.entry_type,
      "title" => &mut self.title,
      "author" => &mut self.author,
      "year" => &mut self.year,
      "month" => &mut self.month,
      "journal" => &mut self.journal,
      "booktitle" => &mut self.booktitle,
      "volume" => &mut self.volume,
      "number" => &mut self.number,
      "pages" => &mut self.pages,
      "institution" => &mut self.institution,
      "publisher" => &mut self.publisher,
      "doi" => &mut self.doi,
      "url" => &mut self.url,
      "urldate" => &mut self.urldate,
      "abstract" => &mut self.abstract_text,
      "keywords" => &mut self.keywords,
      "note" => &mut self.note,
      _ => return None,
    })
  }
}

// ─── SourceRecord ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceRecord {
  /// Opaque identifier assigned at creation; never edited.
  pub id:                     String,
  pub section:                String,
  pub aggsource:              String,
  pub legend:                 String,
  pub source:                 String,
  pub data_type:              String,
  pub link:                   String,
  pub ref_link:               String,
  pub citekey:                String,
  pub inclusion_in_warehouse: String,
  pub multigeo_reference:     String,
  pub metadata:               String,
  pub metadatalink:           String,
  #[serde(flatten)]
  pub review:                 ReviewNotes,
  pub bib:                    BibFields,
  pub created_by:             String,
  pub updated_by:             String,
  pub created_at:             Option<DateTime<Utc>>,
  pub updated_at:             Option<DateTime<Utc>>,
}

/// Allocate a fresh record identifier.
pub fn new_record_id() -> String { format!("src-{}", Uuid::new_v4().simple()) }

impl SourceRecord {
  /// Look up a field by path. Bibliography fields use a `bib.` prefix.
  pub fn field(&self, path: &str) -> Option<&str> {
    if let Some(name) = path.strip_prefix("bib.") {
      return self.bib.field(name);
    }
    Some(match path {
      "id" => &self.id,
      "section" => &self.section,
      "aggsource" => &self.aggsource,
      "legend" => &self.legend,
      "source" => &self.source,
      "data_type" => &self.data_type,
      "link" => &self.link,
      "ref_link" => &self.ref_link,
      "citekey" => &self.citekey,
      "inclusion_in_warehouse" => &self.inclusion_in_warehouse,
      "multigeo_reference" => &self.multigeo_reference,
      "metadata" => &self.metadata,
      "metadatalink" => &self.metadatalink,
      _ => return None,
    })
  }

  /// Mutable access to a user-editable field. `id` and audit fields are not
  /// reachable through this accessor.
  pub fn field_mut(&mut self, path: &str) -> Option<&mut String> {
    if let Some(name) = path.strip_prefix("bib.") {
      return self.bib.field_mut(name);
    }
    Some(match path {
      "section" => &mut self.section,
      "aggsource" => &mut self.aggsource,
      "legend" => &mut self.legend,
      "source" => &mut self.source,
      "data_type" => &mut self.data_type,
      "link" => &mut self.link,
      "ref_link" => &mut self.ref_link,
      "citekey" => &mut self.citekey,
      "inclusion_in_warehouse" => &mut self.inclusion_in_warehouse,
      "multigeo_reference" => &mut self.multigeo_reference,
      "metadata" => &mut self.metadata,
      "metadatalink" => &mut self.metadatalink,
      _ => return None,
    })
  }

  /// Every editable field path: top-level fields then `bib.*` fields.
  pub fn editable_paths() -> impl Iterator<Item = String> {
    USER_FIELDS
      .iter()
      .map(|f| (*f).to_owned())
      .chain(BIB_FIELDS.iter().map(|f| format!("bib.{f}")))
  }

  /// The key used in bibliography output: the citekey, or the source when a
  /// legacy record has no citekey.
  pub fn bib_key(&self) -> String {
    let citekey = normalize::whitespace(&self.citekey);
    if citekey.is_empty() {
      normalize::whitespace(&self.source)
    } else {
      citekey
    }
  }

  /// The URL used for duplicate detection: `bib.url` if present, else `link`.
  pub fn url_candidate(&self) -> &str {
    if self.bib.url.trim().is_empty() {
      &self.link
    } else {
      &self.bib.url
    }
  }

  /// Names of editable fields with a non-blank value.
  pub fn populated_fields(&self) -> Vec<String> {
    Self::editable_paths()
      .filter(|p| self.field(p).is_some_and(|v| !v.trim().is_empty()))
      .collect()
  }

  /// Names of editable fields whose normalized values differ.
  pub fn changed_fields(&self, other: &SourceRecord) -> Vec<String> {
    Self::editable_paths()
      .filter(|p| {
        let a = self.field(p).map(normalize::whitespace);
        let b = other.field(p).map(normalize::whitespace);
        a != b
      })
      .collect()
  }

  /// Whether all user-facing fields match. Audit fields are ignored.
  pub fn same_content(&self, other: &SourceRecord) -> bool {
    self.id == other.id
      && self.changed_fields(other).is_empty()
      && self.bib.extra_fields == other.bib.extra_fields
      && self.review == other.review
  }

  /// Collapse whitespace in every editable field.
  pub fn normalize_whitespace(&mut self) {
    for path in Self::editable_paths() {
      if let Some(value) = self.field_mut(&path) {
        *value = normalize::whitespace(value);
      }
    }
  }
}
