//! One-time import of the legacy dictionary sheet and bibliography into
//! canonical records.
//!
//! Mapping only. Whether the imported collection is acceptable is decided by
//! [`srcreg_core::store::RegistryStore::bootstrap`], which refuses any import
//! that already breaks an identity invariant.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use srcreg_bibtex::BibEntry;
use srcreg_core::{
  normalize,
  record::{ReviewNotes, SourceRecord},
};
use tracing::{debug, warn};

use crate::sheet::SheetRow;

pub const DEFAULT_ENTRY_TYPE: &str = "misc";
pub const DEFAULT_AUTHOR: &str = "Unknown";
pub const DEFAULT_YEAR: &str = "1900";
pub const DEFAULT_KEYWORDS: &str = "Data Sources: Unclassified";

/// Lower-case ASCII slug; runs of other characters become one `-`.
pub fn slugify(value: &str) -> String {
  let mut slug = String::with_capacity(value.len());
  for c in value.trim().chars() {
    if c.is_ascii_alphanumeric() {
      slug.push(c.to_ascii_lowercase());
    } else if !slug.ends_with('-') {
      slug.push('-');
    }
  }
  let slug = slug.trim_matches('-');
  if slug.is_empty() {
    "source".to_owned()
  } else {
    slug.to_owned()
  }
}

/// Index bibliography entries by key. A repeated key keeps the last entry.
pub fn index_bibliography(text: &str) -> HashMap<String, BibEntry> {
  let mut map = HashMap::new();
  for parsed in srcreg_bibtex::parse_many(text) {
    match parsed {
      Ok(entry) => {
        map.insert(entry.key.clone(), entry);
      }
      Err(e) => warn!(error = %e, "skipping unreadable bibliography entry"),
    }
  }
  map
}

fn or_default(value: String, default: &str) -> String {
  if value.trim().is_empty() {
    default.to_owned()
  } else {
    value
  }
}

/// Map one legacy row onto a record, filling bibliography defaults.
///
/// The citekey falls back to the source; the bibliography entry is looked up
/// under that key. The link falls back to the entry's URL, then `Ref_link`.
pub fn map_row(row: &SheetRow, bib: &HashMap<String, BibEntry>) -> SourceRecord {
  let cell = |header: &str| normalize::whitespace(row.get(header));
  let source = cell("Source");
  let citekey = match cell("Citekey") {
    c if c.is_empty() => source.clone(),
    c => c,
  };

  let entry = bib.get(&citekey);
  let mut fields = entry.map(BibEntry::to_bib_fields).unwrap_or_default();
  fields.entry_type = or_default(fields.entry_type, DEFAULT_ENTRY_TYPE);
  fields.title = or_default(fields.title, &cell("Legend"));
  fields.author = or_default(fields.author, DEFAULT_AUTHOR);
  fields.year = or_default(fields.year, DEFAULT_YEAR);
  fields.keywords = or_default(fields.keywords, DEFAULT_KEYWORDS);
  fields.url = or_default(fields.url, &cell("Link"));

  let link = [cell("Link"), normalize::whitespace(&fields.url), cell("Ref_link")]
    .into_iter()
    .find(|v| !v.is_empty())
    .unwrap_or_default();

  SourceRecord {
    id: format!("src-{}", slugify(if source.is_empty() { &citekey } else { &source })),
    section: cell("Section"),
    aggsource: cell("AggSource"),
    legend: cell("Legend"),
    data_type: cell("Data_Type"),
    link,
    ref_link: cell("Ref_link"),
    inclusion_in_warehouse: cell("Inclusion_in_Warehouse"),
    multigeo_reference: cell("Multigeo_Reference"),
    metadata: cell("Metadata"),
    metadatalink: cell("Metadatalink"),
    review: ReviewNotes {
      qcommentsforta:       cell("QcommentsforTA"),
      tareply:              cell("TAreply"),
      tacomments:           cell("TAcomments"),
      arjcomments:          cell("ARJcomments"),
      arjreplies:           cell("ARJreplies"),
      seeaggsourcelisthere: cell("SeeAggSourcelisthere"),
    },
    bib: fields,
    source,
    citekey,
    ..Default::default()
  }
}

/// Map every row with a `Source` value. Ids that slug to the same value are
/// suffixed (`-2`, `-3`, …) so they stay unique.
pub fn import(
  rows: &[SheetRow],
  bibliography: Option<&str>,
  actor: &str,
  at: DateTime<Utc>,
) -> Vec<SourceRecord> {
  let bib = bibliography.map(index_bibliography).unwrap_or_default();
  let mut ids = HashSet::new();
  let mut records = Vec::new();
  for row in rows {
    if normalize::whitespace(row.get("Source")).is_empty() {
      continue;
    }
    let mut record = map_row(row, &bib);
    let base = record.id.clone();
    let mut n = 1;
    while !ids.insert(record.id.clone()) {
      n += 1;
      record.id = format!("{base}-{n}");
    }
    record.created_by = actor.to_owned();
    record.updated_by = actor.to_owned();
    record.created_at = Some(at);
    record.updated_at = Some(at);
    records.push(record);
  }
  debug!(rows = rows.len(), records = records.len(), "legacy rows mapped");
  records
}
