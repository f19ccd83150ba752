//! Check-generated mode: regenerate the artifacts in memory and compare them
//! byte for byte with what is committed.
//!
//! When bytes differ, the difference is broken down per sheet row or
//! bibliography entry (keyed by citekey). If no row or entry differs, the
//! committed file only differs in formatting and a line diff is attached.

use std::{collections::BTreeMap, fmt};

use similar::TextDiff;
use srcreg_bibtex::BibEntry;
use srcreg_core::{
  normalize,
  store::{Document, RegistryStore, Storage},
};
use tracing::{info, warn};

use crate::{
  Error, Result,
  generate::{digest, render},
  sheet::{HEADERS, SheetRow, read_sheet},
};

// ─── Types ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Difference {
  /// The committed artifact does not exist.
  NotGenerated,
  /// A row or entry the registry renders is absent from the committed file.
  Missing { key: String },
  /// The committed file has a row or entry no record renders.
  Unexpected { key: String },
  /// A row or entry differs in the named columns or fields.
  Changed { key: String, fields: Vec<String> },
  Duplicate { key: String },
  Unreadable { reason: String },
  /// Same rows and entries, different bytes.
  Formatting { diff: String },
}

impl fmt::Display for Difference {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::NotGenerated => write!(f, "artifact has not been generated"),
      Self::Missing { key } => write!(f, "missing {key}"),
      Self::Unexpected { key } => write!(f, "unexpected {key}"),
      Self::Changed { key, fields } => {
        write!(f, "{key} differs in {}", fields.join(", "))
      }
      Self::Duplicate { key } => write!(f, "{key} appears more than once"),
      Self::Unreadable { reason } => write!(f, "unreadable: {reason}"),
      Self::Formatting { diff } => write!(f, "formatting differs:\n{diff}"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDrift {
  pub document:        Document,
  pub location:        String,
  pub expected_digest: String,
  /// `None` when the committed artifact is absent.
  pub actual_digest:   Option<String>,
  pub differences:     Vec<Difference>,
}

impl ArtifactDrift {
  pub fn summary(&self) -> String {
    format!(
      "{} ({}): {} difference(s)",
      self.document.label(),
      self.location,
      self.differences.len()
    )
  }
}

// ─── Comparison ──────────────────────────────────────────────────────────────

/// Compare a freshly rendered artifact with the committed text. Returns
/// `None` on an exact match.
pub fn diff_artifact(
  document: Document,
  location: String,
  expected: &str,
  committed: Option<&str>,
) -> Option<ArtifactDrift> {
  if committed == Some(expected) {
    return None;
  }
  let differences = match committed {
    None => vec![Difference::NotGenerated],
    Some(actual) => {
      let mut found = match document {
        Document::Sheet => compare_sheets(expected, actual),
        _ => compare_bibliographies(expected, actual),
      };
      if found.is_empty() {
        found.push(Difference::Formatting {
          diff: line_diff(expected, actual),
        });
      }
      found
    }
  };
  Some(ArtifactDrift {
    document,
    location,
    expected_digest: digest(expected),
    actual_digest: committed.map(digest),
    differences,
  })
}

/// Regenerate from `store` and compare with the committed sheet and
/// bibliography. Fails with [`Error::Drift`] listing every difference.
pub async fn check_generated<S: Storage>(store: &RegistryStore<S>) -> Result<()> {
  let expected = render(store.registry())?;
  let mut drifts = Vec::new();
  for (document, text) in expected.documents() {
    let committed = store.stored(document).await?;
    let location = store.storage().locate(document);
    if let Some(drift) = diff_artifact(document, location, text, committed.as_deref())
    {
      warn!(
        artifact = document.label(),
        differences = drift.differences.len(),
        "generated artifact drifted"
      );
      drifts.push(drift);
    }
  }
  if drifts.is_empty() {
    info!("generated artifacts match the registry");
    Ok(())
  } else {
    Err(Error::Drift(drifts))
  }
}

fn line_diff(expected: &str, actual: &str) -> String {
  TextDiff::from_lines(expected, actual)
    .unified_diff()
    .context_radius(2)
    .header("generated", "committed")
    .to_string()
}

fn compare_sheets(expected: &str, actual: &str) -> Vec<Difference> {
  let expected = match read_sheet(expected) {
    Ok(rows) => rows,
    Err(e) => {
      return vec![Difference::Unreadable {
        reason: format!("regenerated sheet: {e}"),
      }];
    }
  };
  let actual = match read_sheet(actual) {
    Ok(rows) => rows,
    Err(e) => {
      return vec![Difference::Unreadable {
        reason: e.to_string(),
      }];
    }
  };
  compare_keyed(
    expected.into_iter().map(|r| (r.key(), r)).collect(),
    actual.into_iter().map(|r| (r.key(), r)).collect(),
    |a: &SheetRow, b: &SheetRow| {
      HEADERS
        .iter()
        .filter(|h| a.get(h) != b.get(h))
        .map(|h| (*h).to_owned())
        .collect()
    },
  )
}

fn compare_bibliographies(expected: &str, actual: &str) -> Vec<Difference> {
  let mut out = Vec::new();
  let entries = |text: &str, out: &mut Vec<Difference>| -> Vec<(String, BibEntry)> {
    srcreg_bibtex::parse_many(text)
      .into_iter()
      .filter_map(|parsed| match parsed {
        Ok(entry) => Some((entry.key.clone(), entry)),
        Err(e) => {
          out.push(Difference::Unreadable {
            reason: e.to_string(),
          });
          None
        }
      })
      .collect()
  };
  let expected = entries(expected, &mut out);
  let actual = entries(actual, &mut out);
  out.extend(compare_keyed(expected, actual, changed_bib_fields));
  out
}

fn changed_bib_fields(a: &BibEntry, b: &BibEntry) -> Vec<String> {
  let fields = |e: &BibEntry| -> BTreeMap<String, String> {
    e.fields
      .iter()
      .map(|(n, v)| (n.clone(), normalize::whitespace(v)))
      .collect()
  };
  let (fa, fb) = (fields(a), fields(b));
  let mut changed = Vec::new();
  if a.entry_type != b.entry_type {
    changed.push("entry_type".to_owned());
  }
  let mut names: Vec<&String> = fa.keys().chain(fb.keys()).collect();
  names.sort();
  names.dedup();
  changed.extend(
    names
      .into_iter()
      .filter(|n| fa.get(*n) != fb.get(*n))
      .cloned(),
  );
  changed
}

/// Match rows or entries by key, case-insensitively.
fn compare_keyed<T>(
  expected: Vec<(String, T)>,
  actual: Vec<(String, T)>,
  changed: impl Fn(&T, &T) -> Vec<String>,
) -> Vec<Difference> {
  let mut out = Vec::new();

  let mut wanted: BTreeMap<String, (String, T)> = BTreeMap::new();
  for (key, item) in expected {
    wanted.entry(normalize::text(&key)).or_insert((key, item));
  }
  let mut found: BTreeMap<String, (String, T)> = BTreeMap::new();
  for (key, item) in actual {
    let norm = normalize::text(&key);
    if found.contains_key(&norm) {
      out.push(Difference::Duplicate { key });
    } else {
      found.insert(norm, (key, item));
    }
  }

  for (norm, (key, item)) in &wanted {
    match found.get(norm) {
      None => out.push(Difference::Missing { key: key.clone() }),
      Some((_, committed)) => {
        let fields = changed(item, committed);
        if !fields.is_empty() {
          out.push(Difference::Changed {
            key: key.clone(),
            fields,
          });
        }
      }
    }
  }
  for (norm, (key, _)) in &found {
    if !wanted.contains_key(norm) {
      out.push(Difference::Unexpected { key: key.clone() });
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use srcreg_core::{record::SourceRecord, schema::FieldSchema};
  use srcreg_store::MemoryStorage;

  use super::*;

  fn record(key: &str, title: &str) -> SourceRecord {
    let mut r = SourceRecord {
      id: format!("src-{key}"),
      section: "Wealth".into(),
      aggsource: "Survey".into(),
      legend: format!("{title} legend"),
      source: key.into(),
      citekey: key.into(),
      link: format!("https://example.org/{key}"),
      ..Default::default()
    };
    r.bib.entry_type = "techreport".into();
    r.bib.title = title.into();
    r.bib.author = "Smith, Jane".into();
    r.bib.year = "2020".into();
    r
  }

  async fn store_with_artifacts() -> (Arc<MemoryStorage>, RegistryStore<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let store = RegistryStore::bootstrap(
      Arc::clone(&storage),
      FieldSchema::default(),
      vec![record("Smith2020", "Wealth Taxes"), record("Jones2019", "Top Incomes")],
    )
    .unwrap();
    let artifacts = render(store.registry()).unwrap();
    storage.set(Document::Sheet, artifacts.sheet).await;
    storage.set(Document::Bibliography, artifacts.bibliography).await;
    (storage, store)
  }

  fn drifts(result: Result<()>) -> Vec<ArtifactDrift> {
    match result {
      Err(Error::Drift(drifts)) => drifts,
      other => panic!("expected drift, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn freshly_generated_artifacts_pass() {
    let (_, store) = store_with_artifacts().await;
    check_generated(&store).await.unwrap();
  }

  #[tokio::test]
  async fn hand_edited_entry_is_named() {
    let (storage, store) = store_with_artifacts().await;
    let bib = storage.get(Document::Bibliography).await.unwrap();
    storage
      .set(Document::Bibliography, bib.replace("Wealth Taxes", "Wealth Tax"))
      .await;

    let drifts = drifts(check_generated(&store).await);
    assert_eq!(drifts.len(), 1);
    assert_eq!(drifts[0].document, Document::Bibliography);
    assert_eq!(drifts[0].differences, vec![Difference::Changed {
      key:    "Smith2020".into(),
      fields: vec!["title".into()],
    }]);
    assert_ne!(Some(&drifts[0].expected_digest), drifts[0].actual_digest.as_ref());
  }

  #[tokio::test]
  async fn removed_sheet_row_is_missing() {
    let (storage, store) = store_with_artifacts().await;
    let only_one = crate::sheet::write_sheet(&[SheetRow::from_record(&record(
      "Jones2019",
      "Top Incomes",
    ))])
    .unwrap();
    storage.set(Document::Sheet, only_one).await;

    let drifts = drifts(check_generated(&store).await);
    assert_eq!(drifts[0].document, Document::Sheet);
    assert_eq!(drifts[0].differences, vec![Difference::Missing {
      key: "Smith2020".into(),
    }]);
  }

  #[test]
  fn absent_artifact_is_not_generated() {
    let drift = diff_artifact(Document::Sheet, "x".into(), "text", None).unwrap();
    assert_eq!(drift.differences, vec![Difference::NotGenerated]);
    assert_eq!(drift.actual_digest, None);
  }

  #[test]
  fn whitespace_only_change_reports_a_line_diff() {
    let expected = "@misc{A,\n  title = {T}\n}\n";
    let actual = "@misc{A,\n    title = {T}\n}\n";
    let drift =
      diff_artifact(Document::Bibliography, "x".into(), expected, Some(actual))
        .unwrap();
    match &drift.differences[..] {
      [Difference::Formatting { diff }] => assert!(diff.contains("+    title")),
      other => panic!("unexpected differences: {other:?}"),
    }
  }

  #[test]
  fn duplicate_and_unexpected_entries_are_reported() {
    let expected = "@misc{A,\n  title = {T}\n}\n";
    let actual = "@misc{A,\n  title = {T}\n}\n\n@misc{a,\n  title = {T}\n}\n\n@misc{B,\n  title = {U}\n}\n";
    let drift =
      diff_artifact(Document::Bibliography, "x".into(), expected, Some(actual))
        .unwrap();
    assert_eq!(drift.differences, vec![
      Difference::Duplicate { key: "a".into() },
      Difference::Unexpected { key: "B".into() },
    ]);
  }
}
