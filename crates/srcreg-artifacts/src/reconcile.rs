//! Reconciliation report between the registry and the bibliography file.
//!
//! Nothing here is an error: divergent keys, duplicates and orphans are
//! surfaced for a human to resolve.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use srcreg_core::{
  changelog::{ChangeAction, ChangeEntry, ChangeLog},
  normalize,
  registry::Registry,
};

/// Items listed per category in the report.
pub const SAMPLE_LIMIT: usize = 30;

/// Latest change-log entries listed in the report.
const RECENT_CHANGES: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
  pub total:              usize,
  /// Sources of records with no citekey.
  pub missing_citekey:    Vec<String>,
  /// `(source, citekey)` of records where both are set and differ.
  pub divergent:          Vec<(String, String)>,
  pub duplicate_sources:  Vec<String>,
  /// Bibliography keys no record's citekey refers to, sorted.
  pub orphans:            Vec<String>,
  pub duplicate_bib_keys: Vec<String>,
  pub bib_errors:         Vec<String>,
  /// `false` when no bibliography file was available.
  pub bib_present:        bool,
  pub change_counts:      BTreeMap<ChangeAction, usize>,
  pub recent_changes:     Vec<ChangeEntry>,
}

/// Compare the registry with the bibliography text, if there is one.
pub fn reconcile(
  registry: &Registry,
  changes: &ChangeLog,
  bibliography: Option<&str>,
) -> Reconciliation {
  let records = registry.records();

  let missing_citekey = records
    .iter()
    .filter(|r| normalize::whitespace(&r.citekey).is_empty())
    .map(|r| normalize::whitespace(&r.source))
    .collect();

  let divergent = records
    .iter()
    .filter_map(|r| {
      let source = normalize::whitespace(&r.source);
      let citekey = normalize::whitespace(&r.citekey);
      (!source.is_empty() && !citekey.is_empty() && source != citekey)
        .then_some((source, citekey))
    })
    .collect();

  // Keyed by comparison text; the first raw spelling is shown.
  let mut source_counts: BTreeMap<String, (String, usize)> = BTreeMap::new();
  for r in records {
    let source = normalize::whitespace(&r.source);
    if !source.is_empty() {
      source_counts
        .entry(normalize::text(&source))
        .or_insert((source, 0))
        .1 += 1;
    }
  }
  let duplicate_sources = source_counts
    .into_values()
    .filter(|(_, n)| *n > 1)
    .map(|(s, _)| s)
    .collect();

  let citekeys: BTreeSet<String> = records
    .iter()
    .map(|r| normalize::whitespace(&r.citekey))
    .filter(|k| !k.is_empty())
    .collect();

  let mut orphans = BTreeSet::new();
  let mut bib_counts: HashMap<String, usize> = HashMap::new();
  let mut bib_errors = Vec::new();
  if let Some(text) = bibliography {
    for parsed in srcreg_bibtex::parse_many(text) {
      match parsed {
        Ok(entry) => {
          *bib_counts.entry(entry.key.clone()).or_insert(0) += 1;
          if !citekeys.contains(&entry.key) {
            orphans.insert(entry.key);
          }
        }
        Err(e) => bib_errors.push(e.to_string()),
      }
    }
  }
  let mut duplicate_bib_keys: Vec<String> = bib_counts
    .into_iter()
    .filter(|(_, n)| *n > 1)
    .map(|(k, _)| k)
    .collect();
  duplicate_bib_keys.sort();

  let recent_changes = changes
    .entries()
    .iter()
    .rev()
    .take(RECENT_CHANGES)
    .cloned()
    .collect();

  Reconciliation {
    total: records.len(),
    missing_citekey,
    divergent,
    duplicate_sources,
    orphans: orphans.into_iter().collect(),
    duplicate_bib_keys,
    bib_errors,
    bib_present: bibliography.is_some(),
    change_counts: changes.counts(),
    recent_changes,
  }
}

impl Reconciliation {
  /// Render the markdown report.
  pub fn to_markdown(&self) -> String {
    let mut lines = vec![
      "# Source Registry Reconciliation Report".to_owned(),
      String::new(),
      format!("- Total canonical records: {}", self.total),
      format!("- Records missing citekey: {}", self.missing_citekey.len()),
      format!("- Records where source != citekey: {}", self.divergent.len()),
      format!("- Duplicate source keys: {}", self.duplicate_sources.len()),
      format!(
        "- Orphan bib entries (not referenced by citekey): {}",
        self.orphans.len()
      ),
      format!("- Duplicate bib keys: {}", self.duplicate_bib_keys.len()),
    ];
    if !self.bib_present {
      lines.push("- Bibliography file: not found".to_owned());
    }
    if !self.bib_errors.is_empty() {
      lines.push(format!("- Unreadable bib entries: {}", self.bib_errors.len()));
    }

    if !self.duplicate_sources.is_empty() {
      section(&mut lines, "Duplicate Source Keys", &self.duplicate_sources, |s| {
        format!("- `{s}`")
      });
    }
    section(
      &mut lines,
      "Sample Mismatches (source != citekey)",
      &self.divergent,
      |(s, c)| format!("- `{s}` -> `{c}`"),
    );
    section(&mut lines, "Sample Missing Citekeys", &self.missing_citekey, |s| {
      format!("- `{s}`")
    });
    section(&mut lines, "Sample Orphan Bib Entries", &self.orphans, |k| {
      format!("- `{k}`")
    });
    if !self.duplicate_bib_keys.is_empty() {
      section(&mut lines, "Duplicate Bib Keys", &self.duplicate_bib_keys, |k| {
        format!("- `{k}`")
      });
    }
    if !self.bib_errors.is_empty() {
      section(&mut lines, "Unreadable Bib Entries", &self.bib_errors, |e| {
        format!("- {e}")
      });
    }

    lines.push(String::new());
    lines.push("## Change Log".to_owned());
    if self.change_counts.is_empty() {
      lines.push("- No recorded changes".to_owned());
    }
    for (action, n) in &self.change_counts {
      lines.push(format!("- {}: {n}", action.as_str()));
    }
    if !self.recent_changes.is_empty() {
      lines.push(String::new());
      lines.push("### Latest Changes".to_owned());
      for c in &self.recent_changes {
        let reason = if c.reason.trim().is_empty() {
          String::new()
        } else {
          format!(": {}", c.reason)
        };
        lines.push(format!(
          "- {} {} `{}` by {}{reason}",
          c.recorded_at.format("%Y-%m-%d %H:%M"),
          c.action.as_str(),
          c.key,
          c.actor
        ));
      }
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
  }
}

fn section<T>(
  lines: &mut Vec<String>,
  title: &str,
  items: &[T],
  line: impl Fn(&T) -> String,
) {
  lines.push(String::new());
  lines.push(format!("## {title}"));
  lines.extend(items.iter().take(SAMPLE_LIMIT).map(line));
  if items.len() > SAMPLE_LIMIT {
    lines.push(format!("- ({} more)", items.len() - SAMPLE_LIMIT));
  }
}
