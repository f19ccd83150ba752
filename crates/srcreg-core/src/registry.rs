//! The in-memory record collection and its identity invariants.
//!
//! Four values identify a source and must be unique across the collection:
//! `source`, `citekey`, the normalized URL and the normalized `(title, year)`
//! pair. Comparisons go through [`crate::normalize`], so keys differing only
//! in case or whitespace collide.

use std::{
  cmp::Ordering,
  collections::{BTreeMap, BTreeSet},
};

use similar::TextDiff;

use crate::{alias::KeyField, check::Issue, normalize, record::SourceRecord};

const TITLE_RATIO: f32 = 0.93;
const AUTHOR_RATIO: f32 = 0.92;
const URL_PATH_RATIO: f32 = 0.90;
const TITLE_BUCKET: usize = 12;

// ─── Identity ────────────────────────────────────────────────────────────────

/// Normalized identity values of one record. Empty strings never collide.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Identity {
  id:         String,
  source:     String,
  citekey:    String,
  url:        String,
  title_year: Option<(String, String)>,
}

impl Identity {
  fn of(record: &SourceRecord) -> Self {
    let title = normalize::text(&record.bib.title);
    let year = normalize::whitespace(&record.bib.year);
    Self {
      id:         normalize::text(&record.id),
      source:     normalize::text(&record.source),
      citekey:    normalize::text(&record.citekey),
      url:        normalize::url(record.url_candidate()),
      title_year: (!title.is_empty() && !year.is_empty())
        .then_some((title, year)),
    }
  }

  /// Issues raised by `candidate` (self) against an `existing` record.
  fn collisions(
    &self,
    candidate: &SourceRecord,
    other: &Identity,
    existing: &SourceRecord,
  ) -> Vec<Issue> {
    let mut out = Vec::new();
    let keys = [
      (KeyField::Source, &self.source, &other.source, &candidate.source),
      (KeyField::Citekey, &self.citekey, &other.citekey, &candidate.citekey),
    ];
    for (field, mine, theirs, raw) in keys {
      if !mine.is_empty() && (mine == theirs || *mine == other.id) {
        out.push(Issue::DuplicateKey {
          field,
          key: normalize::whitespace(raw),
          record_id: candidate.id.clone(),
          existing_id: existing.id.clone(),
        });
      }
    }
    if !self.url.is_empty() && self.url == other.url {
      out.push(Issue::DuplicateUrl {
        url:         self.url.clone(),
        record_id:   candidate.id.clone(),
        existing_id: existing.id.clone(),
      });
    }
    if let (Some(mine), Some(theirs)) = (&self.title_year, &other.title_year) {
      if mine == theirs {
        out.push(Issue::DuplicateTitleYear {
          title:       normalize::whitespace(&candidate.bib.title),
          year:        mine.1.clone(),
          record_id:   candidate.id.clone(),
          existing_id: existing.id.clone(),
        });
      }
    }
    out
  }
}

fn record_order(a: &SourceRecord, b: &SourceRecord) -> Ordering {
  normalize::text(&a.source)
    .cmp(&normalize::text(&b.source))
    .then_with(|| normalize::text(&a.citekey).cmp(&normalize::text(&b.citekey)))
    .then_with(|| a.id.cmp(&b.id))
}

fn ratio(a: &str, b: &str) -> f32 { TextDiff::from_chars(a, b).ratio() }

// ─── Registry ────────────────────────────────────────────────────────────────

/// The canonical collection, always kept in deterministic key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
  records: Vec<SourceRecord>,
}

impl Registry {
  pub fn new() -> Self { Self::default() }

  /// Build from records as given. Invariants are not checked here; see
  /// [`Registry::collection_issues`].
  pub fn from_records(mut records: Vec<SourceRecord>) -> Self {
    records.sort_by(record_order);
    Self { records }
  }

  pub fn records(&self) -> &[SourceRecord] { &self.records }

  pub fn into_records(self) -> Vec<SourceRecord> { self.records }

  pub fn len(&self) -> usize { self.records.len() }

  pub fn is_empty(&self) -> bool { self.records.is_empty() }

  pub fn get(&self, id: &str) -> Option<&SourceRecord> {
    self.records.iter().find(|r| r.id == id)
  }

  /// Find an active record by `source` or `citekey`, falling back to its
  /// id. Aliases are not consulted here.
  pub fn find_active(&self, key: &str) -> Option<&SourceRecord> {
    let key = normalize::whitespace(key);
    if key.is_empty() {
      return None;
    }
    let wanted = normalize::text(&key);
    self
      .records
      .iter()
      .find(|r| {
        normalize::text(&r.source) == wanted
          || normalize::text(&r.citekey) == wanted
      })
      .or_else(|| self.get(&key))
  }

  /// Identity collisions between `candidate` and every other record. The
  /// candidate's own prior state (same `id`) is excluded.
  pub fn identity_issues(&self, candidate: &SourceRecord) -> Vec<Issue> {
    let mine = Identity::of(candidate);
    self
      .records
      .iter()
      .filter(|r| r.id != candidate.id)
      .flat_map(|r| mine.collisions(candidate, &Identity::of(r), r))
      .collect()
  }

  /// Identity collisions inside the collection itself. Each later record is
  /// reported against the first record holding the value.
  pub fn collection_issues(&self) -> Vec<Issue> {
    let mut out = Vec::new();
    let mut seen: Vec<(Identity, &SourceRecord)> = Vec::new();
    for record in &self.records {
      let mine = Identity::of(record);
      for (theirs, existing) in &seen {
        out.extend(mine.collisions(record, theirs, existing));
      }
      seen.push((mine, record));
    }
    out
  }

  /// Near-duplicate warnings between `candidate` and the other records.
  pub fn near_duplicates(&self, candidate: &SourceRecord) -> Vec<String> {
    let others: Vec<&SourceRecord> =
      self.records.iter().filter(|r| r.id != candidate.id).collect();
    let mut out = Vec::new();
    for other in others {
      out.extend(fuzzy_pair(candidate, other));
    }
    out
  }

  /// Near-duplicate warnings across the whole collection. Titles are only
  /// compared within buckets sharing their first characters.
  pub fn fuzzy_warnings(&self) -> Vec<String> {
    let mut title_buckets: BTreeMap<String, Vec<(&SourceRecord, String)>> =
      BTreeMap::new();
    let mut year_buckets: BTreeMap<String, Vec<(&SourceRecord, String)>> =
      BTreeMap::new();
    let mut host_buckets: BTreeMap<String, Vec<(&SourceRecord, String)>> =
      BTreeMap::new();

    for r in &self.records {
      let title = normalize::text(&r.bib.title);
      if !title.is_empty() {
        let bucket: String = title.chars().take(TITLE_BUCKET).collect();
        title_buckets.entry(bucket).or_default().push((r, title));
      }
      let year = normalize::whitespace(&r.bib.year);
      let author = normalize::text(&r.bib.author);
      if !year.is_empty() && !author.is_empty() {
        year_buckets.entry(year).or_default().push((r, author));
      }
      let url = normalize::url(r.url_candidate());
      let (host, path) = normalize::split_url(&url);
      if !host.is_empty() {
        host_buckets
          .entry(host.to_owned())
          .or_default()
          .push((r, path.to_owned()));
      }
    }

    let mut out = Vec::new();
    let groups = [
      ("title", TITLE_RATIO, &title_buckets),
      ("author+year", AUTHOR_RATIO, &year_buckets),
      ("URL path", URL_PATH_RATIO, &host_buckets),
    ];
    for (what, threshold, buckets) in groups {
      for bucket in buckets.values() {
        for (i, (a, a_val)) in bucket.iter().enumerate() {
          for (b, b_val) in &bucket[i + 1..] {
            if a_val.is_empty() || b_val.is_empty() || a_val == b_val {
              continue;
            }
            let sim = ratio(a_val, b_val);
            if sim >= threshold {
              out.push(format!(
                "fuzzy {what} match ({sim:.2}): {} ~ {}",
                a.id, b.id
              ));
            }
          }
        }
      }
    }
    out.sort();
    out.dedup();
    out
  }

  /// Distinct non-blank values of `field`, sorted.
  pub fn distinct(&self, field: &str) -> Vec<String> {
    let values: BTreeSet<String> = self
      .records
      .iter()
      .filter_map(|r| r.field(field))
      .map(normalize::whitespace)
      .filter(|v| !v.is_empty())
      .collect();
    values.into_iter().collect()
  }

  /// Insert or replace by `id`, returning the replaced record.
  pub(crate) fn put(&mut self, record: SourceRecord) -> Option<SourceRecord> {
    let prior = match self.records.iter().position(|r| r.id == record.id) {
      Some(idx) => Some(std::mem::replace(&mut self.records[idx], record)),
      None => {
        self.records.push(record);
        None
      }
    };
    self.records.sort_by(record_order);
    prior
  }

  pub(crate) fn remove(&mut self, id: &str) -> Option<SourceRecord> {
    let idx = self.records.iter().position(|r| r.id == id)?;
    Some(self.records.remove(idx))
  }
}

/// Fuzzy comparisons between two specific records.
fn fuzzy_pair(a: &SourceRecord, b: &SourceRecord) -> Vec<String> {
  let mut out = Vec::new();

  let (at, bt) = (normalize::text(&a.bib.title), normalize::text(&b.bib.title));
  if !at.is_empty() && !bt.is_empty() && at != bt {
    let sim = ratio(&at, &bt);
    if sim >= TITLE_RATIO {
      out.push(format!("similar title ({sim:.2}) to record {}", b.id));
    }
  }

  let (ay, by) = (
    normalize::whitespace(&a.bib.year),
    normalize::whitespace(&b.bib.year),
  );
  let (aa, ba) = (normalize::text(&a.bib.author), normalize::text(&b.bib.author));
  if !ay.is_empty() && ay == by && !aa.is_empty() && !ba.is_empty() && aa != ba {
    let sim = ratio(&aa, &ba);
    if sim >= AUTHOR_RATIO {
      out.push(format!(
        "similar author in the same year ({sim:.2}) to record {}",
        b.id
      ));
    }
  }

  let (au, bu) = (
    normalize::url(a.url_candidate()),
    normalize::url(b.url_candidate()),
  );
  let ((ah, ap), (bh, bp)) = (normalize::split_url(&au), normalize::split_url(&bu));
  if !ah.is_empty() && ah == bh && !ap.is_empty() && !bp.is_empty() && ap != bp {
    let sim = ratio(ap, bp);
    if sim >= URL_PATH_RATIO {
      out.push(format!("similar URL ({sim:.2}) to record {}", b.id));
    }
  }

  out
}
