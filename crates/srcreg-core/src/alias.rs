//! The alias ledger: an append-only history of key renames.

use std::{collections::HashSet, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, normalize};

/// Which key column a rename touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyField {
  Source,
  Citekey,
}

impl fmt::Display for KeyField {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Source => "source",
      Self::Citekey => "citekey",
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasEntry {
  pub field:      KeyField,
  pub old_key:    String,
  pub new_key:    String,
  pub reason:     String,
  pub actor:      String,
  pub renamed_at: DateTime<Utc>,
}

/// On-disk shape of the alias file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasDocument {
  #[serde(default)]
  pub aliases: Vec<AliasEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct AliasLedger {
  entries: Vec<AliasEntry>,
}

impl AliasLedger {
  pub fn new() -> Self { Self::default() }

  pub fn from_document(doc: AliasDocument) -> Self {
    Self {
      entries: doc.aliases,
    }
  }

  pub fn to_document(&self) -> AliasDocument {
    AliasDocument {
      aliases: self.entries.clone(),
    }
  }

  pub fn entries(&self) -> &[AliasEntry] { &self.entries }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }

  /// Where `old_key` points now, if it is retired.
  ///
  /// The most recent entry for the key wins. Any later rename onto the key
  /// (`A -> B -> C -> A`, or another record taking it over) restores it.
  pub fn target(&self, old_key: &str) -> Option<&str> {
    let wanted = normalize::text(old_key);
    let (idx, entry) = self
      .entries
      .iter()
      .enumerate()
      .rev()
      .find(|(_, e)| normalize::text(&e.old_key) == wanted)?;
    let restored = self.entries[idx + 1..]
      .iter()
      .any(|later| normalize::text(&later.new_key) == wanted);
    (!restored).then_some(entry.new_key.as_str())
  }

  /// Whether `key` was ever renamed away.
  pub fn is_retired(&self, key: &str) -> bool { self.target(key).is_some() }

  /// Follow renames from `key` until `stop` accepts a key or the chain ends.
  ///
  /// Returns `key` itself when no alias exists. Fails with
  /// [`Error::AliasCycle`] if a key repeats.
  pub fn resolve_until(
    &self,
    key: &str,
    mut stop: impl FnMut(&str) -> bool,
  ) -> Result<String> {
    let mut current = normalize::whitespace(key);
    let mut seen = HashSet::from([normalize::text(&current)]);
    let mut chain = vec![current.clone()];

    while !stop(&current) {
      let Some(next) = self.target(&current) else {
        break;
      };
      let next = next.to_owned();
      chain.push(next.clone());
      if !seen.insert(normalize::text(&next)) {
        return Err(Error::AliasCycle(chain));
      }
      current = next;
    }
    Ok(current)
  }

  /// The final key after following every recorded rename.
  pub fn resolve(&self, key: &str) -> Result<String> {
    self.resolve_until(key, |_| false)
  }

  /// Check whether `old_key -> new_key` may be appended without writing it.
  ///
  /// `Ok(false)` means the entry would be a no-op: identical keys, a blank
  /// side, or a repeat of the mapping already in force.
  pub fn can_record(&self, old_key: &str, new_key: &str) -> Result<bool> {
    let old = normalize::whitespace(old_key);
    let new = normalize::whitespace(new_key);
    if old.is_empty()
      || new.is_empty()
      || normalize::text(&old) == normalize::text(&new)
    {
      return Ok(false);
    }
    match self.target(&old) {
      Some(existing) if normalize::text(existing) == normalize::text(&new) => {
        Ok(false)
      }
      Some(existing) => Err(Error::AliasConflict {
        old_key:  old,
        existing: existing.to_owned(),
        proposed: new,
      }),
      _ => Ok(true),
    }
  }

  /// Append a rename. Returns whether an entry was actually written.
  pub fn record(&mut self, entry: AliasEntry) -> Result<bool> {
    if !self.can_record(&entry.old_key, &entry.new_key)? {
      return Ok(false);
    }
    let mut entry = entry;
    entry.old_key = normalize::whitespace(&entry.old_key);
    entry.new_key = normalize::whitespace(&entry.new_key);
    self.entries.push(entry);
    Ok(true)
  }

  /// Structural problems: blank keys, self-aliases and cycles.
  pub fn problems(&self) -> Vec<String> {
    let mut out = Vec::new();
    for (i, e) in self.entries.iter().enumerate() {
      if e.old_key.trim().is_empty() || e.new_key.trim().is_empty() {
        out.push(format!("alias #{} has a blank key", i + 1));
      } else if normalize::text(&e.old_key) == normalize::text(&e.new_key) {
        out.push(format!("alias #{} maps {:?} to itself", i + 1, e.old_key));
      }
    }
    let mut reported = HashSet::new();
    for e in &self.entries {
      if let Err(Error::AliasCycle(chain)) = self.resolve(&e.old_key) {
        let mut key: Vec<String> =
          chain.iter().map(|k| normalize::text(k)).collect();
        key.sort();
        key.dedup();
        if reported.insert(key) {
          out.push(format!("alias cycle: {}", chain.join(" -> ")));
        }
      }
    }
    out
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entry(old: &str, new: &str) -> AliasEntry {
    AliasEntry {
      field:      KeyField::Citekey,
      old_key:    old.into(),
      new_key:    new.into(),
      reason:     "rename".into(),
      actor:      "tester".into(),
      renamed_at: Utc::now(),
    }
  }

  #[test]
  fn resolve_follows_chains() {
    let mut ledger = AliasLedger::new();
    assert!(ledger.record(entry("A", "B")).unwrap());
    assert!(ledger.record(entry("B", "C")).unwrap());
    assert_eq!(ledger.resolve("A").unwrap(), "C");
    assert_eq!(ledger.resolve("b").unwrap(), "C");
    assert_eq!(ledger.resolve("Z").unwrap(), "Z");
  }

  #[test]
  fn repeated_identical_rename_is_idempotent() {
    let mut ledger = AliasLedger::new();
    assert!(ledger.record(entry("Jones2019", "Jonesetal2019")).unwrap());
    assert!(!ledger.record(entry("Jones2019", "Jonesetal2019")).unwrap());
    assert_eq!(ledger.entries().len(), 1);
  }

  #[test]
  fn conflicting_target_is_rejected() {
    let mut ledger = AliasLedger::new();
    ledger.record(entry("A", "B")).unwrap();
    let err = ledger.record(entry("A", "C")).unwrap_err();
    assert!(matches!(err, Error::AliasConflict { .. }));
    assert_eq!(ledger.entries().len(), 1);
  }

  #[test]
  fn renaming_back_is_allowed() {
    let mut ledger = AliasLedger::new();
    ledger.record(entry("A", "B")).unwrap();
    assert!(ledger.record(entry("B", "A")).unwrap());
    assert_eq!(ledger.resolve("A").unwrap(), "A");
    assert_eq!(ledger.resolve("B").unwrap(), "A");
    assert!(ledger.problems().is_empty());
    assert!(ledger.record(entry("A", "C")).unwrap());
    assert_eq!(ledger.resolve("B").unwrap(), "C");
  }

  #[test]
  fn closing_a_longer_loop_restores_the_first_key() {
    let mut ledger = AliasLedger::new();
    assert!(ledger.record(entry("A", "B")).unwrap());
    assert!(ledger.record(entry("B", "C")).unwrap());
    assert!(ledger.record(entry("C", "A")).unwrap());
    assert!(!ledger.is_retired("A"));
    assert_eq!(ledger.resolve("A").unwrap(), "A");
    assert_eq!(ledger.resolve("B").unwrap(), "A");
    assert_eq!(ledger.resolve("C").unwrap(), "A");
    assert!(ledger.problems().is_empty());
  }

  #[test]
  fn key_taken_over_by_another_rename_is_live_again() {
    let mut ledger = AliasLedger::new();
    ledger.record(entry("A", "B")).unwrap();
    ledger.record(entry("X", "A")).unwrap();
    assert_eq!(ledger.resolve("A").unwrap(), "A");
    assert_eq!(ledger.resolve("X").unwrap(), "A");
    assert_eq!(ledger.resolve("B").unwrap(), "B");
  }

  #[test]
  fn blank_entries_are_reported() {
    let ledger = AliasLedger::from_document(AliasDocument {
      aliases: vec![entry("A", " "), entry("B", "b")],
    });
    assert_eq!(ledger.problems().len(), 2);
  }

  #[test]
  fn resolve_until_stops_at_live_key() {
    let mut ledger = AliasLedger::new();
    ledger.record(entry("A", "B")).unwrap();
    ledger.record(entry("B", "C")).unwrap();
    assert_eq!(ledger.resolve_until("A", |k| k == "B").unwrap(), "B");
  }

  #[test]
  fn blank_and_self_aliases_are_noops() {
    let mut ledger = AliasLedger::new();
    assert!(!ledger.record(entry("A", "A")).unwrap());
    assert!(!ledger.record(entry("", "A")).unwrap());
    assert!(ledger.is_empty());
  }
}
