//! Append-only audit trail of intake, edit and delete operations.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  check::{Checklist, Issue},
  normalize,
  schema::Violation,
};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
  Add,
  Edit,
  Delete,
}

impl ChangeAction {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Add => "add",
      Self::Edit => "edit",
      Self::Delete => "delete",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
  pub action:      ChangeAction,
  pub record_id:   String,
  /// The record's key at the time of the action.
  pub key:         String,
  pub reason:      String,
  pub actor:       String,
  pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeDocument {
  #[serde(default)]
  pub changes: Vec<ChangeEntry>,
}

/// Entries can only be appended; there is no update or removal.
#[derive(Debug, Clone, Default)]
pub struct ChangeLog {
  entries: Vec<ChangeEntry>,
}

impl ChangeLog {
  pub fn new() -> Self { Self::default() }

  pub fn from_document(doc: ChangeDocument) -> Self {
    Self {
      entries: doc.changes,
    }
  }

  pub fn to_document(&self) -> ChangeDocument {
    ChangeDocument {
      changes: self.entries.clone(),
    }
  }

  pub fn entries(&self) -> &[ChangeEntry] { &self.entries }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }

  /// Append one entry. Edits without a reason are refused.
  pub fn record(&mut self, entry: ChangeEntry) -> Result<()> {
    if entry.action == ChangeAction::Edit
      && normalize::whitespace(&entry.reason).is_empty()
    {
      let mut checklist = Checklist::new();
      checklist.push(Issue::SchemaViolation(Violation::missing("change_reason")));
      return Err(Error::rejected(checklist));
    }
    self.entries.push(entry);
    Ok(())
  }

  /// Keys that were the subject of a delete action, lower-cased.
  pub fn deleted_keys(&self) -> Vec<String> {
    self
      .entries
      .iter()
      .filter(|e| e.action == ChangeAction::Delete)
      .map(|e| normalize::text(&e.key))
      .collect()
  }

  pub fn counts(&self) -> BTreeMap<ChangeAction, usize> {
    let mut counts = BTreeMap::new();
    for e in &self.entries {
      *counts.entry(e.action).or_insert(0) += 1;
    }
    counts
  }

  /// Problems in a loaded log: blank keys or actors, edits missing reasons.
  pub fn problems(&self) -> Vec<String> {
    self
      .entries
      .iter()
      .enumerate()
      .filter_map(|(i, e)| {
        let n = i + 1;
        if e.key.trim().is_empty() {
          Some(format!("change #{n} has no key"))
        } else if e.actor.trim().is_empty() {
          Some(format!("change #{n} ({}) has no actor", e.key))
        } else if e.action == ChangeAction::Edit && e.reason.trim().is_empty() {
          Some(format!("change #{n} edits {} without a reason", e.key))
        } else {
          None
        }
      })
      .collect()
  }
}
