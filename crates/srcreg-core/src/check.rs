//! Validation outcomes: issues grouped into a per-category checklist.
//!
//! Every validation path (the non-mutating check and the pre-save check)
//! fills one [`Checklist`]. Issues are collected, never short-circuited, so a
//! caller always sees the full picture.

use std::fmt;

use serde::{Deserialize, Serialize, ser::SerializeStruct};

use crate::{
  alias::KeyField,
  schema::{Rule, Violation},
};

// ─── Categories ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckCategory {
  EditTarget,
  ChangeReason,
  Actor,
  RequiredFields,
  BibliographyFields,
  KeyConsistency,
  KeyRename,
  UrlFormat,
  YearFormat,
  Enumerations,
  DuplicateKey,
  DuplicateUrl,
  DuplicateTitleYear,
}

impl CheckCategory {
  /// Display order of the checklist panel.
  pub const ALL: [CheckCategory; 13] = [
    Self::EditTarget,
    Self::ChangeReason,
    Self::Actor,
    Self::RequiredFields,
    Self::BibliographyFields,
    Self::KeyConsistency,
    Self::KeyRename,
    Self::UrlFormat,
    Self::YearFormat,
    Self::Enumerations,
    Self::DuplicateKey,
    Self::DuplicateUrl,
    Self::DuplicateTitleYear,
  ];

  pub fn label(self) -> &'static str {
    match self {
      Self::EditTarget => "Edit target resolves",
      Self::ChangeReason => "Change reason provided",
      Self::Actor => "Editor name provided",
      Self::RequiredFields => "Required fields present",
      Self::BibliographyFields => "Bibliography fields present",
      Self::KeyConsistency => "Source and citekey agree",
      Self::KeyRename => "Key rename confirmed",
      Self::UrlFormat => "URL format",
      Self::YearFormat => "Year format",
      Self::Enumerations => "Allowed values",
      Self::DuplicateKey => "Unique source/citekey",
      Self::DuplicateUrl => "Unique URL",
      Self::DuplicateTitleYear => "Unique title and year",
    }
  }
}

// ─── Issues ──────────────────────────────────────────────────────────────────

/// One reason a candidate cannot be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Issue {
  SchemaViolation(Violation),
  DuplicateKey {
    field:       KeyField,
    key:         String,
    record_id:   String,
    existing_id: String,
  },
  DuplicateUrl {
    url:         String,
    record_id:   String,
    existing_id: String,
  },
  DuplicateTitleYear {
    title:       String,
    year:        String,
    record_id:   String,
    existing_id: String,
  },
  /// A key retired by a rename still resolves to a different live record.
  RetiredKey {
    key:         String,
    current_key: String,
    record_id:   String,
  },
  /// New records must carry identical `source` and `citekey`.
  KeyMismatch { source: String, citekey: String },
  UnresolvedTarget { target: String },
  RenameUnconfirmed { from: String, to: String },
  AliasConflict {
    old_key:  String,
    existing: String,
    proposed: String,
  },
}

impl Issue {
  pub fn category(&self) -> CheckCategory {
    match self {
      Self::SchemaViolation(v) => match (&v.rule, v.field.as_str()) {
        (Rule::Missing, "change_reason") => CheckCategory::ChangeReason,
        (Rule::Missing, "editor_name") => CheckCategory::Actor,
        (Rule::Missing, f) if f.starts_with("bib.") => {
          CheckCategory::BibliographyFields
        }
        (Rule::Missing, _) => CheckCategory::RequiredFields,
        (Rule::NotAUrl, _) => CheckCategory::UrlFormat,
        (Rule::NotAYear | Rule::YearOutOfRange { .. }, _) => {
          CheckCategory::YearFormat
        }
        (Rule::NotInEnumeration { .. } | Rule::UnknownField, _) => {
          CheckCategory::Enumerations
        }
      },
      Self::DuplicateKey { .. } | Self::RetiredKey { .. } => {
        CheckCategory::DuplicateKey
      }
      Self::DuplicateUrl { .. } => CheckCategory::DuplicateUrl,
      Self::DuplicateTitleYear { .. } => CheckCategory::DuplicateTitleYear,
      Self::KeyMismatch { .. } => CheckCategory::KeyConsistency,
      Self::UnresolvedTarget { .. } => CheckCategory::EditTarget,
      Self::RenameUnconfirmed { .. } | Self::AliasConflict { .. } => {
        CheckCategory::KeyRename
      }
    }
  }

  /// The record the issue was raised for, when it concerns one.
  pub fn record_id(&self) -> Option<&str> {
    match self {
      Self::DuplicateKey { record_id, .. }
      | Self::DuplicateUrl { record_id, .. }
      | Self::DuplicateTitleYear { record_id, .. }
      | Self::RetiredKey { record_id, .. } => Some(record_id),
      _ => None,
    }
  }

  /// The error kind name used in API payloads and CLI output.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::SchemaViolation(_)
      | Self::KeyMismatch { .. }
      | Self::UnresolvedTarget { .. }
      | Self::RenameUnconfirmed { .. } => "SchemaViolation",
      Self::DuplicateKey { .. } | Self::RetiredKey { .. } => "DuplicateKey",
      Self::DuplicateUrl { .. } => "DuplicateUrl",
      Self::DuplicateTitleYear { .. } => "DuplicateTitleYear",
      Self::AliasConflict { .. } => "AliasConflict",
    }
  }
}

impl fmt::Display for Issue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::SchemaViolation(v) => write!(f, "{v}"),
      Self::DuplicateKey {
        field,
        key,
        existing_id,
        ..
      } => write!(f, "{field} {key:?} is already used by record {existing_id}"),
      Self::DuplicateUrl { url, existing_id, .. } => {
        write!(f, "URL {url:?} is already used by record {existing_id}")
      }
      Self::DuplicateTitleYear {
        title,
        year,
        existing_id,
        ..
      } => write!(
        f,
        "title {title:?} ({year}) is already used by record {existing_id}"
      ),
      Self::RetiredKey {
        key, current_key, ..
      } => write!(
        f,
        "key {key:?} was renamed to {current_key:?} and cannot be reused"
      ),
      Self::KeyMismatch { source, citekey } => write!(
        f,
        "source {source:?} and citekey {citekey:?} must match for new records"
      ),
      Self::UnresolvedTarget { target } => {
        write!(f, "no existing record matches {target:?}")
      }
      Self::RenameUnconfirmed { from, to } => write!(
        f,
        "renaming {from:?} to {to:?} requires rename confirmation"
      ),
      Self::AliasConflict {
        old_key,
        existing,
        proposed,
      } => write!(
        f,
        "{old_key:?} already aliases {existing:?}, cannot alias {proposed:?}"
      ),
    }
  }
}

// ─── Checklist ───────────────────────────────────────────────────────────────

/// Pass/fail status of one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
  pub category: CheckCategory,
  pub label:    String,
  pub passed:   bool,
  pub detail:   String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Checklist {
  issues:   Vec<Issue>,
  warnings: Vec<String>,
}

impl Checklist {
  pub fn new() -> Self { Self::default() }

  pub fn push(&mut self, issue: Issue) {
    if !self.issues.contains(&issue) {
      self.issues.push(issue);
    }
  }

  pub fn extend(&mut self, issues: impl IntoIterator<Item = Issue>) {
    for issue in issues {
      self.push(issue);
    }
  }

  pub fn warn(&mut self, warning: impl Into<String>) {
    let warning = warning.into();
    if !self.warnings.contains(&warning) {
      self.warnings.push(warning);
    }
  }

  pub fn is_ok(&self) -> bool { self.issues.is_empty() }

  pub fn issues(&self) -> &[Issue] { &self.issues }

  pub fn warnings(&self) -> &[String] { &self.warnings }

  pub fn has(&self, category: CheckCategory) -> bool {
    self.issues.iter().any(|i| i.category() == category)
  }

  /// One entry per category, in display order.
  pub fn checks(&self) -> Vec<Check> {
    CheckCategory::ALL
      .iter()
      .map(|&category| {
        let messages: Vec<String> = self
          .issues
          .iter()
          .filter(|i| i.category() == category)
          .map(ToString::to_string)
          .collect();
        Check {
          category,
          label: category.label().to_owned(),
          passed: messages.is_empty(),
          detail: if messages.is_empty() {
            "ok".to_owned()
          } else {
            messages.join("; ")
          },
        }
      })
      .collect()
  }

  /// Distinct error kinds present, in first-seen order.
  pub fn kinds(&self) -> Vec<&'static str> {
    let mut kinds = Vec::new();
    for issue in &self.issues {
      let kind = issue.kind();
      if !kinds.contains(&kind) {
        kinds.push(kind);
      }
    }
    kinds
  }

  /// Short human-readable summary, e.g. for a popup or log line.
  pub fn summary(&self) -> String {
    if self.is_ok() {
      return "all checks passed".to_owned();
    }
    let failed: Vec<&str> = self
      .checks()
      .into_iter()
      .filter(|c| !c.passed)
      .map(|c| c.category.label())
      .collect();
    format!(
      "{} issue(s) in: {}",
      self.issues.len(),
      failed.join(", ")
    )
  }
}

impl Serialize for Checklist {
  fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
    let mut st = s.serialize_struct("Checklist", 5)?;
    st.serialize_field("ok", &self.is_ok())?;
    st.serialize_field("kinds", &self.kinds())?;
    st.serialize_field("checks", &self.checks())?;
    st.serialize_field("issues", &self.issues)?;
    st.serialize_field("warnings", &self.warnings)?;
    st.end()
  }
}
