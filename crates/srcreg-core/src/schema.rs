//! The field contract a record must satisfy to be persisted.
//!
//! [`FieldSchema::validate`] is pure: it looks at one record and reports
//! every violation. Identity rules that need the rest of the collection live
//! in [`crate::registry`].

use std::{
  collections::{BTreeMap, BTreeSet},
  fmt,
  sync::LazyLock,
};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
  normalize,
  record::{BIB_FIELDS, SourceRecord, USER_FIELDS},
};

static URL_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^https?://\S+$").unwrap());
static YEAR_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^\d{4}$").unwrap());
static DOI_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?i)^10\.\d{4,9}/[-._;()/:A-Z0-9]+$").unwrap()
});

// ─── Rules ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
  Url,
  Year,
  /// Checked, but a mismatch is only a warning.
  Doi,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
  Missing,
  NotAUrl,
  NotAYear,
  YearOutOfRange { min: u16, max: u16 },
  NotInEnumeration { allowed: Vec<String> },
  /// The schema names a field the record model does not have.
  UnknownField,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
  pub field: String,
  pub rule:  Rule,
}

impl Violation {
  pub fn missing(field: impl Into<String>) -> Self {
    Self {
      field: field.into(),
      rule:  Rule::Missing,
    }
  }
}

impl fmt::Display for Violation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let field = &self.field;
    match &self.rule {
      Rule::Missing => write!(f, "{field} is required"),
      Rule::NotAUrl => write!(f, "{field} must start with http:// or https://"),
      Rule::NotAYear => write!(f, "{field} must be a four-digit year"),
      Rule::YearOutOfRange { min, max } => {
        write!(f, "{field} must be between {min} and {max}")
      }
      Rule::NotInEnumeration { allowed } => {
        write!(f, "{field} must be one of: {}", allowed.join(", "))
      }
      Rule::UnknownField => write!(f, "{field} is not a record field"),
    }
  }
}

/// Result of validating one record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
  pub violations: Vec<Violation>,
  pub warnings:   Vec<String>,
}

impl Validation {
  pub fn is_valid(&self) -> bool { self.violations.is_empty() }
}

// ─── Schema ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldSchema {
  pub required:    Vec<String>,
  pub formats:     BTreeMap<String, Format>,
  pub enums:       BTreeMap<String, Vec<String>>,
  /// Missing values produce a warning rather than a violation.
  pub recommended: Vec<String>,
  pub min_year:    u16,
  pub max_year:    u16,
}

const ENTRY_TYPES: &[&str] = &[
  "article",
  "book",
  "booklet",
  "dataset",
  "inbook",
  "incollection",
  "inproceedings",
  "manual",
  "mastersthesis",
  "misc",
  "online",
  "phdthesis",
  "proceedings",
  "report",
  "techreport",
  "unpublished",
];

impl Default for FieldSchema {
  fn default() -> Self {
    let required = [
      "section",
      "aggsource",
      "legend",
      "source",
      "citekey",
      "link",
      "bib.entry_type",
      "bib.title",
      "bib.author",
      "bib.year",
    ];
    let formats = [
      ("link", Format::Url),
      ("ref_link", Format::Url),
      ("bib.url", Format::Url),
      ("bib.year", Format::Year),
      ("bib.doi", Format::Doi),
    ];
    Self {
      required:    required.iter().map(|s| (*s).to_owned()).collect(),
      formats:     formats
        .iter()
        .map(|(k, v)| ((*k).to_owned(), *v))
        .collect(),
      enums:       BTreeMap::from([(
        "bib.entry_type".to_owned(),
        ENTRY_TYPES.iter().map(|s| (*s).to_owned()).collect(),
      )]),
      recommended: vec!["bib.keywords".to_owned()],
      min_year:    1600,
      max_year:    2100,
    }
  }
}

impl FieldSchema {
  /// Parse a schema document. Fields left out keep their defaults.
  pub fn from_json(text: &str) -> crate::Result<Self> {
    Ok(serde_json::from_str(text)?)
  }

  /// Every field path known to the record model.
  pub fn known_fields() -> BTreeSet<String> {
    USER_FIELDS
      .iter()
      .map(|f| (*f).to_owned())
      .chain(BIB_FIELDS.iter().map(|f| format!("bib.{f}")))
      .collect()
  }

  /// Check one record against the contract. Every violation is reported.
  pub fn validate(&self, record: &SourceRecord) -> Validation {
    let mut out = Validation::default();
    let value = |field: &str| record.field(field).map(normalize::whitespace);

    for field in &self.required {
      match value(field) {
        None => out.violations.push(Violation {
          field: field.clone(),
          rule:  Rule::UnknownField,
        }),
        Some(v) if v.is_empty() => {
          out.violations.push(Violation::missing(field.clone()))
        }
        Some(_) => {}
      }
    }

    for (field, format) in &self.formats {
      let Some(v) = value(field) else {
        out.violations.push(Violation {
          field: field.clone(),
          rule:  Rule::UnknownField,
        });
        continue;
      };
      if v.is_empty() {
        continue;
      }
      match format {
        Format::Url if !URL_RE.is_match(&v) => out.violations.push(Violation {
          field: field.clone(),
          rule:  Rule::NotAUrl,
        }),
        Format::Year if !YEAR_RE.is_match(&v) => {
          out.violations.push(Violation {
            field: field.clone(),
            rule:  Rule::NotAYear,
          })
        }
        Format::Year => {
          let in_range = v
            .parse::<u16>()
            .is_ok_and(|y| (self.min_year..=self.max_year).contains(&y));
          if !in_range {
            out.violations.push(Violation {
              field: field.clone(),
              rule:  Rule::YearOutOfRange {
                min: self.min_year,
                max: self.max_year,
              },
            });
          }
        }
        Format::Doi if !DOI_RE.is_match(&v) => {
          out.warnings.push(format!("{field} {v:?} does not look like a DOI"))
        }
        _ => {}
      }
    }

    for (field, allowed) in &self.enums {
      let Some(v) = value(field) else {
        out.violations.push(Violation {
          field: field.clone(),
          rule:  Rule::UnknownField,
        });
        continue;
      };
      if v.is_empty() {
        continue;
      }
      if !allowed.iter().any(|a| a.eq_ignore_ascii_case(&v)) {
        out.violations.push(Violation {
          field: field.clone(),
          rule:  Rule::NotInEnumeration {
            allowed: allowed.clone(),
          },
        });
      }
    }

    for field in &self.recommended {
      if value(field).is_some_and(|v| v.is_empty()) {
        out.warnings.push(format!("{field} is empty"));
      }
    }

    out
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn valid() -> SourceRecord {
    let mut r = SourceRecord {
      id: "src-1".into(),
      section: "Wealth".into(),
      aggsource: "Smith".into(),
      legend: "Smith (2020)".into(),
      source: "Smith2020".into(),
      citekey: "Smith2020".into(),
      link: "https://example.org/smith".into(),
      ..Default::default()
    };
    r.bib.entry_type = "article".into();
    r.bib.title = "Wealth Taxes".into();
    r.bib.author = "Smith, Jane".into();
    r.bib.year = "2020".into();
    r.bib.keywords = "Wealth".into();
    r
  }

  #[test]
  fn complete_record_is_valid() {
    let v = FieldSchema::default().validate(&valid());
    assert!(v.is_valid(), "{:?}", v.violations);
    assert!(v.warnings.is_empty());
  }

  #[test]
  fn every_missing_field_is_reported() {
    let mut r = valid();
    r.legend.clear();
    r.bib.author = "   ".into();
    let v = FieldSchema::default().validate(&r);
    assert_eq!(v.violations, vec![
      Violation::missing("legend"),
      Violation::missing("bib.author"),
    ]);
  }

  #[test]
  fn formats_are_enforced() {
    let mut r = valid();
    r.link = "example.org/smith".into();
    r.bib.year = "20x0".into();
    let v = FieldSchema::default().validate(&r);
    let rules: Vec<_> = v.violations.iter().map(|v| &v.rule).collect();
    assert!(rules.contains(&&Rule::NotAUrl));
    assert!(rules.contains(&&Rule::NotAYear));
  }

  #[test]
  fn year_range_is_enforced() {
    let mut r = valid();
    r.bib.year = "1500".into();
    let v = FieldSchema::default().validate(&r);
    assert_eq!(v.violations.len(), 1);
    assert!(matches!(v.violations[0].rule, Rule::YearOutOfRange { .. }));
  }

  #[test]
  fn entry_type_outside_enumeration_is_rejected() {
    let mut r = valid();
    r.bib.entry_type = "podcast".into();
    let v = FieldSchema::default().validate(&r);
    assert!(matches!(
      v.violations[0].rule,
      Rule::NotInEnumeration { .. }
    ));
  }

  #[test]
  fn odd_doi_and_missing_keywords_only_warn() {
    let mut r = valid();
    r.bib.doi = "doi:abc".into();
    r.bib.keywords.clear();
    let v = FieldSchema::default().validate(&r);
    assert!(v.is_valid());
    assert_eq!(v.warnings.len(), 2);
  }

  #[test]
  fn schema_document_overrides_required_fields() {
    let schema =
      FieldSchema::from_json(r#"{"required": ["source", "bib.volume"]}"#)
        .unwrap();
    assert_eq!(schema.max_year, 2100);
    let v = schema.validate(&valid());
    assert_eq!(v.violations, vec![Violation::missing("bib.volume")]);
  }

  #[test]
  fn unknown_schema_field_is_reported() {
    let schema =
      FieldSchema::from_json(r#"{"required": ["bib.colour"]}"#).unwrap();
    let v = schema.validate(&valid());
    assert_eq!(v.violations[0].rule, Rule::UnknownField);
  }
}
