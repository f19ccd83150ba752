//! Form submissions and how they become candidate records.

use serde::{Deserialize, Serialize};
use srcreg_core::{
  normalize,
  record::{BibFields, SourceRecord, USER_FIELDS},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
  #[default]
  Add,
  Edit,
}

/// Record fields as entered on the form. One key fills both `source` and
/// `citekey`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordForm {
  pub source_key:             String,
  pub section:                String,
  pub aggsource:              String,
  pub legend:                 String,
  pub data_type:              String,
  pub link:                   String,
  pub ref_link:               String,
  pub inclusion_in_warehouse: String,
  pub multigeo_reference:     String,
  pub metadata:               String,
  pub metadatalink:           String,
  pub bib:                    BibFields,
}

impl RecordForm {
  fn field(&self, name: &str) -> Option<&str> {
    Some(match name {
      "section" => &self.section,
      "aggsource" => &self.aggsource,
      "legend" => &self.legend,
      "data_type" => &self.data_type,
      "link" => &self.link,
      "ref_link" => &self.ref_link,
      "inclusion_in_warehouse" => &self.inclusion_in_warehouse,
      "multigeo_reference" => &self.multigeo_reference,
      "metadata" => &self.metadata,
      "metadatalink" => &self.metadatalink,
      _ => return None,
    })
  }
}

/// Body of `POST /api/check` and `POST /api/save`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Submission {
  pub mode:                 Mode,
  /// Key of the record being edited. Ignored when adding.
  pub target:               String,
  pub editor_name:          String,
  pub change_reason:        String,
  pub key_rename_confirmed: bool,
  pub record:               RecordForm,
}

/// Body of `POST /api/delete`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeleteRequest {
  pub target:        String,
  pub editor_name:   String,
  pub change_reason: String,
  pub confirmed:     bool,
}

impl Submission {
  pub fn actor(&self) -> String { normalize::whitespace(&self.editor_name) }

  pub fn reason(&self) -> String { normalize::whitespace(&self.change_reason) }

  pub fn key(&self) -> String { normalize::whitespace(&self.record.source_key) }

  /// A fresh record from the form. The single URL field is mirrored into
  /// `bib.url`; review notes start blank.
  pub fn new_record(&self) -> SourceRecord {
    let key = self.key();
    let mut record = SourceRecord {
      source: key.clone(),
      citekey: key,
      bib: self.record.bib.clone(),
      ..SourceRecord::default()
    };
    for name in USER_FIELDS {
      if let (Some(slot), Some(value)) =
        (record.field_mut(name), self.record.field(name))
      {
        *slot = value.to_owned();
      }
    }
    record.normalize_whitespace();
    if !record.link.is_empty() {
      record.bib.url = record.link.clone();
    }
    if record.bib.entry_type.is_empty() {
      record.bib.entry_type = "misc".to_owned();
    }
    record
  }

  /// `existing` with every non-blank submitted value applied.
  ///
  /// Submitting the record's current `source` or `citekey` leaves both keys
  /// as stored, so a legacy divergence is never rewritten. Any other key
  /// renames both fields.
  pub fn edited_record(&self, existing: &SourceRecord) -> SourceRecord {
    let mut record = existing.clone();
    for name in USER_FIELDS {
      let value = self.record.field(name).map(normalize::whitespace);
      if let (Some(slot), Some(value)) = (record.field_mut(name), value) {
        if !value.is_empty() {
          *slot = value;
        }
      }
    }
    for path in SourceRecord::editable_paths().filter(|p| p.starts_with("bib.")) {
      let name = &path["bib.".len()..];
      let value = self.record.bib.field(name).map(normalize::whitespace);
      if let (Some(slot), Some(value)) = (record.bib.field_mut(name), value) {
        if !value.is_empty() {
          *slot = value;
        }
      }
    }
    for (name, value) in &self.record.bib.extra_fields {
      let value = normalize::whitespace(value);
      if !value.is_empty() {
        record.bib.extra_fields.insert(name.clone(), value);
      }
    }

    let key = self.key();
    let current = [&existing.source, &existing.citekey]
      .iter()
      .any(|k| normalize::text(k) == normalize::text(&key));
    if !key.is_empty() && !current {
      record.source = key.clone();
      record.citekey = key;
    }
    record
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn form() -> RecordForm {
    let mut form = RecordForm {
      source_key: " Smith2020 ".into(),
      section: "Wealth".into(),
      legend: "Smith   survey".into(),
      link: "https://example.org/smith".into(),
      ..Default::default()
    };
    form.bib.title = "Wealth Taxes".into();
    form
  }

  #[test]
  fn new_record_takes_both_keys_from_one_field() {
    let sub = Submission {
      record: form(),
      ..Default::default()
    };
    let r = sub.new_record();
    assert_eq!(r.source, "Smith2020");
    assert_eq!(r.citekey, "Smith2020");
    assert_eq!(r.legend, "Smith survey");
    assert_eq!(r.bib.url, "https://example.org/smith");
    assert_eq!(r.bib.entry_type, "misc");
    assert!(r.id.is_empty());
  }

  #[test]
  fn edit_keeps_blank_fields_and_review_notes() {
    let mut existing = Submission {
      record: form(),
      ..Default::default()
    }
    .new_record();
    existing.id = "src-1".into();
    existing.aggsource = "Survey".into();
    existing.review.tareply = "ok".into();

    let sub = Submission {
      mode: Mode::Edit,
      record: RecordForm {
        source_key: "smith2020".into(),
        legend: "Updated".into(),
        ..Default::default()
      },
      ..Default::default()
    };
    let r = sub.edited_record(&existing);
    assert_eq!(r.id, "src-1");
    assert_eq!(r.legend, "Updated");
    assert_eq!(r.aggsource, "Survey");
    assert_eq!(r.review.tareply, "ok");
    assert_eq!(r.source, "Smith2020");
  }

  #[test]
  fn edit_with_new_key_renames_both_fields() {
    let existing = SourceRecord {
      source: "Jones".into(),
      citekey: "Jones2019".into(),
      ..Default::default()
    };
    let sub = Submission {
      record: RecordForm {
        source_key: "Jonesetal2019".into(),
        ..Default::default()
      },
      ..Default::default()
    };
    let r = sub.edited_record(&existing);
    assert_eq!((r.source.as_str(), r.citekey.as_str()), ("Jonesetal2019", "Jonesetal2019"));

    let same = Submission {
      record: RecordForm {
        source_key: "Jones2019".into(),
        ..Default::default()
      },
      ..Default::default()
    };
    let r = same.edited_record(&existing);
    assert_eq!((r.source.as_str(), r.citekey.as_str()), ("Jones", "Jones2019"));
  }
}
