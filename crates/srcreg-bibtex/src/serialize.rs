//! Deterministic BibTeX rendering.
//!
//! Output depends only on the input: fields in a fixed order, extra fields
//! sorted by name, blank values omitted, entries separated by a blank line.

use srcreg_core::{
  normalize,
  record::{BIB_FIELDS, BibFields, SourceRecord},
};

fn braced(value: &str) -> String { format!("{{{value}}}") }

/// Render one entry keyed by `key`.
pub(crate) fn render_entry(key: &str, bib: &BibFields) -> String {
  let entry_type = match normalize::whitespace(&bib.entry_type).to_lowercase() {
    t if t.is_empty() => "misc".to_owned(),
    t => t,
  };

  let mut fields: Vec<(&str, String)> = BIB_FIELDS
    .iter()
    .filter(|name| **name != "entry_type")
    .filter_map(|name| {
      let value = normalize::whitespace(bib.field(name)?);
      (!value.is_empty()).then_some((*name, value))
    })
    .collect();
  fields.extend(bib.extra_fields.iter().filter_map(|(name, value)| {
    let value = normalize::whitespace(value);
    (!value.is_empty()).then_some((name.as_str(), value))
  }));

  let mut lines = vec![format!("@{entry_type}{{{key},")];
  let last = fields.len().saturating_sub(1);
  for (idx, (name, value)) in fields.iter().enumerate() {
    let tail = if idx == last { "" } else { "," };
    lines.push(format!("  {name} = {}{tail}", braced(value)));
  }
  lines.push("}".to_owned());
  lines.join("\n")
}

/// Render a record under its bibliography key, or `None` if it has none.
pub(crate) fn render_record(record: &SourceRecord) -> Option<String> {
  let key = record.bib_key();
  (!key.is_empty()).then(|| render_entry(&key, &record.bib))
}

/// Render a whole collection in the order given.
pub(crate) fn render_all<'a>(
  records: impl IntoIterator<Item = &'a SourceRecord>,
) -> String {
  let entries: Vec<String> =
    records.into_iter().filter_map(render_record).collect();
  let mut out = entries.join("\n\n").trim().to_owned();
  out.push('\n');
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  fn record() -> SourceRecord {
    let mut r = SourceRecord {
      source: "Smith2020".into(),
      citekey: "Smith2020".into(),
      ..Default::default()
    };
    r.bib.entry_type = "Article".into();
    r.bib.title = "Wealth  Taxes".into();
    r.bib.year = "2020".into();
    r.bib.keywords = "Wealth".into();
    r.bib.extra_fields.insert("zz".into(), "last".into());
    r.bib.extra_fields.insert("series".into(), "WP".into());
    r
  }

  #[test]
  fn entry_layout_is_fixed() {
    let text = render_record(&record()).unwrap();
    assert_eq!(
      text,
      "@article{Smith2020,\n  title = {Wealth Taxes},\n  year = {2020},\n  keywords = {Wealth},\n  series = {WP},\n  zz = {last}\n}"
    );
  }

  #[test]
  fn missing_type_defaults_to_misc() {
    let mut r = record();
    r.bib = BibFields::default();
    assert_eq!(render_record(&r).unwrap(), "@misc{Smith2020,\n}");
  }

  #[test]
  fn records_without_key_are_skipped() {
    let mut r = record();
    r.source.clear();
    r.citekey.clear();
    assert!(render_record(&r).is_none());
  }

  #[test]
  fn collection_is_blank_line_separated_with_trailing_newline() {
    let mut other = record();
    other.citekey = "Jones2019".into();
    let text = render_all([&record(), &other]);
    assert!(text.contains("}\n\n@article{Jones2019,"));
    assert!(text.ends_with("}\n"));
    assert_eq!(render_all(&Vec::<SourceRecord>::new()), "\n");
  }

  #[test]
  fn rendering_is_repeatable() {
    let records = vec![record()];
    assert_eq!(render_all(&records), render_all(&records));
  }
}
