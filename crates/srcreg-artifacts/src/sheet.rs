//! The "Sources" sheet of the dictionary workbook.
//!
//! The workbook is written as XML Spreadsheet 2003 (a single XML document
//! that Excel and LibreOffice open directly). Generation uses `quick-xml`'s
//! writer; reading walks the event stream and only looks at the `Sources`
//! worksheet.

use std::{collections::BTreeMap, io::Cursor};

use quick_xml::{
  Writer,
  events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};
use srcreg_core::{normalize, record::SourceRecord};

use crate::{Error, Result};

// ─── Layout ──────────────────────────────────────────────────────────────────

pub const NS_SPREADSHEET: &str = "urn:schemas-microsoft-com:office:spreadsheet";

pub const SOURCES_SHEET: &str = "Sources";

/// Column headers in legacy order.
pub const HEADERS: [&str; 18] = [
  "Section",
  "AggSource",
  "Legend",
  "Source",
  "Data_Type",
  "Link",
  "Ref_link",
  "Citekey",
  "Inclusion_in_Warehouse",
  "Multigeo_Reference",
  "Metadata",
  "Metadatalink",
  "QcommentsforTA",
  "TAreply",
  "TAcomments",
  "ARJcomments",
  "ARJreplies",
  "SeeAggSourcelisthere",
];

/// Review columns. Always written blank.
pub const COMMENT_HEADERS: [&str; 6] = [
  "QcommentsforTA",
  "TAreply",
  "TAcomments",
  "ARJcomments",
  "ARJreplies",
  "SeeAggSourcelisthere",
];

/// Record field a column is filled from. Every header is its field name with
/// the case folded.
pub fn field_for(header: &str) -> String { header.to_ascii_lowercase() }

// ─── Rows ────────────────────────────────────────────────────────────────────

/// One data row, keyed by column header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetRow {
  values: BTreeMap<String, String>,
}

impl SheetRow {
  pub fn from_record(record: &SourceRecord) -> Self {
    let values = HEADERS
      .iter()
      .map(|header| {
        let value = if COMMENT_HEADERS.contains(header) {
          String::new()
        } else {
          record
            .field(&field_for(header))
            .map(normalize::whitespace)
            .unwrap_or_default()
        };
        ((*header).to_owned(), value)
      })
      .collect();
    Self { values }
  }

  pub fn get(&self, header: &str) -> &str {
    self.values.get(header).map(String::as_str).unwrap_or("")
  }

  pub fn set(&mut self, header: &str, value: impl Into<String>) {
    self.values.insert(header.to_owned(), value.into());
  }

  /// `Citekey`, or `Source` for legacy rows without one.
  pub fn key(&self) -> String {
    let citekey = normalize::whitespace(self.get("Citekey"));
    if citekey.is_empty() {
      normalize::whitespace(self.get("Source"))
    } else {
      citekey
    }
  }

  fn is_blank(&self) -> bool { self.values.values().all(|v| v.trim().is_empty()) }
}

// ─── Writing ─────────────────────────────────────────────────────────────────

struct SheetWriter {
  writer: Writer<Cursor<Vec<u8>>>,
}

impl SheetWriter {
  fn new() -> Self {
    Self {
      writer: Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 1),
    }
  }

  fn event(&mut self, event: Event<'_>) -> Result<()> {
    self
      .writer
      .write_event(event)
      .map_err(|e| Error::Xml(e.to_string()))
  }

  fn open(&mut self, tag: &str, attrs: &[(&str, &str)]) -> Result<()> {
    let mut start = BytesStart::new(tag);
    for attr in attrs {
      start.push_attribute(*attr);
    }
    self.event(Event::Start(start))
  }

  fn close(&mut self, tag: &str) -> Result<()> {
    self.event(Event::End(BytesEnd::new(tag)))
  }

  fn row<'a>(&mut self, values: impl IntoIterator<Item = &'a str>) -> Result<()> {
    self.open("Row", &[])?;
    for value in values {
      if value.is_empty() {
        self.event(Event::Empty(BytesStart::new("Cell")))?;
        continue;
      }
      self.open("Cell", &[])?;
      self.open("Data", &[("ss:Type", "String")])?;
      self.event(Event::Text(BytesText::new(value)))?;
      self.close("Data")?;
      self.close("Cell")?;
    }
    self.close("Row")
  }

  fn finish(self) -> Result<String> {
    let mut text = String::from_utf8(self.writer.into_inner().into_inner())
      .map_err(|e| Error::Xml(e.to_string()))?;
    text.push('\n');
    Ok(text)
  }
}

/// Render a workbook holding one `Sources` worksheet: a header row, then
/// `rows` in the order given.
pub fn write_sheet(rows: &[SheetRow]) -> Result<String> {
  let mut w = SheetWriter::new();
  w.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
  w.open("Workbook", &[
    ("xmlns", NS_SPREADSHEET),
    ("xmlns:ss", NS_SPREADSHEET),
  ])?;
  w.open("Worksheet", &[("ss:Name", SOURCES_SHEET)])?;
  w.open("Table", &[])?;
  w.row(HEADERS)?;
  for row in rows {
    w.row(HEADERS.iter().map(|h| row.get(h)))?;
  }
  w.close("Table")?;
  w.close("Worksheet")?;
  w.close("Workbook")?;
  w.finish()
}

// ─── Reading ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct SheetReader {
  in_sheet: bool,
  found:    bool,
  in_data:  bool,
  row:      Option<Vec<String>>,
  column:   usize,
  cell:     usize,
  rows:     Vec<Vec<String>>,
}

impl SheetReader {
  fn start(&mut self, e: &BytesStart<'_>, empty: bool) {
    let name = e.name();
    match local_name(name.as_ref()) {
      b"Worksheet" => {
        if attribute(e, b"Name").as_deref() == Some(SOURCES_SHEET) {
          self.in_sheet = !empty;
          self.found = true;
        }
      }
      b"Row" if self.in_sheet => {
        if empty {
          self.rows.push(Vec::new());
        } else {
          self.row = Some(Vec::new());
          self.column = 0;
        }
      }
      b"Cell" if self.in_sheet => {
        if let Some(index) = attribute(e, b"Index").and_then(|i| i.parse::<usize>().ok())
        {
          self.column = index.saturating_sub(1);
        }
        self.cell = self.column;
        self.column += 1;
        if let Some(row) = self.row.as_mut() {
          if row.len() <= self.cell {
            row.resize(self.cell + 1, String::new());
          }
        }
      }
      b"Data" if self.in_sheet && !empty => self.in_data = true,
      _ => {}
    }
  }

  fn end(&mut self, local: &[u8]) -> bool {
    match local {
      b"Data" => self.in_data = false,
      b"Row" if self.in_sheet => {
        if let Some(row) = self.row.take() {
          self.rows.push(row);
        }
      }
      b"Worksheet" if self.in_sheet => return true,
      _ => {}
    }
    false
  }

  fn text(&mut self, text: &str) {
    if !self.in_data {
      return;
    }
    if let Some(cell) = self.row.as_mut().and_then(|r| r.get_mut(self.cell)) {
      cell.push_str(text);
    }
  }
}

/// Read the data rows of the `Sources` worksheet.
///
/// Columns are named by the header row; a blank header cell falls back to
/// the legacy header for that position. Rows with no values are skipped.
pub fn read_sheet(xml: &str) -> Result<Vec<SheetRow>> {
  let mut reader = quick_xml::Reader::from_reader(xml.as_bytes());
  reader.config_mut().trim_text(true);

  let mut state = SheetReader::default();
  let mut buf = Vec::new();
  loop {
    match reader.read_event_into(&mut buf) {
      Ok(Event::Start(ref e)) => state.start(e, false),
      Ok(Event::Empty(ref e)) => state.start(e, true),
      Ok(Event::End(ref e)) => {
        let name = e.name();
        if state.end(local_name(name.as_ref())) {
          break;
        }
      }
      Ok(Event::Text(ref e)) => {
        let text = e.unescape().map_err(|e| Error::Xml(e.to_string()))?;
        state.text(&text);
      }
      Ok(Event::CData(e)) => {
        state.text(&String::from_utf8_lossy(&e.into_inner()));
      }
      Ok(Event::Eof) => break,
      Err(e) => return Err(Error::Xml(e.to_string())),
      _ => {}
    }
    buf.clear();
  }

  if !state.found {
    return Err(Error::MissingSheet(SOURCES_SHEET));
  }

  let mut raw = state.rows.into_iter();
  let header_row = raw.next().unwrap_or_default();
  let headers: Vec<String> = HEADERS
    .iter()
    .enumerate()
    .map(|(i, default)| {
      header_row
        .get(i)
        .map(|h| normalize::whitespace(h))
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| (*default).to_owned())
    })
    .collect();

  Ok(
    raw
      .map(|cells| {
        let mut row = SheetRow::default();
        for (i, header) in headers.iter().enumerate() {
          row.set(header, cells.get(i).cloned().unwrap_or_default());
        }
        row
      })
      .filter(|row| !row.is_blank())
      .collect(),
  )
}

fn local_name(name: &[u8]) -> &[u8] {
  match name.iter().rposition(|&b| b == b':') {
    Some(pos) => &name[pos + 1..],
    None => name,
  }
}

fn attribute(e: &BytesStart<'_>, local: &[u8]) -> Option<String> {
  e.attributes()
    .flatten()
    .find(|a| local_name(a.key.as_ref()) == local)
    .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}
