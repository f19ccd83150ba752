//! BibTeX entry scanner.
//!
//! Tolerant by design of hand-maintained files: text between entries is
//! ignored, `@comment`, `@string` and `@preamble` blocks are skipped, and a
//! field value may be braced, quoted or bare. All delimiters are ASCII, so
//! byte offsets found here are always valid `str` boundaries.

use crate::{
  BibEntry,
  error::{Error, Result},
};

const SKIPPED: &[&str] = &["comment", "string", "preamble"];

fn is_space(c: u8) -> bool { matches!(c, b' ' | b'\n' | b'\r' | b'\t') }

fn is_entry_type(s: &str) -> bool {
  !s.is_empty()
    && s
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Scan every entry in `input`. A malformed entry yields `Err` in its
/// position without hiding the entries after it; an unterminated entry ends
/// the scan.
pub(crate) fn scan(input: &str) -> Vec<Result<BibEntry>> {
  let bytes = input.as_bytes();
  let mut out = Vec::new();
  let mut i = 0;

  while let Some(rel) = input[i..].find('@') {
    let at = i + rel;
    let Some(rel_brace) = input[at..].find('{') else {
      break;
    };
    let brace = at + rel_brace;
    let entry_type = input[at + 1..brace].trim().to_lowercase();
    if !is_entry_type(&entry_type) {
      // A stray `@`, e.g. inside an address between entries.
      i = at + 1;
      continue;
    }

    let mut depth = 1usize;
    let mut j = brace + 1;
    while j < bytes.len() {
      match bytes[j] {
        b'{' => depth += 1,
        b'}' => {
          depth -= 1;
          if depth == 0 {
            break;
          }
        }
        _ => {}
      }
      j += 1;
    }
    if j >= bytes.len() {
      out.push(Err(Error::Unterminated(at)));
      break;
    }
    let body = &input[brace + 1..j];
    i = j + 1;

    if SKIPPED.contains(&entry_type.as_str()) {
      continue;
    }

    let key_and_fields = body
      .split_once(',')
      .map(|(key, blob)| (key.trim(), blob))
      .filter(|(key, _)| !key.is_empty());
    match key_and_fields {
      Some((key, blob)) => out.push(Ok(BibEntry {
        entry_type,
        key: key.to_owned(),
        fields: parse_fields(blob),
      })),
      None => out.push(Err(Error::MissingKey {
        entry_type,
        offset: at,
      })),
    }
  }
  out
}

/// Parse `name = value` pairs. Names are lower-cased; a repeated name keeps
/// its first position and the last value.
pub(crate) fn parse_fields(blob: &str) -> Vec<(String, String)> {
  let b = blob.as_bytes();
  let n = b.len();
  let mut p = 0;
  let mut fields: Vec<(String, String)> = Vec::new();

  while p < n {
    while p < n && (is_space(b[p]) || b[p] == b',') {
      p += 1;
    }
    if p >= n {
      break;
    }
    let Some(rel) = blob[p..].find('=') else {
      break;
    };
    let eq = p + rel;
    let name = blob[p..eq].trim().to_lowercase();
    p = eq + 1;
    while p < n && is_space(b[p]) {
      p += 1;
    }
    if p >= n {
      break;
    }

    let value = match b[p] {
      b'{' => {
        let mut depth = 1usize;
        p += 1;
        let start = p;
        while p < n && depth > 0 {
          match b[p] {
            b'{' => depth += 1,
            b'}' => depth -= 1,
            _ => {}
          }
          p += 1;
        }
        let end = if depth == 0 { p - 1 } else { p };
        &blob[start..end]
      }
      b'"' => {
        p += 1;
        let start = p;
        while p < n && b[p] != b'"' {
          if b[p] == b'\\' {
            p += 1;
          }
          p += 1;
        }
        let end = p.min(n);
        p = end + 1;
        &blob[start..end]
      }
      _ => {
        let start = p;
        while p < n && !matches!(b[p], b',' | b'\n' | b'\r') {
          p += 1;
        }
        &blob[start..p]
      }
    };

    if !name.is_empty() {
      let value = value.trim().to_owned();
      match fields.iter_mut().find(|(n, _)| *n == name) {
        Some(existing) => existing.1 = value,
        None => fields.push((name, value)),
      }
    }

    let from = p.min(n);
    let Some(rel) = blob[from..].find(',') else {
      break;
    };
    p = from + rel + 1;
  }
  fields
}
