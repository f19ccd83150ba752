//! Normalization used by every identity comparison.
//!
//! Two values collide when their normalized forms are equal, so these
//! functions define what "the same source" means across the registry.

use url::Url;

/// Trim and collapse internal runs of whitespace to a single space.
pub fn whitespace(value: &str) -> String {
  value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whitespace-collapsed and lower-cased.
pub fn text(value: &str) -> String { whitespace(value).to_lowercase() }

/// Normalize a URL for duplicate detection.
///
/// Scheme and fragment are dropped, host and path are lower-cased, repeated
/// slashes collapse, a trailing slash is removed and the query is kept.
/// Values that do not parse as URLs fall back to [`text`].
pub fn url(value: &str) -> String {
  let trimmed = whitespace(value);
  if trimmed.is_empty() {
    return String::new();
  }

  let candidate = if trimmed.contains("://") {
    trimmed.clone()
  } else {
    format!("https://{trimmed}")
  };

  let Ok(parsed) = Url::parse(&candidate) else {
    return trimmed.to_lowercase();
  };

  let mut out = String::new();
  out.push_str(parsed.host_str().unwrap_or_default());
  if let Some(port) = parsed.port() {
    out.push_str(&format!(":{port}"));
  }

  let mut prev_slash = false;
  for c in parsed.path().chars() {
    if c == '/' {
      if prev_slash {
        continue;
      }
      prev_slash = true;
    } else {
      prev_slash = false;
    }
    out.push(c);
  }
  while out.ends_with('/') {
    out.pop();
  }

  if let Some(query) = parsed.query() {
    out.push('?');
    out.push_str(query);
  }

  out.to_lowercase()
}

/// Split a normalized URL into `(host, path)`.
pub fn split_url(normalized: &str) -> (&str, &str) {
  match normalized.find('/') {
    Some(pos) => (&normalized[..pos], &normalized[pos..]),
    None => (normalized, ""),
  }
}
