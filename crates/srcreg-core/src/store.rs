//! The `Storage` trait and the [`RegistryStore`] built on top of it.
//!
//! Backends (e.g. `srcreg-store`) only move document text in and out. All
//! parsing, validation and identity checking happens here, so a file-backed
//! store and an in-memory test fixture behave identically.

use std::{future::Future, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
  Error, Result,
  alias::{AliasEntry, AliasLedger, KeyField},
  changelog::{ChangeEntry, ChangeLog},
  check::{Checklist, Issue},
  normalize,
  record::{SourceRecord, new_record_id},
  registry::Registry,
  schema::FieldSchema,
};

/// Current version of the registry document.
pub const REGISTRY_VERSION: u32 = 1;

// ─── Documents ───────────────────────────────────────────────────────────────

/// Every persistence target the registry knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Document {
  Registry,
  Aliases,
  ChangeLog,
  Schema,
  Sheet,
  Bibliography,
  Report,
}

impl Document {
  pub fn label(self) -> &'static str {
    match self {
      Self::Registry => "registry",
      Self::Aliases => "aliases",
      Self::ChangeLog => "change log",
      Self::Schema => "schema",
      Self::Sheet => "dictionary sheet",
      Self::Bibliography => "bibliography",
      Self::Report => "reconciliation report",
    }
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over where registry documents live.
///
/// All methods return `Send` futures so the trait can be used from a
/// multi-threaded runtime behind `axum`.
pub trait Storage: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Read a document. Returns `None` if it does not exist yet.
  fn read(
    &self,
    doc: Document,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + '_;

  /// Replace a document's contents.
  fn write(
    &self,
    doc: Document,
    contents: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Human-readable location, used in errors and save reports.
  fn locate(&self, doc: Document) -> String;
}

// ─── Persisted shape ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryDocument {
  pub version: u32,
  pub records: Vec<SourceRecord>,
}

fn pretty<T: Serialize>(value: &T) -> Result<String> {
  let mut out = serde_json::to_string_pretty(value)?;
  out.push('\n');
  Ok(out)
}

/// Problems that make a collection unfit to persist: bad ids, schema
/// violations and identity collisions. Each line names the record.
pub fn audit(registry: &Registry, schema: &FieldSchema) -> Vec<String> {
  let mut out = Vec::new();
  let mut ids = std::collections::HashSet::new();
  for record in registry.records() {
    let label = format!("{} ({})", record.id, record.bib_key());
    if record.id.trim().is_empty() {
      out.push(format!("record {:?} has no id", record.bib_key()));
    } else if !ids.insert(record.id.as_str()) {
      out.push(format!("{label}: id is not unique"));
    }
    for violation in schema.validate(record).violations {
      out.push(format!("{label}: {violation}"));
    }
  }
  for issue in registry.collection_issues() {
    let id = issue.record_id().unwrap_or_default();
    out.push(format!("{id}: {issue}"));
  }
  out
}

// ─── RegistryStore ───────────────────────────────────────────────────────────

/// The canonical registry, its alias ledger and its change log, bound to a
/// storage backend.
///
/// Mutations only touch the in-memory state; nothing is written until one of
/// the `save*` methods is awaited. Cloning is cheap enough to stage a change
/// on a copy and swap it in once persisted.
#[derive(Debug)]
pub struct RegistryStore<S> {
  storage:  Arc<S>,
  schema:   FieldSchema,
  registry: Registry,
  aliases:  AliasLedger,
  changes:  ChangeLog,
}

impl<S> Clone for RegistryStore<S> {
  fn clone(&self) -> Self {
    Self {
      storage:  Arc::clone(&self.storage),
      schema:   self.schema.clone(),
      registry: self.registry.clone(),
      aliases:  self.aliases.clone(),
      changes:  self.changes.clone(),
    }
  }
}

impl<S: Storage> RegistryStore<S> {
  async fn read_document(&self, doc: Document) -> Result<Option<String>> {
    read_document(&*self.storage, doc).await
  }

  /// Load the schema document, falling back to the default contract when it
  /// is absent.
  pub async fn load_schema(storage: &S) -> Result<FieldSchema> {
    match read_document(storage, Document::Schema).await? {
      None => Ok(FieldSchema::default()),
      Some(text) => serde_json::from_str(&text).map_err(|e| {
        Error::CorruptRegistry {
          location: storage.locate(Document::Schema),
          problems: vec![e.to_string()],
        }
      }),
    }
  }

  /// Read the registry, alias and change-log documents.
  ///
  /// A missing registry is an empty collection. A document that does not
  /// parse, or a registry that breaks the schema or identity invariants,
  /// fails with [`Error::CorruptRegistry`].
  pub async fn load(storage: Arc<S>, schema: FieldSchema) -> Result<Self> {
    let location = storage.locate(Document::Registry);
    let registry = match read_document(&*storage, Document::Registry).await? {
      None => {
        debug!(%location, "registry document absent; starting empty");
        Registry::new()
      }
      Some(text) => {
        let doc: RegistryDocument =
          serde_json::from_str(&text).map_err(|e| Error::CorruptRegistry {
            location: location.clone(),
            problems: vec![e.to_string()],
          })?;
        if doc.version != REGISTRY_VERSION {
          return Err(Error::CorruptRegistry {
            location,
            problems: vec![format!(
              "unsupported registry version {}",
              doc.version
            )],
          });
        }
        let registry = Registry::from_records(doc.records);
        let problems = audit(&registry, &schema);
        if !problems.is_empty() {
          return Err(Error::CorruptRegistry {
            location,
            problems,
          });
        }
        registry
      }
    };

    let aliases = match read_document(&*storage, Document::Aliases).await? {
      None => AliasLedger::new(),
      Some(text) => {
        AliasLedger::from_document(parse(&*storage, Document::Aliases, &text)?)
      }
    };
    let changes = match read_document(&*storage, Document::ChangeLog).await? {
      None => ChangeLog::new(),
      Some(text) => {
        ChangeLog::from_document(parse(&*storage, Document::ChangeLog, &text)?)
      }
    };

    info!(
      records = registry.len(),
      aliases = aliases.entries().len(),
      changes = changes.len(),
      "registry loaded"
    );
    Ok(Self {
      storage,
      schema,
      registry,
      aliases,
      changes,
    })
  }

  /// Start a registry from imported records, refusing to pick a winner when
  /// the import already breaks an invariant.
  pub fn bootstrap(
    storage: Arc<S>,
    schema: FieldSchema,
    records: Vec<SourceRecord>,
  ) -> Result<Self> {
    let registry = Registry::from_records(records);
    let problems = audit(&registry, &schema);
    if !problems.is_empty() {
      warn!(conflicts = problems.len(), "bootstrap import has conflicts");
      return Err(Error::Bootstrap(problems));
    }
    Ok(Self {
      storage,
      schema,
      registry,
      aliases: AliasLedger::new(),
      changes: ChangeLog::new(),
    })
  }

  pub fn storage(&self) -> &Arc<S> { &self.storage }

  pub async fn persist(&self, doc: Document, contents: String) -> Result<()> {
    self
      .storage
      .write(doc, contents)
      .await
      .map_err(Error::storage)?;
    debug!(document = doc.label(), "document written");
    Ok(())
  }

  /// Write the registry document.
  pub async fn save(&self) -> Result<()> {
    self.persist(Document::Registry, self.registry_document()?).await?;
    info!(records = self.registry.len(), "registry saved");
    Ok(())
  }

  pub async fn save_aliases(&self) -> Result<()> {
    self.persist(Document::Aliases, self.alias_document()?).await
  }

  pub async fn save_changes(&self) -> Result<()> {
    self.persist(Document::ChangeLog, self.change_document()?).await
  }

  /// Current stored text of a document, for change detection.
  pub async fn stored(&self, doc: Document) -> Result<Option<String>> {
    self.read_document(doc).await
  }
}

impl<S> RegistryStore<S> {
  pub fn schema(&self) -> &FieldSchema { &self.schema }

  pub fn registry(&self) -> &Registry { &self.registry }

  pub fn aliases(&self) -> &AliasLedger { &self.aliases }

  pub fn changes(&self) -> &ChangeLog { &self.changes }

  /// Resolve a `source`/`citekey` value, following renames if no active
  /// record carries it directly.
  pub fn find_by_key(&self, key: &str) -> Result<&SourceRecord> {
    if let Some(record) = self.registry.find_active(key) {
      return Ok(record);
    }
    let resolved = self
      .aliases
      .resolve_until(key, |k| self.registry.find_active(k).is_some())?;
    self
      .registry
      .find_active(&resolved)
      .ok_or_else(|| Error::NotFound(normalize::whitespace(key)))
  }

  /// Every check a candidate must pass before it can be committed. Both the
  /// non-mutating check and [`RegistryStore::upsert`] go through here.
  pub fn vet(&self, candidate: &SourceRecord, checklist: &mut Checklist) {
    let validation = self.schema.validate(candidate);
    checklist.extend(validation.violations.into_iter().map(Issue::SchemaViolation));
    for warning in validation.warnings {
      checklist.warn(warning);
    }

    checklist.extend(self.registry.identity_issues(candidate));

    for key in [&candidate.source, &candidate.citekey] {
      if !self.aliases.is_retired(key) {
        continue;
      }
      let current = match self
        .aliases
        .resolve_until(key, |k| self.registry.find_active(k).is_some())
      {
        Ok(current) => current,
        Err(e) => {
          checklist.warn(e.to_string());
          continue;
        }
      };
      if normalize::text(&current) == normalize::text(key) {
        continue;
      }
      if let Some(live) = self.registry.find_active(&current) {
        if live.id != candidate.id {
          checklist.push(Issue::RetiredKey {
            key:         normalize::whitespace(key),
            current_key: current,
            record_id:   candidate.id.clone(),
          });
        }
      }
    }

    for warning in self.registry.near_duplicates(candidate) {
      checklist.warn(warning);
    }
  }

  /// Insert a record, or replace the record with the same `id`.
  ///
  /// Changing `source` or `citekey` of an existing record requires
  /// `is_rename`. All identity invariants are re-checked against the rest of
  /// the collection; on any failure nothing changes. Returns the replaced
  /// record, if any.
  pub fn upsert(
    &mut self,
    mut record: SourceRecord,
    is_rename: bool,
  ) -> Result<Option<SourceRecord>> {
    if record.id.trim().is_empty() {
      record.id = new_record_id();
    }
    if let Some(prior) = self.registry.get(&record.id) {
      let renamed = !renamed_fields(prior, &record).is_empty();
      if renamed && !is_rename {
        return Err(Error::ConfirmationRequired("key rename"));
      }
    }

    let mut checklist = Checklist::new();
    self.vet(&record, &mut checklist);
    if !checklist.is_ok() {
      return Err(Error::rejected(checklist));
    }

    debug!(id = %record.id, key = %record.bib_key(), "record committed");
    Ok(self.registry.put(record))
  }

  /// Remove the record `key` resolves to.
  pub fn delete(&mut self, key: &str, confirmed: bool) -> Result<SourceRecord> {
    if !confirmed {
      return Err(Error::ConfirmationRequired("delete"));
    }
    let id = self.find_by_key(key)?.id.clone();
    self
      .registry
      .remove(&id)
      .ok_or_else(|| Error::NotFound(normalize::whitespace(key)))
  }

  /// Append a rename to the alias ledger.
  pub fn record_alias(&mut self, entry: AliasEntry) -> Result<bool> {
    let written = self.aliases.record(entry.clone())?;
    if written {
      info!(old = %entry.old_key, new = %entry.new_key, "alias recorded");
    }
    Ok(written)
  }

  pub fn record_change(&mut self, entry: ChangeEntry) -> Result<()> {
    self.changes.record(entry)
  }

  pub fn registry_document(&self) -> Result<String> {
    pretty(&RegistryDocument {
      version: REGISTRY_VERSION,
      records: self.registry.records().to_vec(),
    })
  }

  pub fn alias_document(&self) -> Result<String> {
    pretty(&self.aliases.to_document())
  }

  pub fn change_document(&self) -> Result<String> {
    pretty(&self.changes.to_document())
  }
}

/// Key fields whose value differs between `prior` and `next`, with the old
/// and new values. Case-only changes are not renames.
pub fn renamed_fields(
  prior: &SourceRecord,
  next: &SourceRecord,
) -> Vec<(KeyField, String, String)> {
  [
    (KeyField::Source, &prior.source, &next.source),
    (KeyField::Citekey, &prior.citekey, &next.citekey),
  ]
  .into_iter()
  .filter(|(_, old, new)| normalize::text(old) != normalize::text(new))
  .map(|(field, old, new)| {
    (field, normalize::whitespace(old), normalize::whitespace(new))
  })
  .collect()
}

async fn read_document<S: Storage>(
  storage: &S,
  doc: Document,
) -> Result<Option<String>> {
  let text = storage.read(doc).await.map_err(Error::storage)?;
  Ok(text.filter(|t| !t.trim().is_empty()))
}

fn parse<S: Storage, T: for<'de> Deserialize<'de>>(
  storage: &S,
  doc: Document,
  text: &str,
) -> Result<T> {
  serde_json::from_str(text).map_err(|e| Error::CorruptRegistry {
    location: storage.locate(doc),
    problems: vec![e.to_string()],
  })
}
