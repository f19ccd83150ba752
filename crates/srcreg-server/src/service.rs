//! The registry service: check, save, delete and load-existing over one
//! [`RegistryStore`].
//!
//! Saves and deletes hold the write lock for the whole load-mutate-persist
//! cycle. The change is staged on a clone of the store and only swapped in
//! once every document has been written. Checks take the read lock and never
//! write.

use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use serde::Serialize;
use srcreg_artifacts::{generate::digest, render};
use srcreg_core::{
  alias::{AliasEntry, KeyField},
  changelog::{ChangeAction, ChangeEntry},
  check::{Check, Checklist, Issue},
  normalize,
  record::{BibFields, SourceRecord, new_record_id},
  schema::{FieldSchema, Violation},
  store::{Document, RegistryStore, Storage, renamed_fields},
};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::{
  Error, Result,
  submission::{DeleteRequest, Mode, Submission},
};

pub const DEFAULT_ADD_REASON: &str = "Added via local UI";
pub const DEFAULT_DELETE_REASON: &str = "Deleted via local UI";

/// Write order of a save: canonical documents, then derived artifacts.
const WRITE_ORDER: [Document; 5] = [
  Document::Registry,
  Document::Aliases,
  Document::ChangeLog,
  Document::Sheet,
  Document::Bibliography,
];

// ─── Responses ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileChange {
  pub file:    String,
  pub summary: String,
}

/// Outcome of a successful save or delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveReport {
  pub ok:                  bool,
  pub operation:           ChangeAction,
  pub record_id:           String,
  pub key:                 String,
  pub changed_fields:      Vec<String>,
  pub key_renamed:         bool,
  pub modified_files:      Vec<String>,
  pub file_change_summary: Vec<FileChange>,
  pub checks:              Vec<Check>,
  pub warnings:            Vec<String>,
  pub message:             String,
}

/// Suggested values for the form's autocompletion lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Options {
  pub section:                Vec<String>,
  pub aggsource:              Vec<String>,
  pub data_type:              Vec<String>,
  pub inclusion_in_warehouse: Vec<String>,
  /// Existing source and citekey values.
  pub targets:                Vec<String>,
}

/// A pasted bibliography entry split into form fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedBib {
  pub source_key: String,
  pub bib:        BibFields,
}

// ─── Evaluation ──────────────────────────────────────────────────────────────

/// Result of validating a submission against the current state.
struct Evaluation {
  checklist: Checklist,
  prior:     Option<SourceRecord>,
  candidate: Option<SourceRecord>,
  renames:   Vec<(KeyField, String, String)>,
}

/// The single validation path behind both check and save.
fn evaluate<S>(store: &RegistryStore<S>, sub: &Submission) -> Evaluation {
  let mut checklist = Checklist::new();
  if sub.actor().is_empty() {
    checklist.push(Issue::SchemaViolation(Violation::missing("editor_name")));
  }

  let prior = match sub.mode {
    Mode::Add => None,
    Mode::Edit => {
      if sub.reason().is_empty() {
        checklist.push(Issue::SchemaViolation(Violation::missing("change_reason")));
      }
      match store.find_by_key(&sub.target) {
        Ok(record) => Some(record.clone()),
        Err(e) => {
          if !matches!(e, srcreg_core::Error::NotFound(_)) {
            checklist.warn(e.to_string());
          }
          checklist.push(Issue::UnresolvedTarget {
            target: normalize::whitespace(&sub.target),
          });
          return Evaluation {
            checklist,
            prior: None,
            candidate: None,
            renames: Vec::new(),
          };
        }
      }
    }
  };

  let candidate = match &prior {
    None => sub.new_record(),
    Some(existing) => sub.edited_record(existing),
  };

  let renames = prior
    .as_ref()
    .map(|p| renamed_fields(p, &candidate))
    .unwrap_or_default();
  for (_, from, to) in &renames {
    if !sub.key_rename_confirmed {
      checklist.push(Issue::RenameUnconfirmed {
        from: from.clone(),
        to:   to.clone(),
      });
    }
    match store.aliases().can_record(from, to) {
      Ok(_) => {}
      Err(srcreg_core::Error::AliasConflict {
        old_key,
        existing,
        proposed,
      }) => checklist.push(Issue::AliasConflict {
        old_key,
        existing,
        proposed,
      }),
      Err(e) => checklist.warn(e.to_string()),
    }
  }

  store.vet(&candidate, &mut checklist);
  Evaluation {
    checklist,
    prior,
    candidate: Some(candidate),
    renames,
  }
}

fn file_summary(
  doc: Document,
  operation: ChangeAction,
  record_id: &str,
  fields: &[String],
  key_renamed: bool,
) -> String {
  let listed = if fields.is_empty() {
    "(none detected)".to_owned()
  } else {
    fields.join(", ")
  };
  match (doc, operation) {
    (Document::Registry, ChangeAction::Add) => {
      format!("Added record {record_id}. Fields populated: {listed}.")
    }
    (Document::Registry, ChangeAction::Edit) => {
      format!("Updated record {record_id}. Fields changed: {listed}.")
    }
    (Document::Registry, ChangeAction::Delete) => {
      format!("Deleted record {record_id}. Removed fields: {listed}.")
    }
    (Document::ChangeLog, _) => format!(
      "Appended {} audit entry for {record_id}.",
      operation.as_str()
    ),
    (Document::Aliases, _) if key_renamed => {
      "Added source/citekey alias mappings for key rename.".to_owned()
    }
    (Document::Sheet, _) => {
      "Regenerated Sources sheet from canonical registry.".to_owned()
    }
    (Document::Bibliography, _) => {
      "Regenerated bibliography from canonical registry.".to_owned()
    }
    _ => "File updated.".to_owned(),
  }
}

// ─── Service ─────────────────────────────────────────────────────────────────

pub struct RegistryService<S> {
  store: RwLock<RegistryStore<S>>,
}

impl<S: Storage> RegistryService<S> {
  pub fn new(store: RegistryStore<S>) -> Self {
    Self {
      store: RwLock::new(store),
    }
  }

  /// Load the schema and registry from `storage`.
  pub async fn open(storage: Arc<S>) -> Result<Self> {
    let schema: FieldSchema = RegistryStore::load_schema(&*storage).await?;
    Ok(Self::new(RegistryStore::load(storage, schema).await?))
  }

  /// Validate a submission without persisting anything.
  pub async fn check(&self, sub: &Submission) -> Checklist {
    let store = self.store.read().await;
    evaluate(&*store, sub).checklist
  }

  /// Validate, then commit the record, alias entries and change-log entry
  /// and regenerate the artifacts. On rejection nothing is written.
  pub async fn save(&self, sub: &Submission) -> Result<SaveReport> {
    let mut store = self.store.write().await;
    let Evaluation {
      checklist,
      prior,
      candidate,
      renames,
    } = evaluate(&*store, sub);
    let mut record = match candidate {
      Some(record) if checklist.is_ok() => record,
      _ => {
        info!(summary = %checklist.summary(), "save rejected");
        return Err(Error::Rejected(Box::new(checklist)));
      }
    };

    let now = Utc::now().trunc_subsecs(0);
    let actor = sub.actor();
    let (operation, reason) = match sub.mode {
      Mode::Add => {
        record.id = new_record_id();
        record.created_by = actor.clone();
        record.created_at = Some(now);
        let reason = match sub.reason() {
          r if r.is_empty() => DEFAULT_ADD_REASON.to_owned(),
          r => r,
        };
        (ChangeAction::Add, reason)
      }
      Mode::Edit => (ChangeAction::Edit, sub.reason()),
    };
    record.updated_by = actor.clone();
    record.updated_at = Some(now);

    let changed_fields = match &prior {
      Some(prior) => prior.changed_fields(&record),
      None => record.populated_fields(),
    };

    let mut staged = store.clone();
    staged.upsert(record.clone(), !renames.is_empty())?;
    for (field, old_key, new_key) in &renames {
      staged.record_alias(AliasEntry {
        field:      *field,
        old_key:    old_key.clone(),
        new_key:    new_key.clone(),
        reason:     reason.clone(),
        actor:      actor.clone(),
        renamed_at: now,
      })?;
    }
    staged.record_change(ChangeEntry {
      action: operation,
      record_id: record.id.clone(),
      key: record.bib_key(),
      reason,
      actor,
      recorded_at: now,
    })?;

    let written = self.commit(&mut *store, staged).await?;
    info!(
      id = %record.id,
      key = %record.bib_key(),
      operation = operation.as_str(),
      files = written.len(),
      "record saved"
    );
    Ok(self.report(
      &*store,
      operation,
      &record,
      changed_fields,
      !renames.is_empty(),
      written,
      checklist,
    ))
  }

  /// Remove the record `target` resolves to. Requires `confirmed`.
  pub async fn delete(&self, req: &DeleteRequest) -> Result<SaveReport> {
    let actor = normalize::whitespace(&req.editor_name);
    if actor.is_empty() {
      let mut checklist = Checklist::new();
      checklist.push(Issue::SchemaViolation(Violation::missing("editor_name")));
      return Err(Error::Rejected(Box::new(checklist)));
    }
    let reason = match normalize::whitespace(&req.change_reason) {
      r if r.is_empty() => DEFAULT_DELETE_REASON.to_owned(),
      r => r,
    };

    let mut store = self.store.write().await;
    let mut staged = store.clone();
    let removed = staged.delete(&req.target, req.confirmed)?;
    staged.record_change(ChangeEntry {
      action: ChangeAction::Delete,
      record_id: removed.id.clone(),
      key: removed.bib_key(),
      reason,
      actor,
      recorded_at: Utc::now().trunc_subsecs(0),
    })?;

    let written = self.commit(&mut *store, staged).await?;
    info!(id = %removed.id, key = %removed.bib_key(), "record deleted");
    Ok(self.report(
      &*store,
      ChangeAction::Delete,
      &removed,
      removed.populated_fields(),
      false,
      written,
      Checklist::new(),
    ))
  }

  /// The record `target` resolves to, following renames.
  pub async fn load_existing(&self, target: &str) -> Result<SourceRecord> {
    let store = self.store.read().await;
    Ok(store.find_by_key(target)?.clone())
  }

  pub async fn options(&self) -> Options {
    let store = self.store.read().await;
    let registry = store.registry();
    let mut targets = registry.distinct("source");
    targets.extend(registry.distinct("citekey"));
    targets.sort();
    targets.dedup();
    Options {
      section: registry.distinct("section"),
      aggsource: registry.distinct("aggsource"),
      data_type: registry.distinct("data_type"),
      inclusion_in_warehouse: registry.distinct("inclusion_in_warehouse"),
      targets,
    }
  }

  /// Write every document that `staged` changes, in [`WRITE_ORDER`], then
  /// swap `staged` in. Returns the documents actually written.
  async fn commit(
    &self,
    current: &mut RegistryStore<S>,
    staged: RegistryStore<S>,
  ) -> Result<Vec<Document>> {
    let artifacts = render(staged.registry())?;
    let mut plan = Vec::with_capacity(WRITE_ORDER.len());
    for doc in WRITE_ORDER {
      let text = match doc {
        Document::Registry => staged.registry_document()?,
        Document::Aliases => staged.alias_document()?,
        Document::ChangeLog => staged.change_document()?,
        Document::Sheet => artifacts.sheet.clone(),
        _ => artifacts.bibliography.clone(),
      };
      plan.push((doc, text));
    }

    let mut written = Vec::new();
    for (doc, text) in plan {
      let stored = match staged.stored(doc).await {
        Ok(stored) => stored,
        Err(e) => return Err(self.partial(current, &staged, &written, doc, e).await),
      };
      let unchanged = match &stored {
        Some(old) => digest(old) == digest(&text),
        None => doc == Document::Aliases && staged.aliases().is_empty(),
      };
      if unchanged {
        continue;
      }
      if let Err(e) = staged.persist(doc, text).await {
        return Err(self.partial(current, &staged, &written, doc, e).await);
      }
      written.push(doc);
    }

    *current = staged;
    Ok(written)
  }

  /// Build the partial-save error and resynchronise with what is stored.
  async fn partial(
    &self,
    current: &mut RegistryStore<S>,
    staged: &RegistryStore<S>,
    written: &[Document],
    failed: Document,
    cause: srcreg_core::Error,
  ) -> Error {
    let storage = Arc::clone(staged.storage());
    let completed: Vec<String> =
      written.iter().map(|d| storage.locate(*d)).collect();
    error!(
      failed = failed.label(),
      completed = completed.len(),
      error = %cause,
      "save stopped partway"
    );
    if !written.is_empty() {
      match RegistryStore::load(Arc::clone(&storage), staged.schema().clone()).await {
        Ok(reloaded) => *current = reloaded,
        Err(e) => warn!(error = %e, "could not reload registry after partial save"),
      }
    }
    Error::PartialSave {
      completed,
      failed: storage.locate(failed),
      reason: cause.to_string(),
    }
  }

  #[allow(clippy::too_many_arguments)]
  fn report(
    &self,
    store: &RegistryStore<S>,
    operation: ChangeAction,
    record: &SourceRecord,
    changed_fields: Vec<String>,
    key_renamed: bool,
    written: Vec<Document>,
    checklist: Checklist,
  ) -> SaveReport {
    let storage = store.storage();
    let file_change_summary = written
      .iter()
      .map(|doc| FileChange {
        file:    storage.locate(*doc),
        summary: file_summary(*doc, operation, &record.id, &changed_fields, key_renamed),
      })
      .collect();
    let message = match operation {
      ChangeAction::Delete => "Entry deleted and artifacts regenerated",
      _ => "Record saved and artifacts regenerated",
    };
    SaveReport {
      ok: true,
      operation,
      record_id: record.id.clone(),
      key: record.bib_key(),
      changed_fields,
      key_renamed,
      modified_files: written.iter().map(|d| storage.locate(*d)).collect(),
      file_change_summary,
      checks: checklist.checks(),
      warnings: checklist.warnings().to_vec(),
      message: message.to_owned(),
    }
  }
}

/// Split a pasted bibliography entry into form fields.
pub fn parse_bib(text: &str) -> Result<ParsedBib> {
  let entry =
    srcreg_bibtex::parse(text).map_err(|e| Error::BadRequest(e.to_string()))?;
  Ok(ParsedBib {
    source_key: entry.key.clone(),
    bib:        entry.to_bib_fields(),
  })
}
