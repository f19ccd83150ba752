//! The `srcreg` subcommands, written against any [`Storage`] backend.

use std::{path::Path, sync::Arc};

use anyhow::{Context as _, bail};
use chrono::{SubsecRound, Utc};
use srcreg_artifacts::{
  bootstrap::import,
  drift::check_generated,
  reconcile::Reconciliation,
  render,
  sheet::read_sheet,
};
use srcreg_core::{
  normalize,
  store::{Document, RegistryStore, Storage},
};
use tracing::{info, warn};

/// Warnings printed by `validate` before the rest are summarised.
pub const WARNING_LIMIT: usize = 20;

/// Read a document from an explicit path, or from the storage backend.
pub async fn read_input<S: Storage>(
  storage: &S,
  doc: Document,
  path: Option<&Path>,
) -> anyhow::Result<Option<String>> {
  match path {
    Some(path) => {
      let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
      Ok(Some(text))
    }
    None => storage
      .read(doc)
      .await
      .with_context(|| format!("failed to read {}", storage.locate(doc))),
  }
}

async fn open<S: Storage>(storage: Arc<S>) -> anyhow::Result<RegistryStore<S>> {
  let schema = RegistryStore::load_schema(&*storage)
    .await
    .context("failed to load schema")?;
  RegistryStore::load(storage, schema)
    .await
    .context("failed to load registry")
}

async fn write_artifacts<S: Storage>(
  store: &RegistryStore<S>,
) -> anyhow::Result<Vec<String>> {
  let artifacts = render(store.registry()).context("failed to render artifacts")?;
  let mut written = Vec::new();
  for (doc, text) in artifacts.documents() {
    store.persist(doc, text.to_owned()).await?;
    written.push(store.storage().locate(doc));
  }
  Ok(written)
}

// ─── bootstrap ───────────────────────────────────────────────────────────────

/// Import the legacy dictionary rows (and bibliography, if any) into a new
/// registry, then generate the artifacts from it. Returns the record count.
pub async fn bootstrap<S: Storage>(
  storage: Arc<S>,
  dictionary: &str,
  bibliography: Option<&str>,
  actor: &str,
  force: bool,
) -> anyhow::Result<usize> {
  let existing = storage
    .read(Document::Registry)
    .await
    .with_context(|| format!("failed to read {}", storage.locate(Document::Registry)))?;
  if existing.is_some_and(|t| !t.trim().is_empty()) && !force {
    bail!(
      "registry already exists at {}; pass --force to overwrite it",
      storage.locate(Document::Registry)
    );
  }

  let rows = read_sheet(dictionary).context("failed to read legacy dictionary")?;
  let records = import(&rows, bibliography, actor, Utc::now().trunc_subsecs(0));
  let schema = RegistryStore::load_schema(&*storage)
    .await
    .context("failed to load schema")?;
  let store = match RegistryStore::bootstrap(storage, schema, records) {
    Ok(store) => store,
    Err(srcreg_core::Error::Bootstrap(problems)) => {
      for problem in &problems {
        eprintln!("  {problem}");
      }
      bail!(
        "bootstrap found {} conflict(s); resolve them in the legacy files and rerun",
        problems.len()
      );
    }
    Err(e) => return Err(e.into()),
  };

  store.save().await?;
  write_artifacts(&store).await?;
  info!(records = store.registry().len(), "registry bootstrapped");
  Ok(store.registry().len())
}

// ─── build ───────────────────────────────────────────────────────────────────

/// Regenerate the sheet and bibliography. Returns the locations written.
pub async fn build<S: Storage>(storage: Arc<S>) -> anyhow::Result<Vec<String>> {
  let store = open(storage).await?;
  let written = write_artifacts(&store).await?;
  info!(records = store.registry().len(), "artifacts built");
  Ok(written)
}

// ─── validate ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Findings {
  pub errors:   Vec<String>,
  pub warnings: Vec<String>,
}

impl Findings {
  /// Whether the run fails. `strict` makes warnings fatal too.
  pub fn failed(&self, strict: bool) -> bool {
    !self.errors.is_empty() || (strict && !self.warnings.is_empty())
  }
}

/// Validate the registry, alias ledger and change log, and optionally the
/// committed artifacts. Problems with the data are findings; only I/O and
/// rendering failures are errors.
pub async fn validate<S: Storage>(
  storage: Arc<S>,
  with_generated: bool,
) -> anyhow::Result<Findings> {
  let mut found = Findings::default();

  let schema = match RegistryStore::load_schema(&*storage).await {
    Ok(schema) => schema,
    Err(e) => {
      found.errors.push(e.to_string());
      return Ok(found);
    }
  };
  let store = match RegistryStore::load(storage, schema).await {
    Ok(store) => store,
    Err(srcreg_core::Error::CorruptRegistry { location, problems }) => {
      found
        .errors
        .extend(problems.iter().map(|p| format!("{location}: {p}")));
      return Ok(found);
    }
    Err(e) => return Err(e.into()),
  };

  let registry = store.registry();
  for record in registry.records() {
    for warning in store.schema().validate(record).warnings {
      found.warnings.push(format!("{}: {warning}", record.id));
    }
  }
  found.warnings.extend(registry.fuzzy_warnings());

  found.errors.extend(store.aliases().problems());
  let deleted = store.changes().deleted_keys();
  for entry in store.aliases().entries() {
    let Ok(target) = store.aliases().resolve(&entry.old_key) else {
      // Cycles are already listed by `problems`.
      continue;
    };
    if registry.find_active(&target).is_some() {
      continue;
    }
    let message = format!(
      "alias {} -> {} ends at {target:?}, which is not an active record",
      entry.old_key, entry.new_key
    );
    if deleted.contains(&normalize::text(&target)) {
      found.warnings.push(format!("{message} (deleted)"));
    } else {
      found.errors.push(message);
    }
  }
  found.errors.extend(store.changes().problems());

  if with_generated {
    match check_generated(&store).await {
      Ok(()) => {}
      Err(srcreg_artifacts::Error::Drift(drifts)) => {
        for drift in drifts {
          found.errors.push(drift.summary());
          found.errors.extend(
            drift
              .differences
              .iter()
              .map(|d| format!("  {}: {d}", drift.document.label())),
          );
        }
      }
      Err(e) => return Err(e.into()),
    }
  }

  if !found.errors.is_empty() {
    warn!(errors = found.errors.len(), "validation failed");
  }
  Ok(found)
}

// ─── reconcile ───────────────────────────────────────────────────────────────

/// Compare the registry with the bibliography and write the report.
pub async fn reconcile<S: Storage>(
  storage: Arc<S>,
  bibliography: Option<&str>,
) -> anyhow::Result<Reconciliation> {
  let store = open(storage).await?;
  let report =
    srcreg_artifacts::reconcile::reconcile(store.registry(), store.changes(), bibliography);
  store.persist(Document::Report, report.to_markdown()).await?;
  info!(
    divergent = report.divergent.len(),
    orphans = report.orphans.len(),
    "reconciliation report written"
  );
  Ok(report)
}
