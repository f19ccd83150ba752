//! Integration tests for `RegistryStore` over both backends.

use std::sync::Arc;

use chrono::Utc;
use srcreg_core::{
  Error,
  alias::{AliasEntry, KeyField},
  check::Issue,
  record::SourceRecord,
  schema::FieldSchema,
  store::{Document, RegistryStore, Storage},
};

use crate::{FileStorage, MemoryStorage, StoragePaths};

fn record(id: &str, key: &str, title: &str) -> SourceRecord {
  let mut r = SourceRecord {
    id: id.into(),
    section: "Wealth".into(),
    aggsource: key.into(),
    legend: format!("{key} legend"),
    source: key.into(),
    citekey: key.into(),
    link: format!("https://example.org/{}", key.to_lowercase()),
    ..Default::default()
  };
  r.bib.entry_type = "article".into();
  r.bib.title = title.into();
  r.bib.author = "Doe, Jane".into();
  r.bib.year = "2020".into();
  r
}

async fn memory_store() -> RegistryStore<MemoryStorage> {
  RegistryStore::load(Arc::new(MemoryStorage::new()), FieldSchema::default())
    .await
    .expect("empty store")
}

async fn seeded() -> RegistryStore<MemoryStorage> {
  let mut s = memory_store().await;
  s.upsert(record("src-1", "Smith2020", "Wealth Taxes"), false)
    .unwrap();
  s.upsert(record("src-2", "Jones2019", "Top Incomes"), false)
    .unwrap();
  s
}

fn alias(old: &str, new: &str) -> AliasEntry {
  AliasEntry {
    field:      KeyField::Citekey,
    old_key:    old.into(),
    new_key:    new.into(),
    reason:     "rename".into(),
    actor:      "tester".into(),
    renamed_at: Utc::now(),
  }
}

// ─── Load / save ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_documents_load_as_empty() {
  let s = memory_store().await;
  assert!(s.registry().is_empty());
  assert!(s.aliases().is_empty());
  assert!(s.changes().is_empty());
}

#[tokio::test]
async fn save_then_load_round_trips_through_files() {
  let dir = tempfile::tempdir().unwrap();
  let storage = Arc::new(FileStorage::new(StoragePaths::under(dir.path())));

  let mut s = RegistryStore::load(storage.clone(), FieldSchema::default())
    .await
    .unwrap();
  let mut saved = record("src-1", "Smith2020", "Wealth Taxes");
  saved.bib.extra_fields.insert("series".into(), "Working Papers".into());
  saved.review.tacomments = "kept in storage".into();
  s.upsert(saved.clone(), false).unwrap();
  s.save().await.unwrap();

  let loaded = RegistryStore::load(storage, FieldSchema::default())
    .await
    .unwrap();
  let back = loaded.find_by_key("Smith2020").unwrap();
  assert!(back.same_content(&saved));
  assert_eq!(back.review.tacomments, "kept in storage");
}

#[tokio::test]
async fn serialization_is_stable_across_reloads() {
  let storage = Arc::new(MemoryStorage::new());
  let mut s = RegistryStore::load(storage.clone(), FieldSchema::default())
    .await
    .unwrap();
  s.upsert(record("src-2", "beta", "Second"), false).unwrap();
  s.upsert(record("src-1", "Alpha", "First"), false).unwrap();
  s.save().await.unwrap();

  let first = storage.get(Document::Registry).await.unwrap();
  let reloaded = RegistryStore::load(storage.clone(), FieldSchema::default())
    .await
    .unwrap();
  assert_eq!(reloaded.registry_document().unwrap(), first);
  assert!(first.find("\"Alpha\"").unwrap() < first.find("\"beta\"").unwrap());
  assert!(first.ends_with("}\n"));
}

#[tokio::test]
async fn unparseable_registry_is_corrupt() {
  let storage =
    Arc::new(MemoryStorage::new().with(Document::Registry, "{\"records\": ["));
  let err = RegistryStore::load(storage, FieldSchema::default())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::CorruptRegistry { .. }));
}

#[tokio::test]
async fn schema_invalid_registry_is_corrupt() {
  let mut bad = record("src-1", "Smith2020", "Wealth Taxes");
  bad.bib.year = "twenty".into();
  let doc = serde_json::json!({ "version": 1, "records": [bad] });
  let storage =
    Arc::new(MemoryStorage::new().with(Document::Registry, doc.to_string()));
  let err = RegistryStore::load(storage, FieldSchema::default())
    .await
    .unwrap_err();
  match err {
    Error::CorruptRegistry { problems, location } => {
      assert!(problems.iter().any(|p| p.contains("bib.year")), "{problems:?}");
      assert_eq!(location, "memory:registry");
    }
    other => panic!("unexpected error: {other}"),
  }
}

#[tokio::test]
async fn duplicate_keys_on_disk_are_corrupt() {
  let doc = serde_json::json!({
    "version": 1,
    "records": [
      record("src-1", "Smith2020", "Wealth Taxes"),
      record("src-2", "Smith2020", "Other Title"),
    ],
  });
  let storage =
    Arc::new(MemoryStorage::new().with(Document::Registry, doc.to_string()));
  let err = RegistryStore::load(storage, FieldSchema::default())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::CorruptRegistry { .. }));
}

#[tokio::test]
async fn schema_document_is_optional() {
  let storage = MemoryStorage::new();
  assert_eq!(
    RegistryStore::load_schema(&storage).await.unwrap(),
    FieldSchema::default()
  );
  storage
    .set(Document::Schema, r#"{"required": ["source"]}"#)
    .await;
  let schema = RegistryStore::load_schema(&storage).await.unwrap();
  assert_eq!(schema.required, vec!["source".to_string()]);
}

// ─── Identity invariants ─────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_source_is_rejected_without_changes() {
  let mut s = seeded().await;
  let before = s.registry().clone();

  let err = s
    .upsert(record("src-3", "Smith2020", "A Different Title"), false)
    .unwrap_err();
  let Error::Rejected(checklist) = err else {
    panic!("expected rejection");
  };
  assert!(
    checklist
      .issues()
      .iter()
      .any(|i| matches!(i, Issue::DuplicateKey { .. }))
  );
  assert_eq!(s.registry(), &before);
}

#[tokio::test]
async fn all_violations_are_reported_together() {
  let mut s = seeded().await;
  let mut dup = record("src-3", "Smith2020", "Top Incomes");
  dup.link = "https://example.org/jones2019/".into();
  dup.legend.clear();
  let Err(Error::Rejected(checklist)) = s.upsert(dup, false) else {
    panic!("expected rejection");
  };
  let kinds = checklist.kinds();
  assert!(kinds.contains(&"SchemaViolation"));
  assert!(kinds.contains(&"DuplicateKey"));
  assert!(kinds.contains(&"DuplicateUrl"));
  assert!(kinds.contains(&"DuplicateTitleYear"));
}

#[tokio::test]
async fn edit_in_place_does_not_collide_with_itself() {
  let mut s = seeded().await;
  let mut edited = s.find_by_key("Smith2020").unwrap().clone();
  edited.bib.note = "second printing".into();
  let prior = s.upsert(edited, false).unwrap().unwrap();
  assert!(prior.bib.note.is_empty());
  assert_eq!(s.registry().len(), 2);
}

#[tokio::test]
async fn new_record_without_id_gets_one() {
  let mut s = memory_store().await;
  s.upsert(record("", "Smith2020", "Wealth Taxes"), false)
    .unwrap();
  let id = &s.find_by_key("Smith2020").unwrap().id;
  assert!(id.starts_with("src-"));
}

// ─── Renames and aliases ─────────────────────────────────────────────────────

#[tokio::test]
async fn rename_needs_confirmation() {
  let mut s = seeded().await;
  let mut renamed = s.find_by_key("Jones2019").unwrap().clone();
  renamed.source = "Jonesetal2019".into();
  renamed.citekey = "Jonesetal2019".into();
  let err = s.upsert(renamed, false).unwrap_err();
  assert!(matches!(err, Error::ConfirmationRequired(_)));
  assert!(s.find_by_key("Jones2019").is_ok());
}

#[tokio::test]
async fn renamed_key_resolves_through_alias() {
  let mut s = seeded().await;
  let mut renamed = s.find_by_key("Jones2019").unwrap().clone();
  renamed.source = "Jonesetal2019".into();
  renamed.citekey = "Jonesetal2019".into();
  s.upsert(renamed, true).unwrap();
  assert!(matches!(s.find_by_key("Jones2019"), Err(Error::NotFound(_))));

  s.record_alias(alias("Jones2019", "Jonesetal2019")).unwrap();
  assert_eq!(s.find_by_key("Jones2019").unwrap().citekey, "Jonesetal2019");
  assert_eq!(s.find_by_key("Jonesetal2019").unwrap().id, "src-2");
}

#[tokio::test]
async fn retired_key_cannot_be_reused() {
  let mut s = seeded().await;
  let mut renamed = s.find_by_key("Jones2019").unwrap().clone();
  renamed.source = "Jonesetal2019".into();
  renamed.citekey = "Jonesetal2019".into();
  s.upsert(renamed, true).unwrap();
  s.record_alias(alias("Jones2019", "Jonesetal2019")).unwrap();

  let err = s
    .upsert(record("src-9", "Jones2019", "Unrelated Work"), false)
    .unwrap_err();
  let Error::Rejected(checklist) = err else {
    panic!("expected rejection");
  };
  assert!(
    checklist
      .issues()
      .iter()
      .any(|i| matches!(i, Issue::RetiredKey { .. }))
  );
}

#[tokio::test]
async fn aliases_and_changes_persist() {
  let storage = Arc::new(MemoryStorage::new());
  let mut s = RegistryStore::load(storage.clone(), FieldSchema::default())
    .await
    .unwrap();
  s.record_alias(alias("A2019", "B2019")).unwrap();
  s.save_aliases().await.unwrap();
  s.save_changes().await.unwrap();

  let reloaded = RegistryStore::load(storage, FieldSchema::default())
    .await
    .unwrap();
  assert_eq!(reloaded.aliases().resolve("A2019").unwrap(), "B2019");
  assert!(reloaded.changes().is_empty());
}

// ─── Delete ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn delete_requires_confirmation() {
  let mut s = seeded().await;
  let err = s.delete("Smith2020", false).unwrap_err();
  assert!(matches!(err, Error::ConfirmationRequired(_)));
  assert_eq!(s.registry().len(), 2);

  let removed = s.delete("Smith2020", true).unwrap();
  assert_eq!(removed.id, "src-1");
  assert_eq!(s.registry().len(), 1);
  assert!(matches!(s.delete("Smith2020", true), Err(Error::NotFound(_))));
}

// ─── Bootstrap ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn bootstrap_conflicts_are_hard_errors() {
  let records = vec![
    record("src-1", "Smith2020", "Wealth Taxes"),
    record("src-2", "Smith2021", "wealth  taxes"),
  ];
  let err = RegistryStore::bootstrap(
    Arc::new(MemoryStorage::new()),
    FieldSchema::default(),
    records,
  )
  .unwrap_err();
  let Error::Bootstrap(conflicts) = err else {
    panic!("expected bootstrap error");
  };
  assert_eq!(conflicts.len(), 1);
  assert!(conflicts[0].starts_with("src-2"), "{}", conflicts[0]);
}

// ─── Backends ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn file_storage_creates_parent_directories() {
  let dir = tempfile::tempdir().unwrap();
  let storage = FileStorage::new(StoragePaths::under(dir.path()));
  assert_eq!(storage.read(Document::Bibliography).await.unwrap(), None);

  storage
    .write(Document::Bibliography, "@misc{a,\n  title = {A}\n}\n".into())
    .await
    .unwrap();
  let text = storage.read(Document::Bibliography).await.unwrap().unwrap();
  assert!(text.starts_with("@misc{a,"));
  assert!(storage.locate(Document::Bibliography).ends_with(".bib"));
}

#[tokio::test]
async fn memory_storage_can_refuse_writes() {
  let storage = MemoryStorage::new();
  storage.fail_writes(Document::Sheet).await;
  assert!(storage.write(Document::Sheet, "x".into()).await.is_err());
  storage.write(Document::Registry, "{}".into()).await.unwrap();
}
