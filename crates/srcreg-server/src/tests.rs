//! Router tests driven through `tower::ServiceExt::oneshot` over an
//! in-memory store.

use std::sync::Arc;

use axum::{
  body::Body,
  http::{Method, Request, StatusCode, header},
};
use serde_json::{Value, json};
use srcreg_core::{
  record::SourceRecord,
  schema::FieldSchema,
  store::{Document, RegistryStore},
};
use srcreg_store::MemoryStorage;
use tower::ServiceExt;

use crate::{AppState, RegistryService, router};

fn jones() -> SourceRecord {
  let mut r = SourceRecord {
    id: "src-jones".into(),
    section: "Income".into(),
    aggsource: "Jones".into(),
    legend: "Top incomes series".into(),
    source: "Jones2019".into(),
    citekey: "Jones2019".into(),
    link: "https://example.org/jones".into(),
    ..Default::default()
  };
  r.bib.entry_type = "article".into();
  r.bib.title = "Top Incomes".into();
  r.bib.author = "Jones, A.".into();
  r.bib.year = "2019".into();
  r
}

async fn seeded() -> (Arc<MemoryStorage>, AppState<MemoryStorage>) {
  let storage = Arc::new(MemoryStorage::new());
  let store =
    RegistryStore::bootstrap(storage.clone(), FieldSchema::default(), vec![jones()])
      .unwrap();
  store.save().await.unwrap();
  let service = RegistryService::open(storage.clone()).await.unwrap();
  (storage, AppState::new(service))
}

async fn call(
  state: &AppState<MemoryStorage>,
  method: Method,
  uri: &str,
  body: Option<Value>,
) -> (StatusCode, Value) {
  let mut req = Request::builder().method(method).uri(uri);
  let body = match body {
    Some(v) => {
      req = req.header(header::CONTENT_TYPE, "application/json");
      Body::from(v.to_string())
    }
    None => Body::empty(),
  };
  let resp = router(state.clone())
    .oneshot(req.body(body).unwrap())
    .await
    .unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
    .await
    .unwrap();
  let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
  (status, json)
}

fn smith() -> Value {
  json!({
    "mode": "add",
    "editor_name": "Ana",
    "record": {
      "source_key": "Smith2020",
      "section": "Wealth",
      "aggsource": "Smith",
      "legend": "Smith wealth survey",
      "link": "https://example.org/smith",
      "bib": {
        "title": "Wealth Taxes",
        "author": "Smith, B.",
        "year": "2020",
        "keywords": "Data Sources: Wealth"
      }
    }
  })
}

fn check_passed(body: &Value, category: &str) -> bool {
  body["checks"]
    .as_array()
    .unwrap()
    .iter()
    .find(|c| c["category"] == category)
    .map(|c| c["passed"].as_bool().unwrap())
    .unwrap()
}

fn kinds(body: &Value) -> Vec<String> {
  body["kinds"]
    .as_array()
    .unwrap()
    .iter()
    .map(|k| k.as_str().unwrap().to_owned())
    .collect()
}

// ─── Basics ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn ping_and_form() {
  let (_, state) = seeded().await;
  let (status, body) = call(&state, Method::GET, "/api/ping", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!({ "ok": true }));

  let resp = router(state)
    .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
    .await
    .unwrap();
  assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn options_list_existing_values() {
  let (_, state) = seeded().await;
  let (status, body) = call(&state, Method::GET, "/api/options", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["section"], json!(["Income"]));
  assert_eq!(body["targets"], json!(["Jones2019"]));
}

#[tokio::test]
async fn parse_bib_splits_entry() {
  let (_, state) = seeded().await;
  let text = "@techreport{Lee2021,\n  title = {Estate Data},\n  year = {2021}\n}";
  let (status, body) = call(
    &state,
    Method::POST,
    "/api/parse_bib",
    Some(json!({ "text": text })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["source_key"], "Lee2021");
  assert_eq!(body["bib"]["entry_type"], "techreport");
  assert_eq!(body["bib"]["title"], "Estate Data");

  let (status, _) = call(
    &state,
    Method::POST,
    "/api/parse_bib",
    Some(json!({ "text": "not bibtex" })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ─── Add ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_passes_check_then_saves_everything() {
  let (storage, state) = seeded().await;

  let (status, body) = call(&state, Method::POST, "/api/check", Some(smith())).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["ok"], true, "{body}");
  assert!(storage.get(Document::ChangeLog).await.is_none());

  let (status, body) = call(&state, Method::POST, "/api/save", Some(smith())).await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["operation"], "add");
  assert_eq!(body["key"], "Smith2020");
  assert_eq!(
    body["modified_files"],
    json!([
      "memory:registry",
      "memory:change log",
      "memory:dictionary sheet",
      "memory:bibliography"
    ])
  );

  let registry = storage.get(Document::Registry).await.unwrap();
  assert!(registry.contains("\"Smith2020\""));
  let changes = storage.get(Document::ChangeLog).await.unwrap();
  assert!(changes.contains("Added via local UI"));
  let bib = storage.get(Document::Bibliography).await.unwrap();
  assert!(bib.contains("@misc{Smith2020,"));
  let sheet = storage.get(Document::Sheet).await.unwrap();
  assert!(sheet.contains("Smith2020"));
}

#[tokio::test]
async fn duplicate_key_is_rejected_without_writing() {
  let (storage, state) = seeded().await;
  let before = storage.get(Document::Registry).await;

  let mut sub = smith();
  sub["record"]["source_key"] = json!("jones2019");
  let (status, body) = call(&state, Method::POST, "/api/save", Some(sub)).await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert_eq!(body["ok"], false);
  assert!(kinds(&body).contains(&"DuplicateKey".to_owned()));
  assert!(!check_passed(&body, "duplicate_key"));
  assert!(body["error"].as_str().unwrap().starts_with("record rejected"));

  assert_eq!(storage.get(Document::Registry).await, before);
  assert!(storage.get(Document::ChangeLog).await.is_none());
  assert!(storage.get(Document::Sheet).await.is_none());
}

#[tokio::test]
async fn missing_editor_name_fails_actor_check() {
  let (_, state) = seeded().await;
  let mut sub = smith();
  sub["editor_name"] = json!("   ");
  let (_, body) = call(&state, Method::POST, "/api/check", Some(sub)).await;
  assert_eq!(body["ok"], false);
  assert!(!check_passed(&body, "actor"));
}

// ─── Edit ────────────────────────────────────────────────────────────────────

fn rename(confirmed: bool) -> Value {
  json!({
    "mode": "edit",
    "target": "Jones2019",
    "editor_name": "Ana",
    "change_reason": "Add co-authors to key",
    "key_rename_confirmed": confirmed,
    "record": { "source_key": "Jonesetal2019" }
  })
}

#[tokio::test]
async fn edit_without_reason_fails_change_reason() {
  let (_, state) = seeded().await;
  let sub = json!({
    "mode": "edit",
    "target": "Jones2019",
    "editor_name": "Ana",
    "record": { "legend": "Revised legend" }
  });
  let (status, body) = call(&state, Method::POST, "/api/check", Some(sub.clone())).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["ok"], false);
  assert!(!check_passed(&body, "change_reason"));

  let (status, _) = call(&state, Method::POST, "/api/save", Some(sub)).await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn unknown_edit_target_is_reported() {
  let (_, state) = seeded().await;
  let mut sub = rename(true);
  sub["target"] = json!("Nobody1999");
  let (_, body) = call(&state, Method::POST, "/api/check", Some(sub)).await;
  assert!(!check_passed(&body, "edit_target"));

  let (status, _) =
    call(&state, Method::GET, "/api/record?target=Nobody1999", None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unconfirmed_rename_is_rejected() {
  let (_, state) = seeded().await;
  let (status, body) =
    call(&state, Method::POST, "/api/save", Some(rename(false))).await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert!(!check_passed(&body, "key_rename"));
}

#[tokio::test]
async fn confirmed_rename_records_alias_and_resolves_old_key() {
  let (storage, state) = seeded().await;
  let (status, body) =
    call(&state, Method::POST, "/api/save", Some(rename(true))).await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["operation"], "edit");
  assert_eq!(body["key_renamed"], true);
  assert_eq!(body["record_id"], "src-jones");
  assert!(
    body["modified_files"]
      .as_array()
      .unwrap()
      .contains(&json!("memory:aliases"))
  );

  let aliases = storage.get(Document::Aliases).await.unwrap();
  assert!(aliases.contains("Jonesetal2019"));

  let (status, body) =
    call(&state, Method::GET, "/api/record?target=Jones2019", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["record"]["citekey"], "Jonesetal2019");
  assert_eq!(body["record"]["legend"], "Top incomes series");
}

fn rename_to(target: &str, key: &str) -> Value {
  json!({
    "mode": "edit",
    "target": target,
    "editor_name": "Ana",
    "change_reason": "Rekey",
    "key_rename_confirmed": true,
    "record": { "source_key": key }
  })
}

#[tokio::test]
async fn renaming_back_around_a_loop_leaves_a_clean_ledger() {
  let (storage, state) = seeded().await;
  for (from, to) in [
    ("Jones2019", "B2019"),
    ("B2019", "C2019"),
    ("C2019", "Jones2019"),
  ] {
    let (status, body) =
      call(&state, Method::POST, "/api/save", Some(rename_to(from, to))).await;
    assert_eq!(status, StatusCode::OK, "{from} -> {to}: {body}");
  }

  let schema = RegistryStore::load_schema(&*storage).await.unwrap();
  let store = RegistryStore::load(storage.clone(), schema).await.unwrap();
  assert!(store.aliases().problems().is_empty());
  assert_eq!(store.aliases().resolve("Jones2019").unwrap(), "Jones2019");
  for key in ["Jones2019", "B2019", "C2019"] {
    let record = store.find_by_key(key).unwrap();
    assert_eq!(record.id, "src-jones");
    assert_eq!(record.citekey, "Jones2019");
  }

  let (status, body) =
    call(&state, Method::GET, "/api/record?target=B2019", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["record"]["citekey"], "Jones2019");
}

#[tokio::test]
async fn key_equal_to_another_records_id_is_rejected() {
  let (storage, state) = seeded().await;
  let before = storage.get(Document::Registry).await;

  let mut sub = smith();
  sub["record"]["source_key"] = json!("src-jones");
  let (status, body) = call(&state, Method::POST, "/api/save", Some(sub)).await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert!(kinds(&body).contains(&"DuplicateKey".to_owned()));
  assert_eq!(storage.get(Document::Registry).await, before);

  let (status, body) =
    call(&state, Method::GET, "/api/record?target=src-jones", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["record"]["citekey"], "Jones2019");
}

#[tokio::test]
async fn edit_without_rename_leaves_aliases_untouched() {
  let (_, state) = seeded().await;
  let sub = json!({
    "mode": "edit",
    "target": "Jones2019",
    "editor_name": "Ana",
    "change_reason": "Clarify legend",
    "record": { "legend": "Top incomes, long series" }
  });
  let (status, body) = call(&state, Method::POST, "/api/save", Some(sub)).await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["changed_fields"], json!(["legend"]));
  let files = body["modified_files"].as_array().unwrap();
  assert!(!files.contains(&json!("memory:aliases")));
  assert!(files.contains(&json!("memory:change log")));
}

// ─── Delete ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn delete_requires_confirmation() {
  let (storage, state) = seeded().await;
  let req = json!({ "target": "Jones2019", "editor_name": "Ana" });
  let (status, body) = call(&state, Method::POST, "/api/delete", Some(req)).await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert_eq!(body["confirm"], "delete");
  assert!(storage.get(Document::ChangeLog).await.is_none());
}

#[tokio::test]
async fn confirmed_delete_removes_record_and_logs_it() {
  let (storage, state) = seeded().await;
  let req = json!({
    "target": "Jones2019",
    "editor_name": "Ana",
    "change_reason": "Superseded",
    "confirmed": true
  });
  let (status, body) = call(&state, Method::POST, "/api/delete", Some(req)).await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["operation"], "delete");
  assert_eq!(body["message"], "Entry deleted and artifacts regenerated");

  let registry = storage.get(Document::Registry).await.unwrap();
  assert!(!registry.contains("Jones2019"));
  let changes = storage.get(Document::ChangeLog).await.unwrap();
  assert!(changes.contains("\"delete\""));
  assert!(changes.contains("Superseded"));

  let (status, _) =
    call(&state, Method::GET, "/api/record?target=Jones2019", None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ─── Failures ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn partial_save_reports_completed_documents() {
  let (storage, state) = seeded().await;
  storage.fail_writes(Document::Sheet).await;

  let (status, body) = call(&state, Method::POST, "/api/save", Some(smith())).await;
  assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
  assert_eq!(body["kind"], "PartialSaveFailure");
  assert_eq!(
    body["completed"],
    json!(["memory:registry", "memory:change log"])
  );
  assert_eq!(body["failed"], "memory:dictionary sheet");

  // In-memory state follows what reached storage.
  let (status, _) =
    call(&state, Method::GET, "/api/record?target=Smith2020", None).await;
  assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn shutdown_notifies_waiter() {
  let (_, state) = seeded().await;
  let waiter = {
    let notify = Arc::clone(&state.shutdown);
    tokio::spawn(async move { notify.notified().await })
  };
  let (status, body) = call(&state, Method::POST, "/api/shutdown", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["message"], "Shutting down");
  waiter.await.unwrap();
}
