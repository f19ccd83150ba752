//! Route handlers.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/` | The editing form |
//! | `GET`  | `/api/options` | Autocompletion values |
//! | `GET`  | `/api/ping` | Liveness |
//! | `GET`  | `/api/record?target=` | Load existing; 404 if no key resolves |
//! | `POST` | `/api/parse_bib` | Body: `{"text": "@article{...}"}` |
//! | `POST` | `/api/check` | Always 200; `ok` tells pass/fail |
//! | `POST` | `/api/save` | 422 with the checklist on rejection |
//! | `POST` | `/api/delete` | 409 without `confirmed` |
//! | `POST` | `/api/shutdown` | Stops the server |

use axum::{
  Json,
  extract::{Query, State},
  response::Html,
};
use serde::Deserialize;
use serde_json::{Value, json};
use srcreg_core::{check::Checklist, record::SourceRecord, store::Storage};
use tracing::info;

use crate::{
  AppState, Result,
  service::{self, Options, ParsedBib, SaveReport},
  submission::{DeleteRequest, Submission},
};

const FORM: &str = include_str!("form.html");

/// `GET /`
pub async fn index() -> Html<&'static str> { Html(FORM) }

/// `GET /api/ping`
pub async fn ping() -> Json<Value> { Json(json!({ "ok": true })) }

/// `GET /api/options`
pub async fn options<S: Storage + 'static>(
  State(state): State<AppState<S>>,
) -> Json<Options> {
  Json(state.service.options().await)
}

#[derive(Debug, Deserialize)]
pub struct RecordParams {
  #[serde(default)]
  pub target: String,
}

#[derive(Debug, serde::Serialize)]
pub struct RecordBody {
  pub record: SourceRecord,
}

/// `GET /api/record?target=<key>`
pub async fn record<S: Storage + 'static>(
  State(state): State<AppState<S>>,
  Query(params): Query<RecordParams>,
) -> Result<Json<RecordBody>> {
  let record = state.service.load_existing(&params.target).await?;
  Ok(Json(RecordBody { record }))
}

#[derive(Debug, Deserialize)]
pub struct PasteBody {
  #[serde(default)]
  pub text: String,
}

/// `POST /api/parse_bib`
pub async fn parse_bib(Json(body): Json<PasteBody>) -> Result<Json<ParsedBib>> {
  Ok(Json(service::parse_bib(&body.text)?))
}

/// `POST /api/check`
pub async fn check<S: Storage + 'static>(
  State(state): State<AppState<S>>,
  Json(sub): Json<Submission>,
) -> Json<Checklist> {
  Json(state.service.check(&sub).await)
}

/// `POST /api/save`
pub async fn save<S: Storage + 'static>(
  State(state): State<AppState<S>>,
  Json(sub): Json<Submission>,
) -> Result<Json<SaveReport>> {
  Ok(Json(state.service.save(&sub).await?))
}

/// `POST /api/delete`
pub async fn delete<S: Storage + 'static>(
  State(state): State<AppState<S>>,
  Json(req): Json<DeleteRequest>,
) -> Result<Json<SaveReport>> {
  Ok(Json(state.service.delete(&req).await?))
}

/// `POST /api/shutdown`
pub async fn shutdown<S: Storage + 'static>(
  State(state): State<AppState<S>>,
) -> Json<Value> {
  info!("shutdown requested");
  state.shutdown.notify_one();
  Json(json!({ "ok": true, "message": "Shutting down" }))
}
