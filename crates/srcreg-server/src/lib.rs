//! Local editing service for the source registry.
//!
//! Exposes an axum [`Router`] serving a single form plus JSON commands
//! (`check`, `save`, `delete`, load-existing) backed by a
//! [`RegistryService`] over any [`Storage`] backend.

pub mod config;
pub mod error;
pub mod handlers;
pub mod service;
pub mod submission;

pub use error::{Error, Result};
pub use service::RegistryService;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use srcreg_core::store::Storage;
use tokio::sync::Notify;
use tower_http::trace::TraceLayer;

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S> {
  pub service:  Arc<RegistryService<S>>,
  /// Signalled by `POST /api/shutdown`.
  pub shutdown: Arc<Notify>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      service:  Arc::clone(&self.service),
      shutdown: Arc::clone(&self.shutdown),
    }
  }
}

impl<S> AppState<S> {
  pub fn new(service: RegistryService<S>) -> Self {
    Self {
      service:  Arc::new(service),
      shutdown: Arc::new(Notify::new()),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

pub fn router<S>(state: AppState<S>) -> Router
where
  S: Storage + 'static,
{
  Router::new()
    .route("/",               get(handlers::index))
    .route("/api/options",    get(handlers::options::<S>))
    .route("/api/ping",       get(handlers::ping))
    .route("/api/record",     get(handlers::record::<S>))
    .route("/api/parse_bib",  post(handlers::parse_bib))
    .route("/api/check",      post(handlers::check::<S>))
    .route("/api/save",       post(handlers::save::<S>))
    .route("/api/delete",     post(handlers::delete::<S>))
    .route("/api/shutdown",   post(handlers::shutdown::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

#[cfg(test)]
mod tests;
