//! Core types and trait definitions for the source registry.
//!
//! This crate is deliberately free of HTTP and filesystem dependencies. It
//! owns the record model, the schema contract, the identity invariants, the
//! alias ledger and change log, and the [`store::RegistryStore`] that ties
//! them to an injected [`store::Storage`] backend.

pub mod alias;
pub mod changelog;
pub mod check;
pub mod error;
pub mod normalize;
pub mod record;
pub mod registry;
pub mod schema;
pub mod store;

pub use error::{Error, Result};
