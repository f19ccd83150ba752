//! Derived artifacts of the source registry.
//!
//! - [`sheet`]: the `Sources` worksheet of the dictionary workbook.
//! - [`generate`]: renders the sheet and bibliography from a registry.
//! - [`drift`]: check-generated mode.
//! - [`reconcile`]: the registry vs. bibliography report.
//! - [`bootstrap`]: mapping of legacy dictionary rows onto records.

pub mod bootstrap;
pub mod drift;
pub mod error;
pub mod generate;
pub mod reconcile;
pub mod sheet;

pub use error::{Error, Result};
pub use generate::{Artifacts, render};
