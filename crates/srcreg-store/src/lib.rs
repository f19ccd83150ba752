//! Storage backends for the source registry.
//!
//! [`FileStorage`] keeps each document as a file under a project root;
//! [`MemoryStorage`] keeps them in a map and is meant for tests.

mod file;
mod memory;
mod paths;

pub mod error;

pub use error::{Error, Result};
pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use paths::StoragePaths;

#[cfg(test)]
mod tests;
