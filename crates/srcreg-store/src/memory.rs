//! [`MemoryStorage`]: an in-process map of documents, for tests.

use std::collections::{HashMap, HashSet};

use srcreg_core::store::{Document, Storage};
use tokio::sync::Mutex;

use crate::{Error, Result};

#[derive(Debug, Default)]
pub struct MemoryStorage {
  docs:    Mutex<HashMap<Document, String>>,
  failing: Mutex<HashSet<Document>>,
}

impl MemoryStorage {
  pub fn new() -> Self { Self::default() }

  /// Seed a document before the storage is shared.
  pub fn with(mut self, doc: Document, contents: impl Into<String>) -> Self {
    self.docs.get_mut().insert(doc, contents.into());
    self
  }

  /// Make every later write to `doc` fail.
  pub async fn fail_writes(&self, doc: Document) {
    self.failing.lock().await.insert(doc);
  }

  pub async fn get(&self, doc: Document) -> Option<String> {
    self.docs.lock().await.get(&doc).cloned()
  }

  pub async fn set(&self, doc: Document, contents: impl Into<String>) {
    self.docs.lock().await.insert(doc, contents.into());
  }
}

impl Storage for MemoryStorage {
  type Error = Error;

  async fn read(&self, doc: Document) -> Result<Option<String>> {
    Ok(self.docs.lock().await.get(&doc).cloned())
  }

  async fn write(&self, doc: Document, contents: String) -> Result<()> {
    if self.failing.lock().await.contains(&doc) {
      return Err(Error::Refused(self.locate(doc)));
    }
    self.docs.lock().await.insert(doc, contents);
    Ok(())
  }

  fn locate(&self, doc: Document) -> String { format!("memory:{}", doc.label()) }
}
