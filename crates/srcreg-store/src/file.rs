//! [`FileStorage`]: documents as files under a project root.

use std::{io::ErrorKind, path::PathBuf};

use srcreg_core::store::{Document, Storage};
use tracing::debug;

use crate::{Error, Result, StoragePaths};

#[derive(Debug, Clone)]
pub struct FileStorage {
  paths: StoragePaths,
}

impl FileStorage {
  pub fn new(paths: StoragePaths) -> Self { Self { paths } }

  pub fn paths(&self) -> &StoragePaths { &self.paths }

  async fn read_path(path: PathBuf) -> Result<Option<String>> {
    match tokio::fs::read_to_string(&path).await {
      Ok(text) => Ok(Some(text)),
      Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
      Err(source) => Err(Error::Read { path, source }),
    }
  }

  /// Write next to the target and rename over it, so readers never see a
  /// half-written document.
  async fn write_path(path: PathBuf, contents: String) -> Result<()> {
    let write_err = |path: &PathBuf| {
      let path = path.clone();
      move |source| Error::Write { path, source }
    };

    if let Some(parent) = path.parent() {
      tokio::fs::create_dir_all(parent)
        .await
        .map_err(write_err(&path))?;
    }
    let file_name = path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_default();
    let staging = path.with_file_name(format!(".{file_name}.tmp"));
    tokio::fs::write(&staging, contents)
      .await
      .map_err(write_err(&path))?;
    tokio::fs::rename(&staging, &path)
      .await
      .map_err(write_err(&path))?;
    debug!(path = %path.display(), "file replaced");
    Ok(())
  }
}

impl Storage for FileStorage {
  type Error = Error;

  async fn read(&self, doc: Document) -> Result<Option<String>> {
    Self::read_path(self.paths.path(doc)).await
  }

  async fn write(&self, doc: Document, contents: String) -> Result<()> {
    Self::write_path(self.paths.path(doc), contents).await
  }

  fn locate(&self, doc: Document) -> String {
    self.paths.path(doc).display().to_string()
  }
}
