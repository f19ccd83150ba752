//! Document locations for the command-line tools, read from `srcreg.toml`
//! and `SRCREG_*` environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;
use srcreg_store::StoragePaths;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub paths: StoragePaths,
}

impl Settings {
  pub fn load(file: &Path) -> anyhow::Result<Self> {
    config::Config::builder()
      .add_source(config::File::from(file).required(false))
      .add_source(
        config::Environment::with_prefix("SRCREG")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .with_context(|| format!("failed to read {}", file.display()))?
      .try_deserialize()
      .context("failed to deserialise settings")
  }

  /// Apply a `--root` override.
  pub fn with_root(mut self, root: Option<PathBuf>) -> Self {
    if let Some(root) = root {
      self.paths.root = root;
    }
    self
  }
}

/// Replace `slot` when an override is given.
pub fn override_path(slot: &mut PathBuf, value: Option<PathBuf>) {
  if let Some(value) = value {
    *slot = value;
  }
}
