//! Server settings, read from `srcreg.toml` and `SRCREG_*` environment
//! variables.

use std::path::Path;

use serde::Deserialize;
use srcreg_store::StoragePaths;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8765;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:  String,
  pub port:  u16,
  pub paths: StoragePaths,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:  DEFAULT_HOST.to_owned(),
      port:  DEFAULT_PORT,
      paths: StoragePaths::default(),
    }
  }
}

impl ServerConfig {
  /// Layer the optional TOML file under the environment. Nested keys use a
  /// double underscore, e.g. `SRCREG_PATHS__REGISTRY`.
  pub fn load(file: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(file).required(false))
      .add_source(
        config::Environment::with_prefix("SRCREG")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()?
      .try_deserialize()
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}
