//! Configuration management for the election service.
//!
//! Loading order (later sources override earlier):
//! 1. Default values (hardcoded)
//! 2. File referenced by `CONFIG_PATH`
//! 3. Environment variables with `ELECTION__` prefix (highest priority)
mod connection;
pub use connection::*;


//---
use std::env;
use std::time::Duration;

use config::Config;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;
use crate::DEFAULT_RESOURCE_NAME;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ElectionConfig {
    /// Logical resource contended for; used as log prefix and metric label
    #[serde(default = "default_resource")]
    pub resource: String,

    /// Upper bound for a single durable write of the leader record
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,

    /// A confirmed leader clears its own record when closed
    #[serde(default = "default_clear_on_close")]
    pub clear_on_close: bool,

    /// Reaction to ambiguous connectivity signals from the backend
    #[serde(default)]
    pub connection_loss: ConnectionLossPolicy,
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            resource: default_resource(),
            write_timeout_ms: default_write_timeout_ms(),
            clear_on_close: default_clear_on_close(),
            connection_loss: ConnectionLossPolicy::default(),
        }
    }
}

impl ElectionConfig {
    /// Builds configuration from defaults, `CONFIG_PATH` and `ELECTION__*` variables.
    ///
    /// # Note
    /// Does not validate; call [`ElectionConfig::validate`] after all overrides.
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("ELECTION")
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies overrides from `path`, then the latest environment variables.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("ELECTION")
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Consumes self and returns it if every field is usable.
    pub fn validate(self) -> Result<Self> {
        if self.resource.trim().is_empty() {
            return Err(Error::Config(ConfigError::Message("resource name cannot be empty".into())));
        }

        if self.write_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "write_timeout_ms must be greater than 0".into(),
            )));
        }

        self.connection_loss.validate()?;

        Ok(self)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

fn default_resource() -> String {
    DEFAULT_RESOURCE_NAME.to_string()
}
// in ms
fn default_write_timeout_ms() -> u64 {
    10_000
}
fn default_clear_on_close() -> bool {
    true
}
