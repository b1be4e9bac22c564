//! Engine configuration.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `GRAPE_*` environment variables (for example `GRAPE_MAX_EPOCHS=500`).

use std::path::Path;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Thread configuration for each worker's local pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadConfig {
    /// Detect the thread count from the CPU.
    #[default]
    Auto,
    /// Use a fixed number of threads.
    Fixed(usize),
}

impl ThreadConfig {
    /// Returns the effective number of threads to use.
    #[must_use]
    pub fn effective_threads(&self) -> usize {
        match self {
            ThreadConfig::Auto => std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(1),
            ThreadConfig::Fixed(n) => (*n).max(1),
        }
    }
}

/// Configuration for one computation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Threads per worker.
    pub threads: ThreadConfig,
    /// Abort with [`Error::EpochLimitExceeded`] after this many epochs.
    pub max_epochs: Option<u64>,
    /// Drop dominated messages to the same vertex inside an epoch.
    pub coalesce_messages: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threads: ThreadConfig::Auto,
            max_epochs: Some(10_000),
            coalesce_messages: true,
        }
    }
}

impl EngineConfig {
    /// Creates a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set thread config.
    #[must_use]
    pub fn with_threads(mut self, threads: ThreadConfig) -> Self {
        self.threads = threads;
        self
    }

    /// Builder: set fixed thread count.
    #[must_use]
    pub fn with_fixed_threads(mut self, count: usize) -> Self {
        self.threads = ThreadConfig::Fixed(count);
        self
    }

    /// Builder: set the epoch limit (`None` disables it).
    #[must_use]
    pub fn with_max_epochs(mut self, max_epochs: Option<u64>) -> Self {
        self.max_epochs = max_epochs;
        self
    }

    /// Builder: enable or disable message coalescing.
    #[must_use]
    pub fn with_coalescing(mut self, coalesce: bool) -> Self {
        self.coalesce_messages = coalesce;
        self
    }

    /// Gets effective thread count for this config.
    #[must_use]
    pub fn effective_threads(&self) -> usize {
        self.threads.effective_threads()
    }

    /// Loads a config from defaults, an optional TOML file, and `GRAPE_*` env vars.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(EngineConfig::default()));
        if let Some(path) = path {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            figment = figment.merge(Toml::file(path));
        }
        let config: EngineConfig = figment.merge(Env::prefixed("GRAPE_")).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.threads == ThreadConfig::Fixed(0) {
            return Err(Error::Config("threads must be > 0".into()));
        }
        if self.max_epochs == Some(0) {
            return Err(Error::Config("max_epochs must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_threads_never_zero() {
        assert_eq!(ThreadConfig::Fixed(0).effective_threads(), 1);
        assert_eq!(ThreadConfig::Fixed(6).effective_threads(), 6);
        assert!(ThreadConfig::Auto.effective_threads() >= 1);
    }

    #[test]
    fn validate_rejects_zero_threads() {
        let config = EngineConfig::new().with_fixed_threads(0);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn load_layers_toml_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grape.toml");
        std::fs::write(
            &path,
            "max_epochs = 42\ncoalesce_messages = false\nthreads = { fixed = 3 }\n",
        )
        .unwrap();

        let config = EngineConfig::load(Some(&path)).unwrap();
        assert_eq!(config.max_epochs, Some(42));
        assert!(!config.coalesce_messages);
        assert_eq!(config.threads, ThreadConfig::Fixed(3));
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let err = EngineConfig::load(Some(Path::new("/nonexistent/grape.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
