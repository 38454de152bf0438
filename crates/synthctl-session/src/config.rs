//! Session configuration file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use synthctl_core::{Catalog, ParameterSet, RangePolicy, SynthDefinition, catalog};
use synthctl_engine::{EngineClient, EngineConfig};

use crate::SessionController;
use crate::console::DEFAULT_CAPACITY;

/// Everything needed to set up a session, loaded from RON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Engine to connect to
    pub engine: EngineConfig,

    /// Definition played by the session
    pub definition: String,

    /// What happens to out-of-range slider values
    pub range_policy: RangePolicy,

    /// Maximum number of code console entries kept
    pub console_capacity: usize,

    /// Merge queued updates of the same parameter
    pub coalesce_updates: bool,

    /// Initial values overriding the definition's defaults
    pub parameters: ParameterSet,

    /// Definitions added to (or replacing) the built-in catalog
    pub definitions: Vec<SynthDefinition>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            definition: catalog::SINE.to_string(),
            range_policy: RangePolicy::default(),
            console_capacity: DEFAULT_CAPACITY,
            coalesce_updates: true,
            parameters: ParameterSet::new(),
            definitions: Vec::new(),
        }
    }
}

impl SessionConfig {
    /// Load configuration from a RON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let config = Self::parse(&contents)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        ron::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Built-in definitions plus the configured ones
    pub fn catalog(&self) -> Catalog {
        Catalog::builtin().with_definitions(self.definitions.iter().cloned())
    }

    /// The definition this configuration plays
    pub fn definition(&self) -> Result<SynthDefinition, ConfigError> {
        Ok(self.catalog().get(&self.definition)?.clone())
    }

    /// Build an uninitialized controller on the configured engine
    pub fn controller(&self) -> Result<SessionController<Box<dyn EngineClient>>, ConfigError> {
        let definition = self.definition()?;
        Ok(SessionController::new(self.engine.build(), definition)
            .with_policy(self.range_policy)
            .with_console_capacity(self.console_capacity))
    }
}

/// Errors that can occur while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {message}")]
    Io { path: String, message: String },

    #[error("Invalid config: {0}")]
    Parse(String),

    #[error(transparent)]
    Definition(#[from] synthctl_core::Error),
}
