//! Runtime Configuration
//!
//! Settings are plain data so a host can load them from JSON alongside its
//! own configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::reactive::Policy;

/// Failure to load a [`RuntimeConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid runtime configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Tunables for one [`Runtime`](crate::reactive::Runtime).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Policy used by [`Module::default_cell`](crate::reactive::Module::default_cell).
    pub default_policy: Policy,

    /// Pause between background generator pulls, in milliseconds.
    ///
    /// `None` only yields to the executor between pulls.
    pub generator_interval_ms: Option<u64>,
}

impl RuntimeConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn generator_interval(&self) -> Option<Duration> {
        self.generator_interval_ms.map(Duration::from_millis)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_policy: Policy::Eager,
            generator_interval_ms: None,
        }
    }
}
