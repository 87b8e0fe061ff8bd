use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Numeric tolerances used when building operations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvalConfig {
    /// Determinants with a magnitude below this are treated as zero
    /// by matrix inversion.
    pub singular_epsilon: f32,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            singular_epsilon: 1e-6,
        }
    }
}

impl EvalConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = Self::from_json_str(&fs::read_to_string(path)?)?;
        tracing::debug!(path = %path.display(), ?config, "loaded eval config");
        Ok(config)
    }

    pub fn to_json_string(&self) -> String {
        serde_json::to_string_pretty(self).expect("config always serializes")
    }
}
