//! Build-step configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Options for a [`Baker`](crate::Baker).
///
/// Every field has a default, so a config file only needs the keys it
/// overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BakeConfig {
    /// Fail on ambiguous instance decompositions instead of warning.
    pub strict_decomposition: bool,
    /// Leave chunks untouched when their job transform is the identity.
    pub skip_identity: bool,
    /// Maximum `tracing` level for the command-line tools.
    pub log_level: String,
}

impl Default for BakeConfig {
    fn default() -> Self {
        Self {
            strict_decomposition: false,
            skip_identity: true,
            log_level: "info".to_string(),
        }
    }
}

impl BakeConfig {
    /// Load a config from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.level()?;
        Ok(config)
    }

    /// The configured log level.
    pub fn level(&self) -> Result<tracing::Level> {
        self.log_level
            .parse()
            .map_err(|_| Error::Config(format!("unknown log level {:?}", self.log_level)))
    }
}
