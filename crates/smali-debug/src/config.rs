use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PositionConfig {
    /// Bytes per VM code unit when converting a runtime code index into an
    /// instruction's code offset (and back).
    ///
    /// Dalvik counts code in 16-bit units while smali instruction offsets are
    /// in bytes, hence the default of 2.
    #[serde(default = "default_code_unit_bytes")]
    pub code_unit_bytes: u32,

    /// Ask the debugged process whether a loaded type really declares the
    /// method before reporting a location in it.
    #[serde(default = "default_verify_runtime_methods")]
    pub verify_runtime_methods: bool,
}

fn default_code_unit_bytes() -> u32 {
    2
}

fn default_verify_runtime_methods() -> bool {
    true
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            code_unit_bytes: default_code_unit_bytes(),
            verify_runtime_methods: default_verify_runtime_methods(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl PositionConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(text).map_err(|err| ConfigError::Toml(err.message().to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.code_unit_bytes == 0 {
            return Err(ConfigError::Invalid(
                "code_unit_bytes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
