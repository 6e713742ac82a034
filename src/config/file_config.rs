//! Plain TOML configuration files.
//!
//! # Configuration File Format
//!
//! ```toml
//! [api_keys]
//! scopus = "your-elsevier-api-key"
//!
//! [fetch]
//! per_page = 0                # 0 = library default
//! queue_capacity = 100
//! request_timeout_secs = 30
//!
//! [[pacing]]
//! library = "scopus"
//! max_concurrent = 6
//!
//! [logging]
//! level = "info"
//! format = "text"             # or "json"
//! ```

use std::path::Path;

use super::Config;

impl Config {
    /// Load configuration from a TOML file, without environment overrides
    pub fn load_file(path: &Path) -> Result<Self, ConfigFileError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigFileError::Io(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigFileError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigFileError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigFileError::Serialize(e.to_string()))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigFileError::Io(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| ConfigFileError::Io(e.to_string()))
    }
}

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialize error: {0}")]
    Serialize(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
