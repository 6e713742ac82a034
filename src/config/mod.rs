//! Configuration management.

mod file_config;

pub use file_config::ConfigFileError;

use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::acquire::DEFAULT_QUEUE_CAPACITY;
use crate::library::Pacing;
use crate::utils::DEFAULT_TIMEOUT;

/// File name looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "research-harvest.toml";

/// Prefix of environment variables overriding file settings
pub const ENV_PREFIX: &str = "RESEARCH_HARVEST";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API keys for literature libraries
    pub api_keys: ApiKeys,

    /// Run settings
    pub fetch: FetchConfig,

    /// Per-library pacing overrides
    pub pacing: Vec<PacingOverride>,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// API keys for literature libraries
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeys {
    /// Elsevier API key used by the Scopus library
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopus: Option<String>,
}

impl Default for ApiKeys {
    fn default() -> Self {
        Self {
            scopus: std::env::var("SCOPUS_API_KEY").ok(),
        }
    }
}

/// Run settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Page size; 0 leaves the choice to the library
    pub per_page: usize,

    /// Publications buffered between fetch tasks and the consumer
    pub queue_capacity: usize,

    /// Whole-request timeout for library HTTP calls
    pub request_timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            per_page: 0,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            request_timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl FetchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Pacing override for one library.
///
/// Exactly one of `max_concurrent` and `min_interval_ms` must be set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacingOverride {
    pub library: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_interval_ms: Option<u64>,
}

impl PacingOverride {
    pub fn to_pacing(&self) -> Result<Pacing, ConfigFileError> {
        match (self.max_concurrent, self.min_interval_ms) {
            (Some(n), None) => NonZeroUsize::new(n).map(Pacing::MaxConcurrent).ok_or_else(|| {
                ConfigFileError::Invalid(format!(
                    "pacing for '{}': max_concurrent must be at least 1",
                    self.library
                ))
            }),
            (None, Some(ms)) => Ok(Pacing::MinInterval(Duration::from_millis(ms))),
            _ => Err(ConfigFileError::Invalid(format!(
                "pacing for '{}': set exactly one of max_concurrent and min_interval_ms",
                self.library
            ))),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl Config {
    /// Pacing override configured for `library`, if any
    pub fn pacing_for(&self, library: &str) -> Result<Option<Pacing>, ConfigFileError> {
        self.pacing
            .iter()
            .find(|o| o.library == library)
            .map(PacingOverride::to_pacing)
            .transpose()
    }

    /// Check settings that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigFileError> {
        if self.fetch.queue_capacity == 0 {
            return Err(ConfigFileError::Invalid(
                "fetch.queue_capacity must be at least 1".to_string(),
            ));
        }
        for o in &self.pacing {
            o.to_pacing()?;
        }
        Ok(())
    }
}

/// Load configuration from a TOML file layered under `RESEARCH_HARVEST_*`
/// environment variables (`RESEARCH_HARVEST_FETCH__PER_PAGE=50`).
pub fn load_config(path: &Path) -> Result<Config, ConfigFileError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| ConfigFileError::Parse(e.to_string()))?;

    let config: Config = settings
        .try_deserialize()
        .map_err(|e| ConfigFileError::Parse(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Find a configuration file in the working directory or the user config dir
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }
    default_config_path().filter(|p| p.is_file())
}

/// Per-user configuration path, e.g. `~/.config/research-harvest/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("research-harvest").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.fetch.per_page, 0);
        assert_eq!(config.fetch.queue_capacity, 100);
        assert_eq!(config.fetch.request_timeout(), DEFAULT_TIMEOUT);
        assert_eq!(config.logging.format, LogFormat::Text);
        assert!(config.pacing.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pacing_override() {
        let slots = PacingOverride {
            library: "scopus".to_string(),
            max_concurrent: Some(3),
            min_interval_ms: None,
        };
        assert_eq!(
            slots.to_pacing().unwrap(),
            Pacing::MaxConcurrent(NonZeroUsize::new(3).unwrap())
        );

        let ticker = PacingOverride {
            library: "scopus".to_string(),
            max_concurrent: None,
            min_interval_ms: Some(166),
        };
        assert_eq!(
            ticker.to_pacing().unwrap(),
            Pacing::MinInterval(Duration::from_millis(166))
        );
    }

    #[test]
    fn test_pacing_override_needs_exactly_one() {
        let both = PacingOverride {
            library: "scopus".to_string(),
            max_concurrent: Some(3),
            min_interval_ms: Some(100),
        };
        assert!(matches!(both.to_pacing(), Err(ConfigFileError::Invalid(_))));

        let neither = PacingOverride {
            library: "scopus".to_string(),
            max_concurrent: None,
            min_interval_ms: None,
        };
        assert!(neither.to_pacing().is_err());

        let zero = PacingOverride {
            library: "scopus".to_string(),
            max_concurrent: Some(0),
            min_interval_ms: None,
        };
        assert!(zero.to_pacing().is_err());
    }

    #[test]
    fn test_pacing_for() {
        let mut config = Config::default();
        config.pacing.push(PacingOverride {
            library: "scopus".to_string(),
            max_concurrent: Some(2),
            min_interval_ms: None,
        });

        assert_eq!(
            config.pacing_for("scopus").unwrap(),
            Some(Pacing::MaxConcurrent(NonZeroUsize::new(2).unwrap()))
        );
        assert_eq!(config.pacing_for("mock").unwrap(), None);
    }

    #[test]
    fn test_load_config_with_env_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[fetch]
per_page = 50
request_timeout_secs = 10

[[pacing]]
library = "scopus"
min_interval_ms = 200

[logging]
level = "debug"
format = "json"
"#,
        )
        .unwrap();

        std::env::set_var("RESEARCH_HARVEST_FETCH__REQUEST_TIMEOUT_SECS", "45");
        let config = load_config(&path).unwrap();
        std::env::remove_var("RESEARCH_HARVEST_FETCH__REQUEST_TIMEOUT_SECS");

        assert_eq!(config.fetch.per_page, 50);
        assert_eq!(config.fetch.request_timeout_secs, 45);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(
            config.pacing_for("scopus").unwrap(),
            Some(Pacing::MinInterval(Duration::from_millis(200)))
        );
    }

    #[test]
    fn test_load_config_rejects_bad_pacing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[[pacing]]\nlibrary = \"scopus\"\nmax_concurrent = 2\nmin_interval_ms = 10\n",
        )
        .unwrap();

        assert!(matches!(load_config(&path), Err(ConfigFileError::Invalid(_))));
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config(Path::new("/nonexistent/research-harvest.toml"));
        assert!(matches!(result, Err(ConfigFileError::Parse(_))));
    }
}
