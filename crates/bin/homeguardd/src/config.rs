//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `homeguard.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Item definitions source.
    pub items: ItemsConfig,
    /// Settings persistence.
    pub store: StoreConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Where the item definitions live.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ItemsConfig {
    /// Path to the items TOML file.
    pub path: String,
}

/// Where persisted settings snapshots are written.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory for the per-category snapshot files.
    pub path: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Config {
    /// Load configuration from `homeguard.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or fails
    /// validation.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("homeguard.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("HOMEGUARD_ITEMS") {
            self.items.path = val;
        }
        if let Ok(val) = std::env::var("HOMEGUARD_STORE") {
            self.store.path = val;
        }
        if let Ok(val) = std::env::var("HOMEGUARD_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.items.path.is_empty() {
            return Err(ConfigError::Validation(
                "items path must not be empty".to_string(),
            ));
        }
        if self.store.path.is_empty() {
            return Err(ConfigError::Validation(
                "store path must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ItemsConfig {
    fn default() -> Self {
        Self {
            path: "items.toml".to_string(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "settings".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "homeguardd=info,homeguard=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.items.path, "items.toml");
        assert_eq!(config.store.path, "settings");
        assert_eq!(config.logging.filter, "homeguardd=info,homeguard=info");
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.items.path, "items.toml");
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [items]
            path = 'dwelling.toml'

            [store]
            path = '/var/lib/homeguard'

            [logging]
            filter = 'debug'
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.items.path, "dwelling.toml");
        assert_eq!(config.store.path, "/var/lib/homeguard");
        assert_eq!(config.logging.filter, "debug");
    }

    #[test]
    fn should_parse_partial_toml_with_defaults() {
        let toml = "
            [logging]
            filter = 'trace'
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.logging.filter, "trace");
        assert_eq!(config.items.path, "items.toml");
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.items.path, "items.toml");
    }

    #[test]
    fn should_reject_empty_items_path() {
        let mut config = Config::default();
        config.items.path = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }
}
