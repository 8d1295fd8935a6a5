//! TOML configuration
//!
//! ```toml
//! [database]
//! path = "erp.db"
//!
//! [numbering]
//! offer_prefix = "OF"
//! order_prefix = "OR"
//! digits = 5
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Every section and key is optional and falls back to the values above.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Parse(String),
    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err.message().to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub numbering: Numbering,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

/// Document number layout: `<prefix>-<year>-<sequence>`, the sequence padded to
/// `digits` places and counted per company, kind and year.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Numbering {
    pub offer_prefix: String,
    pub order_prefix: String,
    pub digits: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("erp.db"),
        }
    }
}

impl Default for Numbering {
    fn default() -> Self {
        Self {
            offer_prefix: "OF".into(),
            order_prefix: "OR".into(),
            digits: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl Numbering {
    pub fn format(&self, prefix: &str, year: i32, sequence: u64) -> String {
        format!("{prefix}-{year}-{sequence:0width$}", width = self.digits)
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Validation("database.path must not be empty".into()));
        }
        for (key, prefix) in [
            ("numbering.offer_prefix", &self.numbering.offer_prefix),
            ("numbering.order_prefix", &self.numbering.order_prefix),
        ] {
            if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(ConfigError::Validation(format!(
                    "{key} must be non-empty and ASCII alphanumeric, got '{prefix}'"
                )));
            }
        }
        if !(1..=9).contains(&self.numbering.digits) {
            return Err(ConfigError::Validation(format!(
                "numbering.digits must be between 1 and 9, got {}",
                self.numbering.digits
            )));
        }
        Ok(())
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config: Config = "".parse().unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_sections() {
        let config: Config = r#"
            [numbering]
            order_prefix = "AU"

            [logging]
            level = "debug"
        "#
        .parse()
        .unwrap();

        assert_eq!(config.numbering.order_prefix, "AU");
        assert_eq!(config.numbering.offer_prefix, "OF");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn rejects_bad_prefix_and_digits() {
        let err = "[numbering]\noffer_prefix = \"O-F\"".parse::<Config>().unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));

        let err = "[numbering]\ndigits = 0".parse::<Config>().unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = "[database\npath = 1".parse::<Config>().unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn number_format() {
        let n = Numbering::default();
        assert_eq!(n.format("OR", 2026, 42), "OR-2026-00042");
    }
}
