//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::overrides::ConfigOverrides;
use crate::config::schema::ServiceConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ServiceConfig, ConfigError> {
    parse_config_with(content, &ConfigOverrides::default())
}

/// Parse TOML text, apply `overrides`, then validate the result.
///
/// Validation runs once, after the overrides, so an override can replace
/// a file value that would fail on its own.
pub fn parse_config_with(
    content: &str,
    overrides: &ConfigOverrides,
) -> Result<ServiceConfig, ConfigError> {
    let mut config: ServiceConfig = toml::from_str(content)?;
    overrides.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    load_config_with(path, &ConfigOverrides::default())
}

/// Load a TOML file with `overrides` applied before validation.
pub fn load_config_with(
    path: &Path,
    overrides: &ConfigOverrides,
) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config_with(&content, overrides)
}
