// src/config/loader.rs
//! Layered configuration loader
//!
//! Precedence, lowest first: built-in defaults, each existing TOML file in
//! the search list, then `HALLKEY_<SECTION>__<KEY>` environment variables.

use crate::config::{constants::paths, SystemConfig};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    FileNotFound(String),
    #[error("configuration parse error: {0}")]
    ParseError(String),
    #[error("configuration validation errors: {}", .0.join("; "))]
    ValidationError(Vec<String>),
    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Configuration loader merging defaults, files and environment
pub struct ConfigLoader {
    config_paths: Vec<PathBuf>,
    env_prefix: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Loader with the standard search paths
    pub fn new() -> Self {
        Self {
            config_paths: Self::discover_config_paths(),
            env_prefix: paths::ENV_PREFIX.to_string(),
        }
    }

    /// Loader with custom paths
    pub fn with_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            config_paths: paths,
            env_prefix: paths::ENV_PREFIX.to_string(),
        }
    }

    /// Override the environment variable prefix
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Paths searched by this loader, lowest precedence first
    pub fn config_paths(&self) -> &[PathBuf] {
        &self.config_paths
    }

    /// Load, merge and validate the system configuration
    pub fn load_system_config(&self) -> Result<SystemConfig, ConfigError> {
        let mut merged = toml::Value::try_from(SystemConfig::default())
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        for path in &self.config_paths {
            if !path.exists() {
                continue;
            }
            let overlay = Self::load_config_file(path)?;
            debug!(path = %path.display(), "merging configuration file");
            Self::merge_toml_values(&mut merged, overlay);
        }

        self.apply_environment_overrides(&mut merged, std::env::vars());

        let config: SystemConfig = merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError(e.to_string()))?;

        config.validate_consistency().map_err(ConfigError::ValidationError)?;

        info!(summary = ?config.get_summary(), "configuration loaded");
        Ok(config)
    }

    /// Validate a single file without loading it as the active config
    pub fn validate_config_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: SystemConfig = toml::from_str(&content)?;
        config.validate_consistency().map_err(ConfigError::ValidationError)
    }

    /// Export a configuration to a TOML file
    pub fn export_config<P: AsRef<Path>>(config: &SystemConfig, path: P) -> Result<(), ConfigError> {
        let toml_content =
            toml::to_string_pretty(config).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    fn discover_config_paths() -> Vec<PathBuf> {
        let mut found = Vec::new();

        if let Some(home) = std::env::var_os("HOME") {
            found.push(
                PathBuf::from(home)
                    .join(paths::USER_CONFIG_DIR)
                    .join(paths::DEFAULT_CONFIG_FILE),
            );
        }
        found.push(PathBuf::from(paths::DEFAULT_CONFIG_FILE));

        found
    }

    fn load_config_file(path: &Path) -> Result<toml::Value, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    fn merge_toml_values(base: &mut toml::Value, overlay: toml::Value) {
        match (base, overlay) {
            (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
                for (key, value) in overlay_table {
                    if let Some(base_value) = base_table.get_mut(&key) {
                        Self::merge_toml_values(base_value, value);
                    } else {
                        base_table.insert(key, value);
                    }
                }
            }
            (base_value, overlay_value) => {
                *base_value = overlay_value;
            }
        }
    }

    /// `HALLKEY_HOST__QUEUE_CAPACITY=64` sets `host.queue_capacity`
    fn apply_environment_overrides(
        &self,
        config: &mut toml::Value,
        vars: impl Iterator<Item = (String, String)>,
    ) {
        for (key, value) in vars {
            let Some(rest) = key.strip_prefix(&self.env_prefix) else {
                continue;
            };
            let Some((section, field)) = rest.split_once(paths::ENV_SECTION_SEPARATOR) else {
                continue;
            };
            let section = section.to_lowercase();
            let field = field.to_lowercase();

            if let toml::Value::Table(root) = config {
                let entry = root
                    .entry(section.clone())
                    .or_insert_with(|| toml::Value::Table(toml::value::Table::new()));
                if let toml::Value::Table(table) = entry {
                    debug!(section = %section, field = %field, "environment override");
                    // String fields keep the raw text, so "2024" stays a directory name
                    let parsed = match table.get(&field) {
                        Some(toml::Value::String(_)) => toml::Value::String(value),
                        _ => Self::parse_env_value(&value),
                    };
                    table.insert(field, parsed);
                }
            }
        }
    }

    fn parse_env_value(value: &str) -> toml::Value {
        if let Ok(int_val) = value.parse::<i64>() {
            toml::Value::Integer(int_val)
        } else if let Ok(float_val) = value.parse::<f64>() {
            toml::Value::Float(float_val)
        } else if let Ok(bool_val) = value.parse::<bool>() {
            toml::Value::Boolean(bool_val)
        } else {
            toml::Value::String(value.to_string())
        }
    }
}
