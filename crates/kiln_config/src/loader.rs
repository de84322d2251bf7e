//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::ProjectConfig;
use std::path::{Path, PathBuf};

/// Name of the project configuration file.
pub const CONFIG_FILE: &str = "kiln.toml";

/// Loads and validates a `kiln.toml` configuration from a project directory.
pub fn load_config(project_dir: &Path) -> Result<ProjectConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE);
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `kiln.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<ProjectConfig, ConfigError> {
    let config: ProjectConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Walks up from `start` looking for the nearest directory containing `kiln.toml`.
pub fn find_project_root(start: &Path) -> Result<PathBuf, ConfigError> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(ConfigError::NotFound(start.to_path_buf()));
        }
    }
}

/// Validates that required fields are present and configuration values are consistent.
fn validate_config(config: &ProjectConfig) -> Result<(), ConfigError> {
    if config.project.name.trim().is_empty() {
        return Err(ConfigError::MissingField("project.name".to_string()));
    }
    if config.project.packages.trim().is_empty() {
        return Err(ConfigError::MissingField("project.packages".to_string()));
    }
    if config.cache.max_parallelism == Some(0) {
        return Err(ConfigError::ValidationError(
            "cache.max_parallelism must be at least 1".to_string(),
        ));
    }
    let commands = std::iter::once(&config.build.command)
        .chain(config.profiles.values().map(|p| &p.command))
        .flatten();
    for command in commands {
        if !command.contains("{target}") {
            return Err(ConfigError::ValidationError(format!(
                "build command `{command}` does not reference {{target}}"
            )));
        }
    }
    Ok(())
}
