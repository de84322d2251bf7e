//! Profile resolution: merging global build settings with per-configuration overrides.

use crate::error::ConfigError;
use crate::types::ProjectConfig;
use kiln_package::Platform;
use std::collections::BTreeMap;

/// Build settings for one configuration with profile overrides applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBuild {
    /// Platform being built for.
    pub platform: Platform,
    /// Configuration name.
    pub configuration: String,
    /// Toolchain identifier (profile overrides global).
    pub toolchain: String,
    /// Build command template, if any (profile overrides global).
    pub command: Option<String>,
    /// Merged settings (global base + profile overlay).
    pub settings: BTreeMap<String, String>,
}

/// Resolves the build settings for `configuration`, or the default configuration.
///
/// The requested name must be the default configuration or have a
/// `[profiles.<name>]` table.
pub fn resolve_build(
    config: &ProjectConfig,
    configuration: Option<&str>,
) -> Result<ResolvedBuild, ConfigError> {
    let build = &config.build;
    let name = configuration.unwrap_or(&build.configuration);
    let profile = config.profiles.get(name);
    if profile.is_none() && name != build.configuration {
        return Err(ConfigError::UnknownProfile(name.to_string()));
    }

    let mut settings = build.settings.clone();
    let mut toolchain = build.toolchain.clone();
    let mut command = build.command.clone();
    if let Some(profile) = profile {
        settings.extend(profile.settings.clone());
        if let Some(overridden) = &profile.toolchain {
            toolchain = overridden.clone();
        }
        if profile.command.is_some() {
            command = profile.command.clone();
        }
    }

    Ok(ResolvedBuild {
        platform: build.platform,
        configuration: name.to_string(),
        toolchain,
        command,
        settings,
    })
}
