//! Configuration types deserialized from `kiln.toml`.

use kiln_package::Platform;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

/// The top-level project configuration parsed from `kiln.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Core project metadata (name, package description, lock file).
    pub project: ProjectMeta,
    /// Artifact cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Default build settings.
    #[serde(default)]
    pub build: BuildConfig,
    /// Per-configuration overrides (e.g., "release").
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileConfig>,
}

/// Core project metadata required in every `kiln.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectMeta {
    /// The project name.
    pub name: String,
    /// Path to the resolved package description, relative to the project root.
    #[serde(default = "default_packages")]
    pub packages: String,
    /// Path to the lock file, relative to the project root.
    #[serde(default)]
    pub lockfile: Option<String>,
}

fn default_packages() -> String {
    "packages.json".to_string()
}

/// Artifact cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Cache directory, relative to the project root.
    #[serde(default = "default_cache_dir")]
    pub dir: String,
    /// Maximum concurrent cache and build operations; omitted means unbounded.
    #[serde(default)]
    pub max_parallelism: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            max_parallelism: None,
        }
    }
}

fn default_cache_dir() -> String {
    ".kiln/cache".to_string()
}

/// Build configuration shared by every target.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildConfig {
    /// Platform to build for; defaults to the host platform.
    #[serde(default = "host_platform")]
    pub platform: Platform,
    /// Default build configuration name.
    #[serde(default = "default_configuration")]
    pub configuration: String,
    /// Toolchain identifier recorded in every cache key.
    #[serde(default = "default_toolchain")]
    pub toolchain: String,
    /// Directory artifacts are built into or fetched to.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Shell command building one target; `{target}` and `{output}` are substituted.
    #[serde(default)]
    pub command: Option<String>,
    /// Target names (or `package/target` identities) left out of the build.
    ///
    /// Accepts either a single string or a list of strings.
    #[serde(default, deserialize_with = "deserialize_string_or_vec")]
    pub exclude: Vec<String>,
    /// Whether test targets are built.
    #[serde(default)]
    pub include_tests: bool,
    /// Extra build settings recorded in every cache key.
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            platform: host_platform(),
            configuration: default_configuration(),
            toolchain: default_toolchain(),
            output_dir: default_output_dir(),
            command: None,
            exclude: Vec::new(),
            include_tests: false,
            settings: BTreeMap::new(),
        }
    }
}

/// Overrides applied on top of [`BuildConfig`] for one configuration name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileConfig {
    /// Toolchain override.
    #[serde(default)]
    pub toolchain: Option<String>,
    /// Build command override.
    #[serde(default)]
    pub command: Option<String>,
    /// Settings merged over the global build settings.
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

/// The platform the tool itself is running on.
pub fn host_platform() -> Platform {
    if cfg!(target_os = "macos") {
        Platform::Macos
    } else if cfg!(target_os = "windows") {
        Platform::Windows
    } else if cfg!(target_os = "android") {
        Platform::Android
    } else {
        Platform::Linux
    }
}

fn default_configuration() -> String {
    "debug".to_string()
}

fn default_toolchain() -> String {
    "default".to_string()
}

fn default_output_dir() -> String {
    ".kiln/build".to_string()
}

/// Deserializes a field that can be either a single string or a list of strings.
///
/// Allows TOML config to accept both `exclude = "Fixtures"` (string) and
/// `exclude = ["Fixtures", "Benchmarks"]` (array of strings).
fn deserialize_string_or_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct StringOrVec;

    impl<'de> Visitor<'de> for StringOrVec {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            formatter.write_str("a string or a list of strings")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(vec![v.to_string()])
        }

        fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut vec = Vec::new();
            while let Some(val) = seq.next_element::<String>()? {
                vec.push(val);
            }
            Ok(vec)
        }
    }

    deserializer.deserialize_any(StringOrVec)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ProjectConfig {
        toml::from_str(text).unwrap()
    }

    #[test]
    fn exclude_accepts_single_string() {
        let config = parse(
            r#"
[project]
name = "app"

[build]
exclude = "Fixtures"
"#,
        );
        assert_eq!(config.build.exclude, vec!["Fixtures"]);
    }

    #[test]
    fn exclude_accepts_list() {
        let config = parse(
            r#"
[project]
name = "app"

[build]
exclude = ["Fixtures", "swift-log/Logging"]
"#,
        );
        assert_eq!(config.build.exclude.len(), 2);
    }

    #[test]
    fn platform_parses_lowercase() {
        let config = parse(
            r#"
[project]
name = "app"

[build]
platform = "ios"
"#,
        );
        assert_eq!(config.build.platform, Platform::Ios);
    }

    #[test]
    fn unknown_platform_is_rejected() {
        let result: Result<ProjectConfig, _> = toml::from_str(
            r#"
[project]
name = "app"

[build]
platform = "amiga"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn defaults_are_filled_in() {
        let config = parse("[project]\nname = \"app\"\n");
        assert_eq!(config.project.packages, "packages.json");
        assert_eq!(config.cache.dir, ".kiln/cache");
        assert_eq!(config.cache.max_parallelism, None);
        assert_eq!(config.build.configuration, "debug");
        assert_eq!(config.build.output_dir, ".kiln/build");
        assert_eq!(config.build.platform, host_platform());
        assert!(!config.build.include_tests);
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn profiles_parse() {
        let config = parse(
            r#"
[project]
name = "app"

[profiles.release]
toolchain = "swift-5.10-release"

[profiles.release.settings]
OPTIMIZATION = "-O"
"#,
        );
        let release = &config.profiles["release"];
        assert_eq!(release.toolchain.as_deref(), Some("swift-5.10-release"));
        assert_eq!(release.settings["OPTIMIZATION"], "-O");
    }
}
