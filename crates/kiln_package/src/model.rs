//! Resolved packages, targets, and products.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PackageError;

/// A platform a target can be built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// macOS.
    Macos,
    /// iOS.
    Ios,
    /// tvOS.
    Tvos,
    /// watchOS.
    Watchos,
    /// visionOS.
    Visionos,
    /// Linux.
    Linux,
    /// Windows.
    Windows,
    /// Android.
    Android,
}

impl Platform {
    /// Lowercase platform name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Macos => "macos",
            Self::Ios => "ios",
            Self::Tvos => "tvos",
            Self::Watchos => "watchos",
            Self::Visionos => "visionos",
            Self::Linux => "linux",
            Self::Windows => "windows",
            Self::Android => "android",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = PackageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "macos" => Ok(Self::Macos),
            "ios" => Ok(Self::Ios),
            "tvos" => Ok(Self::Tvos),
            "watchos" => Ok(Self::Watchos),
            "visionos" => Ok(Self::Visionos),
            "linux" => Ok(Self::Linux),
            "windows" => Ok(Self::Windows),
            "android" => Ok(Self::Android),
            _ => Err(PackageError::UnknownPlatform(s.to_string())),
        }
    }
}

/// Restricts a dependency to a set of platforms.
///
/// An empty set applies everywhere.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformCondition {
    /// Platforms the dependency applies to.
    #[serde(default)]
    pub platforms: BTreeSet<Platform>,
}

impl PlatformCondition {
    /// Returns `true` if the condition admits `platform`.
    pub fn includes(&self, platform: Platform) -> bool {
        self.platforms.is_empty() || self.platforms.contains(&platform)
    }
}

/// Where a package's sources come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PackageOrigin {
    /// The root package being built.
    Root {
        /// Package directory.
        path: PathBuf,
    },
    /// A local directory dependency.
    FileSystem {
        /// Package directory.
        path: PathBuf,
    },
    /// A local repository dependency.
    LocalSourceControl {
        /// Repository directory.
        path: PathBuf,
    },
    /// A remote repository dependency.
    RemoteSourceControl {
        /// Repository URL.
        url: String,
    },
    /// A registry dependency.
    Registry {
        /// Registry scope.
        scope: String,
        /// Package name within the scope.
        name: String,
    },
}

impl PackageOrigin {
    /// Canonical location string.
    ///
    /// Paths use `/` separators without a trailing slash; URLs are
    /// lower-cased and lose a trailing `/` or `.git`, so equivalent spellings
    /// of the same origin agree.
    pub fn location(&self) -> String {
        match self {
            Self::Root { path } | Self::FileSystem { path } | Self::LocalSourceControl { path } => {
                let text = path.to_string_lossy().replace('\\', "/");
                let trimmed = text.trim_end_matches('/');
                if trimmed.is_empty() {
                    text
                } else {
                    trimmed.to_string()
                }
            }
            Self::RemoteSourceControl { url } => {
                let lowered = url.trim().to_ascii_lowercase();
                let trimmed = lowered.trim_end_matches('/');
                trimmed.strip_suffix(".git").unwrap_or(trimmed).to_string()
            }
            Self::Registry { scope, name } => {
                format!("{}.{}", scope.to_ascii_lowercase(), name.to_ascii_lowercase())
            }
        }
    }

    /// Short name of the origin kind.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Root { .. } => "root",
            Self::FileSystem { .. } => "file-system",
            Self::LocalSourceControl { .. } => "local-source-control",
            Self::RemoteSourceControl { .. } => "remote-source-control",
            Self::Registry { .. } => "registry",
        }
    }
}

/// Stable identity of a package: its canonical location plus identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageIdentity {
    /// Canonical origin location.
    pub location: String,
    /// Package identity string (lower-cased).
    pub identity: String,
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identity)
    }
}

/// What a target is for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetRole {
    /// A library module.
    #[default]
    Regular,
    /// An executable.
    Executable,
    /// A test bundle.
    Test,
    /// A build-tool plugin.
    Plugin,
    /// A compiler macro.
    Macro,
}

impl TargetRole {
    /// Lowercase role name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Executable => "executable",
            Self::Test => "test",
            Self::Plugin => "plugin",
            Self::Macro => "macro",
        }
    }
}

/// How a target's module is produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModuleKind {
    /// Compiled from sources in the package.
    Source {
        /// Package-relative source paths; defaults to `Sources/<target>`.
        #[serde(default)]
        sources: Vec<PathBuf>,
    },
    /// A precompiled binary shipped with the package.
    Binary {
        /// Package-relative path of the binary artifact.
        artifact: PathBuf,
    },
    /// A module written in another language, exposed through headers.
    Foreign {
        /// Source language (`c`, `cxx`, `objc`, ...).
        language: String,
        /// Package-relative source paths; defaults to `Sources/<target>`.
        #[serde(default)]
        sources: Vec<PathBuf>,
        /// Package-relative public header directory.
        include_dir: PathBuf,
    },
}

impl ModuleKind {
    /// Short name of the module kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Source { .. } => "source",
            Self::Binary { .. } => "binary",
            Self::Foreign { .. } => "foreign",
        }
    }

    /// Package-relative paths whose contents determine the build output.
    pub fn inputs(&self, target_name: &str) -> Vec<PathBuf> {
        let default_sources = || vec![Path::new("Sources").join(target_name)];
        match self {
            Self::Source { sources } if sources.is_empty() => default_sources(),
            Self::Source { sources } => sources.clone(),
            Self::Binary { artifact } => vec![artifact.clone()],
            Self::Foreign {
                sources,
                include_dir,
                ..
            } => {
                let mut inputs = if sources.is_empty() {
                    default_sources()
                } else {
                    sources.clone()
                };
                if !inputs.iter().any(|p| include_dir.starts_with(p)) {
                    inputs.push(include_dir.clone());
                }
                inputs
            }
        }
    }
}

/// One dependency edge declared by a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TargetDependency {
    /// Another target in the same package.
    Target {
        /// Target name.
        name: String,
        /// Optional platform gate.
        #[serde(default)]
        condition: Option<PlatformCondition>,
    },
    /// A product vended by another package.
    Product {
        /// Product name.
        name: String,
        /// Identity of the vending package.
        package: String,
        /// Optional platform gate.
        #[serde(default)]
        condition: Option<PlatformCondition>,
    },
}

impl TargetDependency {
    /// Returns `true` if the dependency applies when building for `platform`.
    pub fn applies_to(&self, platform: Platform) -> bool {
        let condition = match self {
            Self::Target { condition, .. } | Self::Product { condition, .. } => condition,
        };
        condition.as_ref().map_or(true, |c| c.includes(platform))
    }
}

/// A compilation unit within a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTarget {
    /// Target name, unique within its package.
    pub name: String,
    /// What the target is for.
    #[serde(default)]
    pub role: TargetRole,
    /// How the module is produced.
    pub module: ModuleKind,
    /// Declared dependencies.
    #[serde(default)]
    pub dependencies: Vec<TargetDependency>,
}

/// Kind of product a package vends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductKind {
    /// A library other packages link against.
    #[default]
    Library,
    /// An executable.
    Executable,
    /// A plugin.
    Plugin,
}

/// A named group of targets vended to other packages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedProduct {
    /// Product name.
    pub name: String,
    /// Product kind.
    #[serde(default)]
    pub kind: ProductKind,
    /// Names of the targets the product exposes.
    pub targets: Vec<String>,
}

/// A package after dependency resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPackage {
    /// Package identity (usually the lower-cased last URL component).
    pub identity: String,
    /// Display name declared by the manifest.
    pub name: String,
    /// Where the package comes from.
    pub origin: PackageOrigin,
    /// Resolved version, if pinned to one.
    #[serde(default)]
    pub version: Option<String>,
    /// Checkout directory on disk.
    pub path: PathBuf,
    /// Targets declared by the package.
    #[serde(default)]
    pub targets: Vec<ResolvedTarget>,
    /// Products vended by the package.
    #[serde(default)]
    pub products: Vec<ResolvedProduct>,
}

impl ResolvedPackage {
    /// Identity used to tell packages apart across re-resolution.
    pub fn package_identity(&self) -> PackageIdentity {
        PackageIdentity {
            location: self.origin.location(),
            identity: self.identity.to_ascii_lowercase(),
        }
    }

    /// Looks up a target by name.
    pub fn target(&self, name: &str) -> Option<&ResolvedTarget> {
        self.targets.iter().find(|t| t.name == name)
    }

    /// Looks up a product by name.
    pub fn product(&self, name: &str) -> Option<&ResolvedProduct> {
        self.products.iter().find(|p| p.name == name)
    }
}

/// Reads a JSON array of resolved packages.
///
/// Relative package paths are resolved against the file's directory.
pub fn load_packages(path: &Path) -> Result<Vec<ResolvedPackage>, PackageError> {
    let content = std::fs::read_to_string(path).map_err(|e| PackageError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut packages: Vec<ResolvedPackage> =
        serde_json::from_str(&content).map_err(|e| PackageError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    for package in &mut packages {
        if package.path.is_relative() {
            package.path = base.join(&package.path);
        }
    }
    Ok(packages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_parse_and_display() {
        assert_eq!("macOS".parse::<Platform>().unwrap(), Platform::Macos);
        assert_eq!(Platform::Visionos.to_string(), "visionos");
        assert!(matches!(
            "amiga".parse::<Platform>(),
            Err(PackageError::UnknownPlatform(_))
        ));
    }

    #[test]
    fn empty_condition_applies_everywhere() {
        let condition = PlatformCondition::default();
        assert!(condition.includes(Platform::Linux));
    }

    #[test]
    fn condition_gates_platforms() {
        let condition = PlatformCondition {
            platforms: BTreeSet::from([Platform::Ios, Platform::Tvos]),
        };
        assert!(condition.includes(Platform::Ios));
        assert!(!condition.includes(Platform::Macos));
    }

    #[test]
    fn remote_location_is_normalized() {
        let a = PackageOrigin::RemoteSourceControl {
            url: "https://github.com/Apple/swift-log.git".to_string(),
        };
        let b = PackageOrigin::RemoteSourceControl {
            url: "https://github.com/apple/swift-log/".to_string(),
        };
        assert_eq!(a.location(), "https://github.com/apple/swift-log");
        assert_eq!(a.location(), b.location());
    }

    #[test]
    fn path_and_registry_locations() {
        let fs = PackageOrigin::FileSystem {
            path: PathBuf::from("/work/libs/core/"),
        };
        assert_eq!(fs.location(), "/work/libs/core");
        let registry = PackageOrigin::Registry {
            scope: "Apple".to_string(),
            name: "Swift-Log".to_string(),
        };
        assert_eq!(registry.location(), "apple.swift-log");
        assert_eq!(registry.kind_name(), "registry");
    }

    #[test]
    fn package_identity_is_stable_across_spellings() {
        let make = |url: &str, identity: &str| ResolvedPackage {
            identity: identity.to_string(),
            name: "swift-log".to_string(),
            origin: PackageOrigin::RemoteSourceControl {
                url: url.to_string(),
            },
            version: Some("1.5.4".to_string()),
            path: PathBuf::from("/tmp/checkouts/swift-log"),
            targets: vec![],
            products: vec![],
        };
        assert_eq!(
            make("https://github.com/apple/swift-log.git", "swift-log").package_identity(),
            make("https://github.com/apple/swift-log", "Swift-Log").package_identity()
        );
    }

    #[test]
    fn source_inputs_default_to_sources_dir() {
        let module = ModuleKind::Source { sources: vec![] };
        assert_eq!(module.inputs("Core"), vec![PathBuf::from("Sources/Core")]);
    }

    #[test]
    fn foreign_inputs_include_headers() {
        let module = ModuleKind::Foreign {
            language: "c".to_string(),
            sources: vec![PathBuf::from("Sources/CZlib/src")],
            include_dir: PathBuf::from("Sources/CZlib/include"),
        };
        assert_eq!(
            module.inputs("CZlib"),
            vec![
                PathBuf::from("Sources/CZlib/src"),
                PathBuf::from("Sources/CZlib/include")
            ]
        );

        let nested = ModuleKind::Foreign {
            language: "c".to_string(),
            sources: vec![],
            include_dir: PathBuf::from("Sources/CZlib/include"),
        };
        assert_eq!(nested.inputs("CZlib"), vec![PathBuf::from("Sources/CZlib")]);
    }

    #[test]
    fn dependency_json_shape() {
        let json = r#"[
            {"type": "target", "name": "Core"},
            {"type": "product", "name": "Logging", "package": "swift-log",
             "condition": {"platforms": ["linux"]}}
        ]"#;
        let deps: Vec<TargetDependency> = serde_json::from_str(json).unwrap();
        assert!(deps[0].applies_to(Platform::Macos));
        assert!(deps[1].applies_to(Platform::Linux));
        assert!(!deps[1].applies_to(Platform::Ios));
    }

    #[test]
    fn load_packages_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let json = r#"[{
            "identity": "app",
            "name": "App",
            "origin": {"kind": "root", "path": "."},
            "path": "app",
            "targets": [{"name": "App", "module": {"type": "source"}}]
        }]"#;
        let file = dir.path().join("packages.json");
        std::fs::write(&file, json).unwrap();

        let packages = load_packages(&file).unwrap();
        assert_eq!(packages[0].path, dir.path().join("app"));
        assert_eq!(packages[0].targets[0].role, TargetRole::Regular);
    }

    #[test]
    fn load_packages_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("packages.json");
        std::fs::write(&file, "{ not json").unwrap();
        assert!(matches!(
            load_packages(&file),
            Err(PackageError::Parse { .. })
        ));
    }
}
