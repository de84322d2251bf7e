//! Flattening resolved packages into build-graph nodes.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use kiln_graph::{Graph, GraphError};
use tracing::debug;

use crate::error::PackageError;
use crate::model::{PackageIdentity, Platform, ResolvedPackage, ResolvedTarget, TargetDependency};

/// Globally unique name of a target: its package plus its target name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId {
    /// Owning package.
    pub package: PackageIdentity,
    /// Target name within the package.
    pub target: String,
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.package.identity, self.target)
    }
}

/// Settings shared by every target of one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    /// Platform being built for.
    pub platform: Platform,
    /// Build configuration (`debug`, `release`, ...).
    pub configuration: String,
    /// Toolchain identifier.
    pub toolchain: String,
    /// Extra build settings that affect outputs.
    pub settings: BTreeMap<String, String>,
}

impl BuildContext {
    /// Creates a context with no extra settings.
    pub fn new(
        platform: Platform,
        configuration: impl Into<String>,
        toolchain: impl Into<String>,
    ) -> Self {
        Self {
            platform,
            configuration: configuration.into(),
            toolchain: toolchain.into(),
            settings: BTreeMap::new(),
        }
    }
}

/// One buildable target together with everything needed to key and build it.
#[derive(Debug, Clone)]
pub struct TargetNode {
    /// Unique target name.
    pub id: TargetId,
    /// Checkout directory of the owning package.
    pub package_root: PathBuf,
    /// Resolved version of the owning package.
    pub package_version: Option<String>,
    /// The target as resolved.
    pub target: ResolvedTarget,
    /// Targets this one depends on on the context's platform.
    pub dependencies: Vec<TargetId>,
    /// Shared build settings.
    pub context: Arc<BuildContext>,
}

impl TargetNode {
    /// Unique target name.
    pub fn id(&self) -> &TargetId {
        &self.id
    }

    /// Targets this one depends on.
    pub fn dependencies(&self) -> &[TargetId] {
        &self.dependencies
    }
}

impl PartialEq for TargetNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// Turns resolved packages into one [`TargetNode`] per target.
///
/// Dependencies not applying to `context.platform` are dropped, and product
/// dependencies expand to every target the product exposes.
pub fn flatten_targets(
    packages: &[ResolvedPackage],
    context: BuildContext,
) -> Result<Vec<TargetNode>, PackageError> {
    let context = Arc::new(context);
    let mut by_identity: HashMap<String, &ResolvedPackage> = HashMap::new();
    for package in packages {
        if let Some(first) = by_identity.insert(package.identity.to_ascii_lowercase(), package) {
            return Err(PackageError::DuplicatePackage {
                identity: package.identity.clone(),
                first: first.origin.location(),
                second: package.origin.location(),
            });
        }
    }

    let mut nodes = Vec::new();
    for package in packages {
        let identity = package.package_identity();
        for target in &package.targets {
            let mut dependencies = Vec::new();
            for dependency in &target.dependencies {
                if !dependency.applies_to(context.platform) {
                    debug!(
                        target = %target.name,
                        platform = %context.platform,
                        "skipping dependency gated to other platforms"
                    );
                    continue;
                }
                for id in resolve_dependency(package, &identity, target, dependency, &by_identity)? {
                    if !dependencies.contains(&id) {
                        dependencies.push(id);
                    }
                }
            }

            nodes.push(TargetNode {
                id: TargetId {
                    package: identity.clone(),
                    target: target.name.clone(),
                },
                package_root: package.path.clone(),
                package_version: package.version.clone(),
                target: target.clone(),
                dependencies,
                context: Arc::clone(&context),
            });
        }
    }
    Ok(nodes)
}

fn resolve_dependency(
    package: &ResolvedPackage,
    identity: &PackageIdentity,
    target: &ResolvedTarget,
    dependency: &TargetDependency,
    by_identity: &HashMap<String, &ResolvedPackage>,
) -> Result<Vec<TargetId>, PackageError> {
    match dependency {
        TargetDependency::Target { name, .. } => {
            if package.target(name).is_none() {
                return Err(PackageError::UnknownTarget {
                    target: target.name.clone(),
                    dependency: name.clone(),
                });
            }
            Ok(vec![TargetId {
                package: identity.clone(),
                target: name.clone(),
            }])
        }
        TargetDependency::Product {
            name,
            package: vendor,
            ..
        } => {
            let vendor_package = by_identity
                .get(&vendor.to_ascii_lowercase())
                .ok_or_else(|| PackageError::UnknownPackage {
                    target: target.name.clone(),
                    package: vendor.clone(),
                })?;
            let product =
                vendor_package
                    .product(name)
                    .ok_or_else(|| PackageError::UnknownProduct {
                        target: target.name.clone(),
                        package: vendor.clone(),
                        product: name.clone(),
                    })?;

            let vendor_identity = vendor_package.package_identity();
            product
                .targets
                .iter()
                .map(|exposed| {
                    if vendor_package.target(exposed).is_none() {
                        return Err(PackageError::UnknownTarget {
                            target: product.name.clone(),
                            dependency: exposed.clone(),
                        });
                    }
                    Ok(TargetId {
                        package: vendor_identity.clone(),
                        target: exposed.clone(),
                    })
                })
                .collect()
        }
    }
}

/// Wires target nodes into a dependency graph.
pub fn build_graph(nodes: Vec<TargetNode>) -> Result<Graph<TargetNode>, GraphError> {
    Graph::resolve(
        nodes,
        |node| node.id.clone(),
        |node| node.dependencies.clone(),
    )
}
