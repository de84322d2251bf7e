//! Shared pipeline helpers for CLI commands.
//!
//! Contains the steps every command starts with: project root resolution,
//! configuration and package loading, graph construction, and pruning.

use std::path::PathBuf;
use std::sync::Arc;

use kiln_cache::{LocalStore, Parallelism};
use kiln_config::{ProjectConfig, ResolvedBuild};
use kiln_graph::{Graph, NodeIndex};
use kiln_package::{
    build_graph, flatten_targets, load_packages, resolve_with_cache, BuildContext,
    PackageResolved, ResolutionSource, TargetNode, TargetRole,
};
use tracing::{debug, warn};

use crate::{GlobalArgs, ProjectArgs};

/// Everything a command needs about the current project.
pub struct Project {
    /// Directory containing `kiln.toml`.
    pub root: PathBuf,
    /// Parsed configuration.
    pub config: ProjectConfig,
    /// Build settings for the selected configuration.
    pub build: ResolvedBuild,
    /// The project's artifact and resolution cache.
    pub store: Arc<LocalStore>,
    /// Pruned target graph.
    pub graph: Graph<TargetNode>,
}

impl Project {
    /// Output directory, resolved against the project root.
    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.config.build.output_dir)
    }
}

/// Prints a right-aligned status line to stderr unless `--quiet` is set.
pub fn status(global: &GlobalArgs, verb: &str, message: impl std::fmt::Display) {
    if !global.quiet {
        eprintln!("{verb:>12} {message}");
    }
}

/// Resolves the project root directory from global CLI args.
///
/// If `--config` is specified, uses that path (file → parent dir, dir → itself).
/// Otherwise walks up from the current directory looking for `kiln.toml`.
pub fn resolve_project_root(global: &GlobalArgs) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(ref config_path) = global.config {
        let p = PathBuf::from(config_path);
        if p.is_file() {
            Ok(p.parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".")))
        } else {
            Ok(p)
        }
    } else {
        Ok(kiln_config::find_project_root(&std::env::current_dir()?)?)
    }
}

/// Loads the project and builds its pruned target graph.
pub fn load_project(
    args: &ProjectArgs,
    global: &GlobalArgs,
) -> Result<Project, Box<dyn std::error::Error>> {
    let root = resolve_project_root(global)?;
    let config = kiln_config::load_config(&root)?;
    let build = kiln_config::resolve_build(&config, args.configuration.as_deref())?;

    let parallelism = Parallelism::bounded(config.cache.max_parallelism.unwrap_or(0));
    let store =
        Arc::new(LocalStore::new(&root.join(&config.cache.dir)).with_max_parallelism(parallelism));

    let packages_path = root.join(&config.project.packages);
    let packages = match &config.project.lockfile {
        Some(lockfile) => {
            let lock = PackageResolved::load(&root.join(lockfile))?;
            let (packages, source) =
                resolve_with_cache(store.as_ref(), &lock, || load_packages(&packages_path))?;
            if source == ResolutionSource::Cache {
                status(global, "Resolved", "dependencies from cache");
            }
            packages
        }
        None => load_packages(&packages_path)?,
    };

    let context = BuildContext {
        platform: build.platform,
        configuration: build.configuration.clone(),
        toolchain: build.toolchain.clone(),
        settings: build.settings.clone(),
    };
    let graph = build_graph(flatten_targets(&packages, context)?)?;

    let mut exclude = config.build.exclude.clone();
    exclude.extend(args.exclude.iter().cloned());
    let include_tests = args.include_tests || config.build.include_tests;
    let graph = prune(graph, &exclude, include_tests);
    debug!(targets = graph.len(), "loaded target graph");

    Ok(Project {
        root,
        config,
        build,
        store,
        graph,
    })
}

/// Drops test targets (unless `include_tests`) and every excluded target.
///
/// Exclusions match either a bare target name or a `package/target`
/// identity. Dependents of a removed target are wired to its dependencies.
pub fn prune(
    graph: Graph<TargetNode>,
    exclude: &[String],
    include_tests: bool,
) -> Graph<TargetNode> {
    let mut graph = graph.filter(|node| include_tests || node.target.role != TargetRole::Test);

    let hits = |node: &TargetNode, pattern: &str| {
        node.target.name == pattern || node.id.to_string() == pattern
    };
    for pattern in exclude {
        if !graph.iter().any(|(_, node)| hits(node, pattern.as_str())) {
            warn!(%pattern, "exclusion matches no target");
        }
    }
    let doomed: Vec<NodeIndex> = graph
        .iter()
        .filter(|(_, node)| exclude.iter().any(|pattern| hits(node, pattern.as_str())))
        .map(|(index, _)| index)
        .collect();
    graph.remove(doomed);
    graph
}

/// Identity of a node for display; empty for removed indices.
pub fn describe(graph: &Graph<TargetNode>, index: NodeIndex) -> String {
    graph
        .value(index)
        .map(|node| node.id.to_string())
        .unwrap_or_default()
}
