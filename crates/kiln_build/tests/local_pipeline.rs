//! Package targets through the file-system store, end to end.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use kiln_build::{BuildError, Builder, MissReason, NodeState, Orchestrator, Origin};
use kiln_cache::{ArtifactStore, LocalStore};
use kiln_common::Checksum;
use kiln_graph::{Graph, NodeIndex};
use kiln_package::{
    build_graph, flatten_targets, BuildContext, ModuleKind, PackageOrigin, Platform,
    ResolvedPackage, ResolvedTarget, TargetDependency, TargetNode, TargetRole,
};

/// Concatenates a target's sources into `<out>/<target>.a`.
#[derive(Default)]
struct ConcatBuilder {
    out: PathBuf,
    delay: Duration,
    builds: Mutex<HashMap<String, usize>>,
}

impl ConcatBuilder {
    fn new(out: PathBuf) -> Self {
        Self {
            out,
            ..Self::default()
        }
    }

    fn count(&self, target: &str) -> usize {
        self.builds.lock().unwrap().get(target).copied().unwrap_or(0)
    }
}

impl Builder<TargetNode> for ConcatBuilder {
    fn build(&self, node: &TargetNode) -> Result<PathBuf, BuildError> {
        let fail = |e: std::io::Error| BuildError::new(node.id.to_string(), e.to_string());
        *self
            .builds
            .lock()
            .unwrap()
            .entry(node.target.name.clone())
            .or_default() += 1;
        thread::sleep(self.delay);
        let dir = node.package_root.join("Sources").join(&node.target.name);
        let mut entries: Vec<_> = std::fs::read_dir(&dir)
            .map_err(fail)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<_, _>>()
            .map_err(fail)?;
        entries.sort();

        let mut payload = Vec::new();
        for path in entries {
            payload.extend(std::fs::read(path).map_err(fail)?);
        }
        std::fs::create_dir_all(&self.out).map_err(fail)?;
        let artifact = self.out.join(format!("{}.a", node.target.name));
        std::fs::write(&artifact, payload).map_err(fail)?;
        Ok(artifact)
    }
}

fn target(name: &str, deps: &[&str]) -> ResolvedTarget {
    ResolvedTarget {
        name: name.to_string(),
        role: TargetRole::Regular,
        module: ModuleKind::Source { sources: vec![] },
        dependencies: deps
            .iter()
            .map(|d| TargetDependency::Target {
                name: d.to_string(),
                condition: None,
            })
            .collect(),
    }
}

fn write_source(root: &Path, target: &str, text: &str) {
    let dir = root.join("Sources").join(target);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(format!("{target}.swift")), text).unwrap();
}

fn package(root: &Path) -> ResolvedPackage {
    ResolvedPackage {
        identity: "app".to_string(),
        name: "App".to_string(),
        origin: PackageOrigin::Root {
            path: root.to_path_buf(),
        },
        version: None,
        path: root.to_path_buf(),
        targets: vec![
            target("Base", &[]),
            target("Mid", &["Base"]),
            target("Top", &["Mid"]),
        ],
        products: vec![],
    }
}

fn graph(root: &Path) -> Graph<TargetNode> {
    let nodes = flatten_targets(
        &[package(root)],
        BuildContext::new(Platform::Linux, "debug", "5.10"),
    )
    .unwrap();
    build_graph(nodes).unwrap()
}

fn orchestrator(cache: &Path, out: &Path) -> Orchestrator<TargetNode> {
    Orchestrator::new(
        Arc::new(LocalStore::new(cache)) as Arc<dyn ArtifactStore>,
        Arc::new(ConcatBuilder::new(out.join("build"))) as Arc<dyn Builder<TargetNode>>,
        out.join("fetched"),
    )
    .unwrap()
}

fn origin_of(report: &kiln_build::BuildReport, graph: &Graph<TargetNode>, name: &str) -> Origin {
    let index: NodeIndex = graph
        .iter()
        .find(|(_, node)| node.target.name == name)
        .map(|(index, _)| index)
        .unwrap();
    match report.state(index) {
        Some(NodeState::Done { origin, .. }) => *origin,
        other => panic!("{name} not done: {other:?}"),
    }
}

#[test]
fn second_run_fetches_everything() {
    let work = tempfile::tempdir().unwrap();
    let root = work.path().join("app");
    for name in ["Base", "Mid", "Top"] {
        write_source(&root, name, &format!("struct {name} {{}}"));
    }
    let cache = work.path().join("cache");
    let out = work.path().join("out");

    let first = orchestrator(&cache, &out).run(&graph(&root));
    assert!(first.is_success());
    assert_eq!(first.built().len(), 3);

    let second = orchestrator(&cache, &out).run(&graph(&root));
    assert!(second.is_success());
    assert_eq!(second.cached().len(), 3);

    let fetched = out.join("fetched").join("Mid.a");
    assert_eq!(
        Checksum::from_bytes(&std::fs::read(fetched).unwrap()),
        Checksum::from_bytes(b"struct Mid {}")
    );
}

#[test]
fn source_edit_rebuilds_target_and_dependents() {
    let work = tempfile::tempdir().unwrap();
    let root = work.path().join("app");
    for name in ["Base", "Mid", "Top"] {
        write_source(&root, name, &format!("struct {name} {{}}"));
    }
    let cache = work.path().join("cache");
    let out = work.path().join("out");
    assert!(orchestrator(&cache, &out).run(&graph(&root)).is_success());

    write_source(&root, "Mid", "struct Mid { let base: Base }");
    let g = graph(&root);
    let report = orchestrator(&cache, &out).run(&g);

    assert!(report.is_success());
    assert_eq!(origin_of(&report, &g, "Base"), Origin::Cached);
    assert_eq!(
        origin_of(&report, &g, "Mid"),
        Origin::Built(MissReason::NotCached)
    );
    assert_eq!(
        origin_of(&report, &g, "Top"),
        Origin::Built(MissReason::DependencyRebuilt)
    );
}

#[test]
fn missing_sources_fail_key_derivation() {
    let work = tempfile::tempdir().unwrap();
    let root = work.path().join("app");
    write_source(&root, "Base", "struct Base {}");
    write_source(&root, "Top", "struct Top {}");
    let g = graph(&root);

    let report = orchestrator(&work.path().join("cache"), &work.path().join("out")).run(&g);

    assert!(matches!(
        report.first_error(),
        Some(kiln_build::OrchestratorError::KeyDerivation { target, .. }) if target == "app/Mid"
    ));
    assert_eq!(report.failed().len(), 2);
}

#[test]
fn separate_store_handles_build_each_target_once() {
    let work = tempfile::tempdir().unwrap();
    let root = work.path().join("app");
    for name in ["Base", "Mid", "Top"] {
        write_source(&root, name, &format!("struct {name} {{}}"));
    }
    let cache = work.path().join("cache");
    let builder = Arc::new(ConcatBuilder {
        out: work.path().join("build"),
        delay: Duration::from_millis(30),
        ..ConcatBuilder::default()
    });

    // Two store handles over one directory stand in for two processes.
    let orchestrators: Vec<Orchestrator<TargetNode>> = ["one", "two"]
        .into_iter()
        .map(|name| {
            Orchestrator::new(
                Arc::new(LocalStore::new(&cache)) as Arc<dyn ArtifactStore>,
                Arc::clone(&builder) as Arc<dyn Builder<TargetNode>>,
                work.path().join(name),
            )
            .unwrap()
        })
        .collect();
    let g = &graph(&root);

    let reports: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = orchestrators
            .iter()
            .map(|o| s.spawn(move || o.run(g)))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(reports.iter().all(|r| r.is_success()));
    for name in ["Base", "Mid", "Top"] {
        assert_eq!(builder.count(name), 1, "{name} built more than once");
    }
    let fetched = ["one", "two"]
        .iter()
        .filter(|name| work.path().join(name).join("Top.a").exists())
        .count();
    assert_eq!(fetched, 1);
}
