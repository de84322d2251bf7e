//! `kiln build`: build the graph through the configured shell command.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Instant;

use kiln_build::{BuildError, Builder, NodeState, Orchestrator, Origin};
use kiln_cache::ArtifactStore;
use kiln_package::{Platform, TargetNode};
use tracing::debug;

use crate::pipeline::{describe, load_project, status};
use crate::{GlobalArgs, ProjectArgs};

/// Builds a target by running a shell command in its package directory.
///
/// `{target}` and `{output}` in the template are replaced with the target
/// name and the artifact path the command must write.
pub struct ShellBuilder {
    command: String,
    products_dir: PathBuf,
    configuration: String,
    platform: Platform,
}

impl ShellBuilder {
    /// Creates a builder writing artifacts under `output_dir/products`.
    pub fn new(
        command: impl Into<String>,
        output_dir: &Path,
        configuration: impl Into<String>,
        platform: Platform,
    ) -> Self {
        Self {
            command: command.into(),
            products_dir: output_dir.join("products"),
            configuration: configuration.into(),
            platform,
        }
    }

    /// Directory built and fetched artifacts share.
    pub fn products_dir(&self) -> &Path {
        &self.products_dir
    }

    fn output_path(&self, node: &TargetNode) -> PathBuf {
        self.products_dir
            .join(format!("{}-{}", node.id.package.identity, node.target.name))
    }
}

impl Builder<TargetNode> for ShellBuilder {
    fn build(&self, node: &TargetNode) -> Result<PathBuf, BuildError> {
        let fail = |message: String| BuildError::new(node.id.to_string(), message);

        let output = self.output_path(node);
        std::fs::create_dir_all(&self.products_dir)
            .map_err(|e| fail(format!("{}: {e}", self.products_dir.display())))?;
        if output.exists() {
            std::fs::remove_file(&output)
                .map_err(|e| fail(format!("{}: {e}", output.display())))?;
        }

        let script = self
            .command
            .replace("{target}", &node.target.name)
            .replace("{output}", &output.to_string_lossy());
        debug!(target_id = %node.id, %script, "running build command");

        let result = Command::new("sh")
            .arg("-c")
            .arg(&script)
            .current_dir(&node.package_root)
            .env("KILN_TARGET", &node.target.name)
            .env("KILN_PACKAGE", &node.id.package.identity)
            .env("KILN_CONFIGURATION", &self.configuration)
            .env("KILN_PLATFORM", self.platform.as_str())
            .env("KILN_OUTPUT", &output)
            .output()
            .map_err(|e| fail(format!("could not run `sh`: {e}")))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(fail(format!(
                "command exited with {}: {}",
                result.status,
                stderr.trim()
            )));
        }
        if !output.is_file() {
            return Err(fail(format!(
                "command did not produce {}",
                output.display()
            )));
        }
        Ok(output)
    }
}

/// Runs the `kiln build` command.
///
/// Returns exit code 1 when any target failed.
pub fn run(args: &ProjectArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let started = Instant::now();
    let project = load_project(args, global)?;
    let command = project
        .build
        .command
        .clone()
        .ok_or("no build command configured; set `command` under [build] or the profile")?;

    let output_dir = project.output_dir();
    let builder = ShellBuilder::new(
        command,
        &output_dir,
        project.build.configuration.clone(),
        project.build.platform,
    );
    let products_dir = builder.products_dir().to_path_buf();
    let store: Arc<dyn ArtifactStore> = project.store.clone();
    let orchestrator = Orchestrator::new(
        store,
        Arc::new(builder) as Arc<dyn Builder<TargetNode>>,
        products_dir,
    )?;
    let report = orchestrator.run(&project.graph);

    for (index, state) in report.states() {
        let name = describe(&project.graph, index);
        match state {
            NodeState::Done {
                origin: Origin::Cached,
                ..
            } => status(global, "Cached", name),
            NodeState::Done { .. } => status(global, "Compiled", name),
            NodeState::Failed(reason) => status(global, "Failed", format!("{name} ({reason:?})")),
            NodeState::Pending => status(global, "Skipped", name),
        }
    }

    if let Some(error) = report.first_error() {
        eprintln!("error: {error}");
        return Ok(1);
    }
    status(
        global,
        "Finished",
        format!(
            "{} `{}` target(s): {} compiled, {} cached in {:.2}s",
            report.states().count(),
            project.build.configuration,
            report.built().len(),
            report.cached().len(),
            started.elapsed().as_secs_f64()
        ),
    );
    Ok(0)
}
