//! `kiln gc`: delete cached artifacts no current target can reuse.

use crate::pipeline::{load_project, status};
use crate::{GlobalArgs, ProjectArgs};

/// Runs the `kiln gc` command.
///
/// Artifacts are live when their checksum matches a target of the current
/// graph under the selected configuration.
pub fn run(args: &ProjectArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = load_project(args, global)?;
    let keys = kiln_build::derive_keys(&project.graph)?;
    let live = keys
        .values()
        .map(|key| key.checksum())
        .collect::<Result<Vec<_>, _>>()?;
    let live_refs: Vec<&str> = live.iter().map(String::as_str).collect();

    let removed = project.store.gc(&live_refs)?;
    status(global, "Removed", format!("{removed} artifact(s)"));
    Ok(0)
}
