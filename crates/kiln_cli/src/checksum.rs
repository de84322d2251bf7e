//! `kiln checksum`: print every target's cache key checksum.

use serde_json::json;

use crate::pipeline::{describe, load_project};
use crate::{ChecksumArgs, GlobalArgs};

/// Runs the `kiln checksum` command.
///
/// Prints `<checksum>  <target>` per target in build order, or with `--json`
/// an object mapping each target to its checksum and full key.
pub fn run(args: &ChecksumArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = load_project(&args.project, global)?;
    let graph = &project.graph;
    let keys = kiln_build::derive_keys(graph)?;

    let mut order: Vec<_> = graph.layers()?.into_iter().flatten().collect();
    order.retain(|index| keys.contains_key(index));

    if args.json {
        let mut entries = serde_json::Map::new();
        for index in order {
            let key = &keys[&index];
            entries.insert(
                describe(graph, index),
                json!({ "checksum": key.checksum()?, "key": key }),
            );
        }
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(0);
    }

    for index in order {
        println!("{}  {}", keys[&index].checksum()?, describe(graph, index));
    }
    Ok(0)
}
