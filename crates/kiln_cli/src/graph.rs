//! `kiln graph`: print the pruned build graph in build order.

use crate::pipeline::{describe, load_project};
use crate::{GlobalArgs, GraphArgs};

/// Runs the `kiln graph` command.
///
/// Prints one line per layer, dependencies first, or a JSON array of layers
/// with `--json`.
pub fn run(args: &GraphArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = load_project(&args.project, global)?;
    let graph = &project.graph;
    let layers: Vec<Vec<String>> = graph
        .layers()?
        .into_iter()
        .map(|layer| layer.into_iter().map(|index| describe(graph, index)).collect())
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&layers)?);
        return Ok(0);
    }

    for (depth, layer) in layers.iter().enumerate() {
        println!("{depth:>3}  {}", layer.join(", "));
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::{global_for, project};
    use crate::ProjectArgs;

    #[test]
    fn graph_command_succeeds() {
        let tmp = project("[project]\nname = \"app\"\n");
        let args = GraphArgs {
            project: ProjectArgs::default(),
            json: true,
        };
        assert_eq!(run(&args, &global_for(tmp.path())).unwrap(), 0);
    }

    #[test]
    fn graph_command_reports_missing_packages() {
        let tmp = project("[project]\nname = \"app\"\npackages = \"missing.json\"\n");
        let args = GraphArgs {
            project: ProjectArgs::default(),
            json: false,
        };
        assert!(run(&args, &global_for(tmp.path())).is_err());
    }
}
