//! Kiln CLI: the command-line interface for the Kiln incremental build core.
//!
//! Provides `kiln graph` to inspect the pruned build graph, `kiln checksum` to
//! print every target's cache key, `kiln build` to build with artifact reuse,
//! and `kiln gc` to drop artifacts no current target can use.

#![warn(missing_docs)]

mod build;
mod checksum;
mod gc;
mod graph;
mod pipeline;

use std::process;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Kiln: content-addressed incremental builds for package graphs.
#[derive(Parser, Debug)]
#[command(name = "kiln", version, about = "Kiln incremental build core")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a custom `kiln.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the build graph layer by layer, dependencies first.
    Graph(GraphArgs),
    /// Print the cache-key checksum of every target.
    Checksum(ChecksumArgs),
    /// Build every target, reusing cached artifacts.
    Build(ProjectArgs),
    /// Delete cached artifacts no current target uses.
    Gc(ProjectArgs),
}

/// Options selecting which targets are loaded and how they are keyed.
#[derive(Args, Debug, Default)]
pub struct ProjectArgs {
    /// Build configuration (profile) to use instead of the default.
    #[arg(short = 'c', long)]
    pub configuration: Option<String>,

    /// Extra target names or `package/target` identities to leave out.
    #[arg(long, num_args = 1..)]
    pub exclude: Vec<String>,

    /// Build test targets too.
    #[arg(long)]
    pub include_tests: bool,
}

/// Arguments for the `kiln graph` subcommand.
#[derive(Args, Debug)]
pub struct GraphArgs {
    /// Target selection.
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Print the layers as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `kiln checksum` subcommand.
#[derive(Args, Debug)]
pub struct ChecksumArgs {
    /// Target selection.
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Print the full cache keys as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Optional path to a custom config file.
    pub config: Option<String>,
}

/// Installs the log subscriber.
///
/// `--verbose` and `--quiet` win over `KILN_LOG`, which wins over the
/// `warn` default.
fn init_logging(global: &GlobalArgs) {
    let filter = if global.verbose {
        EnvFilter::new("debug")
    } else if global.quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_env("KILN_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
    };
    init_logging(&global);

    let result = match cli.command {
        Command::Graph(ref args) => graph::run(args, &global),
        Command::Checksum(ref args) => checksum::run(args, &global),
        Command::Build(ref args) => build::run(args, &global),
        Command::Gc(ref args) => gc::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_build_default() {
        let cli = Cli::parse_from(["kiln", "build"]);
        match cli.command {
            Command::Build(ref args) => {
                assert!(args.configuration.is_none());
                assert!(args.exclude.is_empty());
                assert!(!args.include_tests);
            }
            _ => panic!("expected Build command"),
        }
    }

    #[test]
    fn parse_build_with_args() {
        let cli = Cli::parse_from([
            "kiln",
            "build",
            "--configuration",
            "release",
            "--exclude",
            "Fixtures",
            "swift-log/Logging",
            "--include-tests",
        ]);
        match cli.command {
            Command::Build(ref args) => {
                assert_eq!(args.configuration.as_deref(), Some("release"));
                assert_eq!(args.exclude, vec!["Fixtures", "swift-log/Logging"]);
                assert!(args.include_tests);
            }
            _ => panic!("expected Build command"),
        }
    }

    #[test]
    fn parse_graph_json() {
        let cli = Cli::parse_from(["kiln", "graph", "--json", "-c", "release"]);
        match cli.command {
            Command::Graph(ref args) => {
                assert!(args.json);
                assert_eq!(args.project.configuration.as_deref(), Some("release"));
            }
            _ => panic!("expected Graph command"),
        }
    }

    #[test]
    fn parse_checksum_default() {
        let cli = Cli::parse_from(["kiln", "checksum"]);
        match cli.command {
            Command::Checksum(ref args) => assert!(!args.json),
            _ => panic!("expected Checksum command"),
        }
    }

    #[test]
    fn parse_gc() {
        let cli = Cli::parse_from(["kiln", "gc"]);
        assert!(matches!(cli.command, Command::Gc(_)));
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::parse_from(["kiln", "--quiet", "build"]);
        assert!(cli.quiet);
        assert!(!cli.verbose);
    }

    #[test]
    fn parse_verbose_after_subcommand() {
        let cli = Cli::parse_from(["kiln", "gc", "--verbose"]);
        assert!(cli.verbose);
    }

    #[test]
    fn parse_config_path() {
        let cli = Cli::parse_from(["kiln", "--config", "/path/to/kiln.toml", "build"]);
        assert_eq!(cli.config.as_deref(), Some("/path/to/kiln.toml"));
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["kiln", "deploy"]).is_err());
    }
}
