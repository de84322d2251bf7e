//! Parsing and validation of `kiln.toml` project configuration files.
//!
//! This crate reads the project configuration file and produces a strongly-typed
//! [`ProjectConfig`], plus the merged per-configuration build settings a run
//! actually uses.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{find_project_root, load_config, load_config_from_str, CONFIG_FILE};
pub use resolve::{resolve_build, ResolvedBuild};
pub use types::*;
