//! Resolved package model and its translation into build graphs.
//!
//! Packages arrive already resolved (targets, products, checkout paths) from
//! the manifest resolver. This crate flattens them into [`TargetNode`]s with
//! platform-gated dependencies, derives each target's cache key, and
//! fingerprints lock-file state for the resolved-dependency cache.

#![warn(missing_docs)]

pub mod error;
pub mod key;
pub mod model;
pub mod pins;
pub mod resolution;
pub mod targets;

pub use error::PackageError;
pub use model::{
    load_packages, ModuleKind, PackageIdentity, PackageOrigin, Platform, PlatformCondition,
    ProductKind, ResolvedPackage, ResolvedProduct, ResolvedTarget, TargetDependency, TargetRole,
};
pub use pins::{PackageResolved, Pin, PinState};
pub use resolution::{resolve_with_cache, ResolutionSource};
pub use targets::{build_graph, flatten_targets, BuildContext, TargetId, TargetNode};
