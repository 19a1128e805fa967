//! Test utilities shared by the integration tests.
//!
//! Provides temporary source trees, an in-memory directory cache and small
//! builders for graph fixtures.

pub mod cache;
pub mod graph;
pub mod tree;

pub use cache::FakeDirCache;
pub use graph::{deps, table};
pub use tree::TempTree;

/// Prefix the provided project body with an empty `vpath` list so fixtures
/// always parse even when they declare nothing else.
pub fn project_yaml(body: &str) -> String {
    format!("vpath: []\n{body}")
}
