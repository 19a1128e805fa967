//! Builders for dependency graph fixtures.

use kumitate::graph::{Dependency, FileTable, Target};

/// Build a dependency list from `(name, order_only)` pairs.
pub fn deps(list: &[(&str, bool)]) -> Vec<Dependency> {
    list.iter()
        .map(|&(name, order_only)| Dependency::new(name).with_order_only(order_only))
        .collect()
}

/// Build a table declaring every name in `targets` as a target.
pub fn table(targets: &[&str]) -> FileTable {
    targets.iter().map(|&name| Target::new(name)).collect()
}
