//! Target and prerequisite records shared with the dependency graph.
//!
//! The graph itself (rule parsing, staleness checks, traversal order) lives
//! outside this crate. The types here are the data it hands to the search
//! path resolver, the automatic-variable materializer and the signal
//! coordinator, together with the [`DependencyGraph`] lookup seam and a
//! simple in-memory [`FileTable`] implementation of it.
//!
//! # Examples
//!
//! ```
//! use kumitate::graph::{Dependency, DependencyGraph, FileTable, Target};
//!
//! let mut table = FileTable::default();
//! let mut prog = Target::new("prog");
//! prog.deps.push(Dependency::new("main.o"));
//! prog.deps.push(Dependency::new("build").with_order_only(true));
//! table.insert(prog);
//! assert!(table.lookup("prog").is_some_and(|t| t.is_target));
//! ```

use indexmap::IndexMap;

use crate::recipe::Recipe;
use crate::timestamp::Mtime;

/// A prerequisite edge from a target to a named input.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Dependency {
    /// Name of the prerequisite as written in the makefile.
    pub name: String,
    /// Only the prerequisite's existence matters, not its timestamp.
    pub order_only: bool,
    /// Leave the prerequisite out of every automatic variable.
    pub ignore_automatic_vars: bool,
    /// The name still contains references awaiting second expansion.
    pub needs_second_expansion: bool,
    /// The prerequisite is newer than the target.
    pub changed: bool,
}

impl Dependency {
    /// Create an ordinary prerequisite named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the order-only flag.
    #[must_use]
    pub fn with_order_only(mut self, order_only: bool) -> Self {
        self.order_only = order_only;
        self
    }

    /// Set the changed flag.
    #[must_use]
    pub fn with_changed(mut self, changed: bool) -> Self {
        self.changed = changed;
        self
    }

    /// Set the flag excluding the prerequisite from automatic variables.
    #[must_use]
    pub fn with_ignore_automatic_vars(mut self, ignore: bool) -> Self {
        self.ignore_automatic_vars = ignore;
        self
    }

    /// Set the deferred-expansion flag.
    #[must_use]
    pub fn with_second_expansion(mut self, deferred: bool) -> Self {
        self.needs_second_expansion = deferred;
        self
    }

    /// Whether the prerequisite takes part in `$+`, `$^`, `$?` and `$|`.
    #[must_use]
    pub const fn is_eligible(&self) -> bool {
        !self.needs_second_expansion && !self.ignore_automatic_vars
    }
}

/// Progress of a target's recipe.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CommandState {
    /// No recipe has been started.
    #[default]
    NotStarted,
    /// The recipe is running or has just been dispatched.
    Running,
    /// The recipe has finished.
    Finished,
}

/// Result of trying to bring a target up to date.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UpdateStatus {
    /// The target has not been updated yet.
    #[default]
    None,
    /// The target was updated successfully.
    Success,
    /// The target is out of date (question mode).
    Question,
    /// Updating the target failed.
    Failed,
}

/// A file known to the dependency graph.
#[derive(Clone, Debug, Default)]
pub struct Target {
    /// Name of the file, possibly in `archive(member)` form.
    pub name: String,
    /// Prerequisites in makefile order.
    pub deps: Vec<Dependency>,
    /// Stem cached by the first automatic-variable computation.
    pub stem: Option<String>,
    /// Never delete this file on interruption.
    pub precious: bool,
    /// The target does not name a real file.
    pub phony: bool,
    /// The file appears as a target of some rule.
    pub is_target: bool,
    /// Modification time recorded when the build examined the file.
    pub last_mtime: Mtime,
    /// Further files produced by the same recipe.
    pub also_make: Vec<String>,
    /// The file is a dynamically loaded object currently in use.
    pub loaded: bool,
    /// The file was unloaded so it could be rebuilt.
    pub unloaded: bool,
    /// Recipe used to build the file.
    pub recipe: Option<Recipe>,
    /// The recipe was inherited from the `.DEFAULT` rule.
    pub recipe_from_default: bool,
    /// Progress of the recipe.
    pub command_state: CommandState,
    /// Outcome of the last update attempt.
    pub update_status: UpdateStatus,
}

impl Target {
    /// Create a target named `name` that appears as a rule target.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_target: true,
            ..Self::default()
        }
    }

    /// Create a file that is only mentioned, never declared as a target.
    #[must_use]
    pub fn mentioned(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Read access to the dependency graph.
pub trait DependencyGraph {
    /// Look up a file by exact name.
    fn lookup(&self, name: &str) -> Option<&Target>;
}

/// Insertion-ordered table of files implementing [`DependencyGraph`].
#[derive(Clone, Debug, Default)]
pub struct FileTable {
    files: IndexMap<String, Target>,
}

impl FileTable {
    /// Add or replace a file, returning the previous entry of that name.
    pub fn insert(&mut self, target: Target) -> Option<Target> {
        self.files.insert(target.name.clone(), target)
    }

    /// Mutable access to a file by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Target> {
        self.files.get_mut(name)
    }

    /// Remove a file from the table, keeping the order of the rest.
    pub fn remove(&mut self, name: &str) -> Option<Target> {
        self.files.shift_remove(name)
    }

    /// Iterate over the files in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Target> {
        self.files.values()
    }

    /// Number of files in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the table holds no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl DependencyGraph for FileTable {
    fn lookup(&self, name: &str) -> Option<&Target> {
        self.files.get(name)
    }
}

impl FromIterator<Target> for FileTable {
    fn from_iter<I: IntoIterator<Item = Target>>(iter: I) -> Self {
        let mut table = Self::default();
        for target in iter {
            table.insert(target);
        }
        table
    }
}
