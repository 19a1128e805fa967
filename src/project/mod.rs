//! The `Kumitate.yml` project description.
//!
//! A project declares what a makefile would: `vpath` and `.path` directives,
//! the `VPATH` and `GPATH` variables, the `.SUFFIXES` list, a couple of
//! global settings and the targets with their prerequisites and recipes. The
//! loader turns it into the in-memory [`PathSet`] and [`FileTable`] the core
//! operates on.
//!
//! ```yaml
//! vpath:
//!   - pattern: "%.c"
//!     dirs: src
//!   - pattern: "%.o"
//!     dirs: obj
//!     target_goal: true
//! VPATH: gen
//! suffixes: [".c", ".o"]
//! targets:
//!   - name: prog
//!     deps: [main.o, { name: build, order_only: true }]
//!     recipe: "cc -o $@ $^"
//!     line: 4
//! ```

mod error;

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use tracing::debug;

use crate::dircache::DirectoryCache;
use crate::graph::{Dependency, FileTable, Target};
use crate::recipe::{Recipe, SourceLocation};
use crate::vpath::PathSet;

pub use error::ProjectError;

/// Default project file name.
pub const DEFAULT_PROJECT_FILE: &str = "Kumitate.yml";

/// A parsed project file.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Project {
    /// Selective search path directives, in declaration order.
    #[serde(default)]
    pub vpath: Vec<VpathDirective>,
    /// Value of the `VPATH` variable.
    #[serde(default, rename = "VPATH")]
    pub vpath_var: String,
    /// Value of the `GPATH` variable.
    #[serde(default, rename = "GPATH")]
    pub gpath_var: String,
    /// The `.SUFFIXES` list.
    #[serde(default)]
    pub suffixes: Vec<String>,
    /// Run each recipe as a single shell line.
    #[serde(default)]
    pub one_shell: bool,
    /// Treat every prerequisite as changed.
    #[serde(default)]
    pub always_make: bool,
    /// Targets of the build.
    #[serde(default)]
    pub targets: Vec<TargetSpec>,
    #[serde(skip)]
    source: Option<Utf8PathBuf>,
}

/// One `vpath` or `.path` directive.
///
/// A directive without `dirs` clears the matching entries, and one without
/// a `pattern` clears every entry of its kind.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VpathDirective {
    /// Pattern with at most one `%` wildcard.
    #[serde(default)]
    pub pattern: Option<String>,
    /// Directory list separated by blanks or the path-list separator.
    #[serde(default)]
    pub dirs: Option<String>,
    /// Declare a `.path` entry that also decides where missing files go.
    #[serde(default)]
    pub target_goal: bool,
}

/// A prerequisite, either a bare name or a detailed record.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum DepSpec {
    /// A normal prerequisite.
    Name(String),
    /// A prerequisite with flags.
    Detailed {
        /// Prerequisite name.
        name: String,
        /// Order-only prerequisite.
        #[serde(default)]
        order_only: bool,
        /// Changed since the target was last built.
        #[serde(default)]
        changed: bool,
        /// Left out of the automatic variables.
        #[serde(default)]
        ignore_automatic_vars: bool,
        /// Still waiting for secondary expansion.
        #[serde(default)]
        second_expansion: bool,
    },
}

impl DepSpec {
    /// Prerequisite name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) | Self::Detailed { name, .. } => name,
        }
    }

    fn to_dependency(&self) -> Dependency {
        match self {
            Self::Name(name) => Dependency::new(name.as_str()),
            Self::Detailed {
                name,
                order_only,
                changed,
                ignore_automatic_vars,
                second_expansion,
            } => Dependency::new(name.as_str())
                .with_order_only(*order_only)
                .with_changed(*changed)
                .with_ignore_automatic_vars(*ignore_automatic_vars)
                .with_second_expansion(*second_expansion),
        }
    }
}

/// A target declaration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetSpec {
    /// Target name.
    pub name: String,
    /// Prerequisites in order.
    #[serde(default)]
    pub deps: Vec<DepSpec>,
    /// Recipe text.
    #[serde(default)]
    pub recipe: Option<String>,
    /// Line of the recipe in the makefile it came from.
    #[serde(default)]
    pub line: Option<u64>,
    /// Stem of the pattern rule that matched.
    #[serde(default)]
    pub stem: Option<String>,
    /// Files the recipe also produces.
    #[serde(default)]
    pub also_make: Vec<String>,
    /// Never delete on interruption.
    #[serde(default)]
    pub precious: bool,
    /// Not a file.
    #[serde(default)]
    pub phony: bool,
    /// The recipe comes from the `.DEFAULT` rule.
    #[serde(default)]
    pub default_recipe: bool,
    /// An object was loaded for this target.
    #[serde(default)]
    pub loaded: bool,
}

impl Project {
    /// Parse a project from YAML text, naming it `name` in diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::Parse`] for invalid YAML or unknown keys.
    pub fn from_str_named(yaml: &str, name: &str) -> Result<Self, ProjectError> {
        serde_saphyr::from_str(yaml).map_err(|err| error::yaml_error(err, yaml, name))
    }

    /// Load a project file.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::Read`] when the file cannot be read and
    /// [`ProjectError::Parse`] when it does not parse.
    pub fn from_path(path: &Utf8Path) -> Result<Self, ProjectError> {
        let yaml = fs::read_to_string(path).map_err(|source| ProjectError::Read {
            path: path.to_owned(),
            source,
        })?;
        let mut project = Self::from_str_named(&yaml, path.as_str())?;
        debug!(%path, targets = project.targets.len(), "loaded project");
        project.source = Some(path.to_owned());
        Ok(project)
    }

    /// File the project was loaded from.
    #[must_use]
    pub fn source(&self) -> Option<&Utf8Path> {
        self.source.as_deref()
    }

    /// Build the finalised search paths.
    pub fn path_set(&self, cache: &mut dyn DirectoryCache) -> PathSet {
        let mut paths = PathSet::new();
        for directive in &self.vpath {
            paths.add_pattern(
                directive.pattern.as_deref(),
                directive.dirs.as_deref(),
                directive.target_goal,
                cache,
            );
        }
        paths.finalize(&self.vpath_var, &self.gpath_var, cache);
        paths
    }

    /// Build the target table.
    ///
    /// Prerequisites that are not themselves declared are added as files
    /// mentioned in the graph.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::DuplicateTarget`] when a name is declared
    /// twice.
    pub fn file_table(&self) -> Result<FileTable, ProjectError> {
        let mut table = FileTable::default();
        for spec in &self.targets {
            let target = self.target(spec);
            if table.insert(target).is_some() {
                return Err(ProjectError::DuplicateTarget {
                    name: spec.name.clone(),
                });
            }
        }
        let mentioned = self
            .targets
            .iter()
            .flat_map(|spec| spec.deps.iter().map(DepSpec::name));
        for name in mentioned {
            if table.get_mut(name).is_none() {
                table.insert(Target::mentioned(name));
            }
        }
        Ok(table)
    }

    fn target(&self, spec: &TargetSpec) -> Target {
        let mut target = Target::new(spec.name.as_str());
        target.deps = spec.deps.iter().map(DepSpec::to_dependency).collect();
        target.stem.clone_from(&spec.stem);
        target.also_make.clone_from(&spec.also_make);
        target.precious = spec.precious;
        target.phony = spec.phony;
        target.recipe_from_default = spec.default_recipe;
        target.loaded = spec.loaded;
        target.recipe = spec.recipe.as_ref().map(|text| {
            let location = match (&self.source, spec.line) {
                (Some(file), Some(line)) => SourceLocation::new(file.clone(), line),
                _ => SourceLocation::builtin(),
            };
            Recipe::with_location(text.as_str(), location)
        });
        target
    }
}
