//! Error types for the runner module.
//!
//! This submodule isolates derive-macro-affected code to scope lint
//! suppressions narrowly.

// Scoped suppression for version-dependent lint false positives from
// miette/thiserror derive macros. The unused_assignments lint fires in some
// Rust versions but not others, so `#[expect]` cannot be used here.
#![allow(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    unused_assignments
)]

use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

/// Errors raised during command execution.
#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    /// The project file does not exist at the expected path.
    #[error("project file '{path}' not found")]
    #[diagnostic(
        code(kumitate::runner::project_not_found),
        help("create a Kumitate.yml or pass its location with --file")
    )]
    ProjectNotFound {
        /// The path that was attempted.
        path: Utf8PathBuf,
    },
    /// The named target is not declared in the project.
    #[error("no target named '{name}'")]
    #[diagnostic(code(kumitate::runner::unknown_target))]
    UnknownTarget {
        /// Requested target.
        name: String,
    },
    /// The named target has no recipe to chop.
    #[error("target '{name}' has no recipe")]
    #[diagnostic(code(kumitate::runner::no_recipe))]
    NoRecipe {
        /// Requested target.
        name: String,
    },
}
