//! Errors raised while chopping recipes.
//
// Module-level suppression for version-dependent lint false positives from
// miette/thiserror derive macros. The unused_assignments lint fires in some
// Rust versions but not others, so `#[expect]` cannot be used here.
#![allow(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    unused_assignments
)]

use miette::Diagnostic;
use thiserror::Error;

use super::SourceLocation;

/// Fatal problems with a recipe's shape.
#[derive(Debug, Error, Diagnostic)]
pub enum RecipeError {
    /// The recipe has more logical lines than a line index can address.
    #[error("{location}: Recipe has too many lines (limit {limit})")]
    #[diagnostic(
        code(kumitate::recipe::too_many_lines),
        help("split the recipe across several rules or use a script")
    )]
    TooManyLines {
        /// Where the recipe was defined.
        location: SourceLocation,
        /// Maximum number of lines accepted.
        limit: usize,
    },
}
