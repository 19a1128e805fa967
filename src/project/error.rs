//! Errors raised while loading a project file.
//!
//! YAML syntax errors become [`miette`] diagnostics pointing at the offending
//! character, with a hint for the most common mistake (tab indentation).
//
// Module-level suppression for version-dependent lint false positives from
// miette/thiserror derive macros. The unused_assignments lint fires in some
// Rust versions but not others, so `#[expect]` cannot be used here.
#![allow(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    unused_assignments
)]

use std::io;

use camino::Utf8PathBuf;
use miette::{Diagnostic, NamedSource, SourceSpan};
use serde_saphyr::{Error as YamlError, Location};
use thiserror::Error;

/// Failures loading a `Kumitate.yml` project.
#[derive(Debug, Error, Diagnostic)]
pub enum ProjectError {
    /// The project file could not be read.
    #[error("cannot read project file '{path}'")]
    #[diagnostic(code(kumitate::project::read))]
    Read {
        /// Path that failed.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The project file is not valid YAML or does not match the schema.
    #[error("cannot parse project '{name}'")]
    #[diagnostic(code(kumitate::project::parse))]
    Parse {
        /// Project name used in diagnostics.
        name: String,
        /// Diagnostic with the source span.
        #[source]
        #[diagnostic_source]
        source: Box<dyn Diagnostic + Send + Sync + 'static>,
    },
    /// Two targets share a name.
    #[error("target '{name}' is declared more than once")]
    #[diagnostic(
        code(kumitate::project::duplicate_target),
        help("merge the prerequisite lists into one entry")
    )]
    DuplicateTarget {
        /// Duplicated target name.
        name: String,
    },
}

#[derive(Debug, Error, Diagnostic)]
#[error("YAML parse error at line {line}, column {column}: {source}")]
#[diagnostic(code(kumitate::project::yaml))]
struct YamlDiagnostic {
    #[source_code]
    src: NamedSource<String>,
    #[label("parse error here")]
    span: Option<SourceSpan>,
    #[help]
    help: Option<String>,
    #[source]
    source: YamlError,
    line: u64,
    column: u64,
}

fn byte_offset(src: &str, line: u64, column: u64) -> usize {
    let target_line = usize::try_from(line.saturating_sub(1)).unwrap_or(usize::MAX);
    let target_column = usize::try_from(column.saturating_sub(1)).unwrap_or(usize::MAX);
    let mut offset = 0;
    for (idx, segment) in src.split_inclusive('\n').enumerate() {
        if idx == target_line {
            let text = segment.trim_end_matches(['\n', '\r']);
            let within = text
                .char_indices()
                .nth(target_column)
                .map_or(text.len(), |(byte, _)| byte);
            return offset + within;
        }
        offset += segment.len();
    }
    src.len()
}

fn tab_indented(src: &str, loc: Location) -> bool {
    let line_idx = usize::try_from(loc.line().saturating_sub(1)).unwrap_or(usize::MAX);
    src.lines()
        .nth(line_idx)
        .unwrap_or_default()
        .chars()
        .take_while(|c| c.is_whitespace())
        .any(|c| c == '\t')
}

/// Wrap a YAML error for the project `name` whose text is `src`.
pub(super) fn yaml_error(err: YamlError, src: &str, name: &str) -> ProjectError {
    let loc = err.location();
    let (line, column) = loc.map_or((1, 1), |l| (l.line(), l.column()));
    let span = loc.map(|l| {
        let at = byte_offset(src, l.line(), l.column());
        let len = usize::from(src.get(at..).is_some_and(|rest| !rest.is_empty()));
        SourceSpan::new(at.into(), len)
    });
    let help = loc
        .filter(|&l| tab_indented(src, l))
        .map(|_| "Use spaces for indentation; tabs are invalid in YAML.".to_owned());
    ProjectError::Parse {
        name: name.to_owned(),
        source: Box::new(YamlDiagnostic {
            src: NamedSource::new(name, src.to_owned()),
            span,
            help,
            source: err,
            line,
            column,
        }),
    }
}
