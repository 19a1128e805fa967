//! Errors raised by the signal coordinator.
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

use miette::Diagnostic;
use thiserror::Error;

use super::FatalSignal;

/// Unrecoverable failures while handling a fatal signal.
#[derive(Debug, Error, Diagnostic)]
pub enum SignalError {
    /// Re-delivering the signal to this process failed.
    #[error("kill: failed to re-deliver {signal} to this process")]
    #[diagnostic(code(kumitate::coordinator::reraise))]
    Reraise {
        /// Signal being re-delivered.
        signal: FatalSignal,
        /// Operating system error.
        #[source]
        source: io::Error,
    },
    /// Installing the signal trap failed.
    #[error("failed to install a handler for {signal}")]
    #[diagnostic(
        code(kumitate::coordinator::install),
        help("the signal may not be catchable on this platform")
    )]
    Install {
        /// Signal whose handler could not be installed.
        signal: FatalSignal,
        /// Operating system error.
        #[source]
        source: io::Error,
    },
}
