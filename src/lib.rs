//! Kumitate core library.
//!
//! This library holds the part of a make-style build tool that sits between
//! the dependency graph and the job scheduler: locating prerequisites through
//! `vpath` search paths, computing automatic variables, chopping recipes into
//! command lines and cleaning up when a fatal signal interrupts the build.

pub mod archive;
pub mod automatic;
pub mod cli;
pub mod coordinator;
pub mod dircache;
pub mod graph;
pub mod project;
pub mod recipe;
pub mod runner;
pub mod timestamp;
pub mod vpath;
