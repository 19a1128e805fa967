//! Command line interface definition using clap.
//!
//! This module defines the [`Cli`] structure and its subcommands.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

use crate::project::DEFAULT_PROJECT_FILE;

/// Inspect how a make-style build locates prerequisites and prepares recipes.
#[derive(Debug, Parser, Clone, PartialEq, Eq)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the project file to use.
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_PROJECT_FILE)]
    pub file: Utf8PathBuf,

    /// Run as if started in this directory.
    ///
    /// Relative search directories and the project file are looked up there.
    #[arg(short = 'C', long, value_name = "DIR")]
    pub directory: Option<Utf8PathBuf>,

    /// Enable verbose diagnostic logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Treat each recipe as a single shell line, as `.ONESHELL` does.
    #[arg(long)]
    pub one_shell: bool,

    /// Treat every prerequisite as changed.
    #[arg(short = 'B', long)]
    pub always_make: bool,

    /// Optional subcommand to execute; defaults to `paths` when omitted.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Apply the default command if none was specified.
    #[must_use]
    pub fn with_default_command(mut self) -> Self {
        if self.command.is_none() {
            self.command = Some(Commands::Paths);
        }
        self
    }
}

/// Available top-level commands.
#[derive(Debug, Subcommand, PartialEq, Eq, Clone)]
pub enum Commands {
    /// Print the search path database.
    Paths,

    /// Locate prerequisites through the search paths.
    Resolve {
        /// Names to locate.
        #[arg(value_name = "NAME", required = true)]
        names: Vec<String>,
    },

    /// Print the automatic variables of a target's recipe.
    Vars {
        /// Target to inspect.
        #[arg(value_name = "TARGET")]
        target: String,

        /// Print the variables as a JSON object.
        #[arg(long)]
        json: bool,
    },

    /// Print a target's recipe split into command lines.
    Recipe {
        /// Target to inspect.
        #[arg(value_name = "TARGET")]
        target: String,
    },
}
