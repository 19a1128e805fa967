//! CLI execution and command dispatch logic.
//!
//! This module keeps `main` minimal by providing a single entry point that
//! loads the project and renders the requested report.

mod error;
mod output;

pub use error::RunnerError;

use anyhow::{Context, Result};
use camino::Utf8Path;
use itertools::Itertools;
use tracing::{debug, info};

use crate::automatic::VariableMaterializer;
use crate::cli::{Cli, Commands};
use crate::dircache::DirCache;
use crate::graph::{DependencyGraph, FileTable};
use crate::project::Project;
use crate::vpath::{PathSet, Resolution, SearchOrigin};

use output::write_stdout;

/// Execute the parsed [`Cli`] command.
///
/// # Errors
///
/// Returns an error if the project cannot be loaded, a requested target does
/// not exist or writing the report fails.
pub fn run(cli: &Cli) -> Result<()> {
    if let Some(dir) = &cli.directory {
        std::env::set_current_dir(dir).with_context(|| format!("entering directory '{dir}'"))?;
        info!("Entering directory '{dir}'");
    }
    let project = load_project(&cli.file)?;
    let mut cache = DirCache::new();
    let paths = project.path_set(&mut cache);
    let mut table = project.file_table()?;

    let command = cli.command.clone().unwrap_or(Commands::Paths);
    let report = match command {
        Commands::Paths => paths.to_string(),
        Commands::Resolve { names } => render_resolutions(&paths, &names, &table, &mut cache),
        Commands::Vars { target, json } => {
            let always_make = cli.always_make || project.always_make;
            render_vars(&mut table, &target, &project.suffixes, always_make, json)?
        }
        Commands::Recipe { target } => {
            render_recipe(&mut table, &target, cli.one_shell || project.one_shell)?
        }
    };
    write_stdout(&report)
}

fn load_project(path: &Utf8Path) -> Result<Project> {
    if !path.exists() {
        return Err(RunnerError::ProjectNotFound {
            path: path.to_owned(),
        }
        .into());
    }
    let project = Project::from_path(path)?;
    debug!(vpath = project.vpath.len(), "project search directives loaded");
    Ok(project)
}

/// One line per name: where it resolved, or that it was not found.
fn render_resolutions(
    paths: &PathSet,
    names: &[String],
    graph: &dyn DependencyGraph,
    cache: &mut DirCache,
) -> String {
    let mut out = String::new();
    for name in names {
        match paths.resolve(name, graph, cache) {
            Resolution::Located(hit) => {
                let origin = match hit.origin {
                    SearchOrigin::Selective(index) if hit.target_goal => format!(".path #{index}"),
                    SearchOrigin::Selective(index) => format!("vpath #{index}"),
                    SearchOrigin::General => "VPATH".to_owned(),
                };
                out.push_str(&format!(
                    "{name}: {} ({origin}, dir {})\n",
                    hit.path, hit.path_index
                ));
            }
            Resolution::NotFound => {
                out.push_str(&format!("{name}: not found\n"));
            }
        }
    }
    out
}

fn render_vars(
    table: &mut FileTable,
    name: &str,
    suffixes: &[String],
    always_make: bool,
    json: bool,
) -> Result<String> {
    let target = table.get_mut(name).ok_or_else(|| RunnerError::UnknownTarget {
        name: name.to_owned(),
    })?;
    let mut materializer = VariableMaterializer::new(always_make);
    let vars = materializer.compute(target, None, suffixes);
    if json {
        let object: serde_json::Map<String, serde_json::Value> = vars
            .iter()
            .map(|(key, value)| (key.to_owned(), serde_json::Value::from(value)))
            .collect();
        let mut text = serde_json::to_string_pretty(&object).context("serialising variables")?;
        text.push('\n');
        return Ok(text);
    }
    Ok(vars
        .iter()
        .map(|(key, value)| format!("{key} = {value}\n"))
        .join(""))
}

fn render_recipe(table: &mut FileTable, name: &str, one_shell: bool) -> Result<String> {
    let target = table.get_mut(name).ok_or_else(|| RunnerError::UnknownTarget {
        name: name.to_owned(),
    })?;
    let recipe = target.recipe.as_mut().ok_or_else(|| RunnerError::NoRecipe {
        name: name.to_owned(),
    })?;
    let mut out = recipe.listing().to_string();
    let chopped = recipe.chop(one_shell)?;
    let recursive = if chopped.any_recurse() { ", recursive" } else { "" };
    out.push_str(&format!("# {} command line(s){recursive}\n", chopped.len()));
    for (idx, line) in chopped.lines().iter().enumerate() {
        let flags = line.flags().to_string();
        out.push_str(&format!("{:>4} [{flags:<3}] {}\n", idx + 1, line.command()));
    }
    Ok(out)
}
