//! Removal of targets left half-built by an interrupted job.

use std::fmt;
use std::fs;
use std::io;

use tracing::{debug, error, warn};

use super::{Child, SignalCoordinator};
use crate::graph::{DependencyGraph, Target};
use crate::timestamp::Mtime;

/// What [`SignalCoordinator::delete_target_if_stale`] did with a file.
#[derive(Debug)]
pub enum StaleOutcome {
    /// Precious or phony; left alone.
    Kept,
    /// Modified since the build started, and removed.
    Deleted,
    /// Archive member whose date disagrees with the recorded one. Archive
    /// members are never removed.
    ArchiveSuspect,
    /// Nothing exists at the path.
    NotFound,
    /// Not a regular file, or not modified since the build started.
    Unchanged,
    /// Removal failed.
    Failed(io::Error),
}

impl StaleOutcome {
    /// Whether the file was removed.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted)
    }
}

struct Attributed<'a>(Option<&'a str>);

impl fmt::Display for Attributed<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(job) => write!(f, "*** [{job}]"),
            None => f.write_str("***"),
        }
    }
}

impl SignalCoordinator {
    /// Delete `file` if a job changed it after the build recorded its time.
    ///
    /// `on_behalf_of` names the job whose target produced the file as a side
    /// effect and prefixes the diagnostics.
    #[must_use]
    pub fn delete_target_if_stale(&self, file: &Target, on_behalf_of: Option<&str>) -> StaleOutcome {
        if file.precious || file.phony {
            return StaleOutcome::Kept;
        }
        let job = Attributed(on_behalf_of);

        if self.archives.is_archive_member(&file.name) {
            let recorded = match file.last_mtime {
                Mtime::Nonexistent => None,
                other => other.whole_seconds(),
            };
            let member = self
                .archives
                .member_mtime(&file.name)
                .and_then(|time| Mtime::At(time).whole_seconds());
            if member == recorded {
                return StaleOutcome::Unchanged;
            }
            warn!("{job} Archive member '{}' may be bogus; not deleted", file.name);
            return StaleOutcome::ArchiveSuspect;
        }

        let meta = match fs::metadata(&file.name) {
            Ok(meta) => meta,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return StaleOutcome::NotFound,
            Err(err) => {
                debug!(file = %file.name, error = %err, "cannot stat target during cleanup");
                return StaleOutcome::Unchanged;
            }
        };
        if !meta.is_file() || Mtime::from_metadata(&meta) == file.last_mtime {
            return StaleOutcome::Unchanged;
        }

        error!("{job} Deleting file '{}'", file.name);
        match fs::remove_file(&file.name) {
            Ok(()) => StaleOutcome::Deleted,
            Err(err) if err.kind() == io::ErrorKind::NotFound => StaleOutcome::Deleted,
            Err(err) => {
                error!("unlink: {}: {err}", file.name);
                StaleOutcome::Failed(err)
            }
        }
    }

    /// Delete the stale targets of a running job.
    ///
    /// The job's own target is handled first, then every file its recipe
    /// also makes. Runs at most once per job and never for detached jobs.
    pub fn delete_targets_of_child(&self, child: &mut Child, graph: &dyn DependencyGraph) {
        if child.deleted || child.is_detached() {
            return;
        }
        match graph.lookup(&child.target) {
            Some(target) => {
                let outcome = self.delete_target_if_stale(target, None);
                debug!(file = %target.name, ?outcome, "cleaned up job target");
                for also in &target.also_make {
                    let Some(file) = graph.lookup(also) else {
                        debug!(file = %also, "also-made file is not in the graph");
                        continue;
                    };
                    let also_outcome = self.delete_target_if_stale(file, Some(&target.name));
                    debug!(file = %file.name, outcome = ?also_outcome, "cleaned up also-made file");
                }
            }
            None => debug!(target = %child.target, "job target is not in the graph"),
        }
        child.deleted = true;
    }
}
