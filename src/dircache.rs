//! Directory-listing cache consulted by search-path resolution.
//!
//! Each directory is read at most once, the first time a file inside it is
//! looked up, and the listing is never invalidated. Callers treat a hit as a
//! hint and confirm it with a direct `stat` before trusting it, because
//! sibling recipes may create or delete files after the listing was taken.

use std::collections::{HashMap, HashSet};

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use tracing::debug;

/// Directory-cache collaborator.
pub trait DirectoryCache {
    /// Register `dir` and return the name the cache knows it by.
    fn canonicalize(&mut self, dir: &str) -> String;

    /// Whether `file` is listed in directory `dir`.
    fn dirent_exists(&mut self, dir: &str, file: &str) -> bool;
}

#[derive(Debug)]
enum Listing {
    Pending,
    Missing,
    Loaded(HashSet<String>),
}

/// Lazily populated [`DirectoryCache`] backed by the real filesystem.
#[derive(Debug, Default)]
pub struct DirCache {
    dirs: HashMap<String, Listing>,
}

impl DirCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of directories registered so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    /// Whether no directory has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    fn listing(&mut self, dir: &str) -> &Listing {
        let entry = self
            .dirs
            .entry(dir.to_owned())
            .or_insert(Listing::Pending);
        if matches!(entry, Listing::Pending) {
            *entry = read_listing(dir);
        }
        entry
    }
}

impl DirectoryCache for DirCache {
    fn canonicalize(&mut self, dir: &str) -> String {
        self.dirs.entry(dir.to_owned()).or_insert(Listing::Pending);
        dir.to_owned()
    }

    fn dirent_exists(&mut self, dir: &str, file: &str) -> bool {
        match self.listing(dir) {
            Listing::Loaded(names) => names.contains(file),
            Listing::Missing | Listing::Pending => false,
        }
    }
}

fn read_listing(dir: &str) -> Listing {
    let path = if dir.is_empty() { "." } else { dir };
    let opened = Dir::open_ambient_dir(Utf8Path::new(path), ambient_authority());
    let Ok(handle) = opened else {
        debug!(dir = path, "search directory cannot be opened");
        return Listing::Missing;
    };
    let Ok(entries) = handle.entries() else {
        return Listing::Missing;
    };
    let names = entries
        .filter_map(Result::ok)
        .filter_map(|entry| entry.file_name().ok())
        .collect::<HashSet<_>>();
    debug!(dir = path, entries = names.len(), "cached directory listing");
    Listing::Loaded(names)
}
