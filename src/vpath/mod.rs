//! Pattern-scoped search paths for prerequisites.
//!
//! A [`PathSet`] collects the selective search paths declared with
//! `vpath PATTERN DIRS` (and `.path` entries, which also decide where missing
//! targets are created), the general `VPATH` list and the `GPATH` list. When
//! a prerequisite cannot be found relative to the current directory, the
//! dependency graph calls [`PathSet::resolve`] to relocate it.
//!
//! Resolution runs in three phases:
//!
//! 1. every matching selective path, in declaration order, looking only for
//!    files that exist or are mentioned in the graph;
//! 2. matching `.path` entries again, this time remembering where a missing
//!    file would be created;
//! 3. the remembered creation location, or the general `VPATH` list.
//!
//! # Examples
//!
//! ```
//! use kumitate::dircache::DirCache;
//! use kumitate::graph::FileTable;
//! use kumitate::vpath::{PathSet, Resolution};
//!
//! let mut cache = DirCache::new();
//! let mut paths = PathSet::new();
//! paths.add_pattern(Some("%.o"), Some("obj"), true, &mut cache);
//! paths.finalize("", "", &mut cache);
//!
//! let graph = FileTable::default();
//! match paths.resolve("main.o", &graph, &mut cache) {
//!     Resolution::Located(hit) => assert_eq!(hit.path, "obj/main.o"),
//!     Resolution::NotFound => unreachable!("target-goal paths always place the file"),
//! }
//! ```

mod compose;
mod dirlist;
mod dump;
mod pattern;

use std::collections::VecDeque;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use crate::dircache::DirectoryCache;
use crate::graph::DependencyGraph;
use crate::timestamp::Mtime;

pub use compose::compose_path;
pub use dirlist::{PATH_LIST_SEPARATOR, split_dir_list};
pub use pattern::{find_percent, pattern_matches};

use compose::{is_absolute, split_dir_prefix};
use pattern::search_pattern_matches;

/// Directories searched for names matching one pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchPath {
    pattern: String,
    percent: Option<usize>,
    dirs: Vec<String>,
    max_len: usize,
    target_goal: bool,
}

impl SearchPath {
    /// Build a search path from a raw pattern and directory list.
    ///
    /// Each directory is registered with `cache`. Returns `None` when the
    /// list names no directory.
    pub fn parse(
        raw_pattern: &str,
        dir_list: &str,
        target_goal: bool,
        cache: &mut dyn DirectoryCache,
    ) -> Option<Self> {
        let (pattern, percent) = find_percent(raw_pattern);
        let dirs: Vec<String> = split_dir_list(dir_list)
            .iter()
            .map(|dir| cache.canonicalize(dir))
            .collect();
        if dirs.is_empty() {
            return None;
        }
        let max_len = dirs.iter().map(String::len).max().unwrap_or_default();
        Some(Self {
            pattern,
            percent,
            dirs,
            max_len,
            target_goal,
        })
    }

    /// Pattern with quoting removed.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Byte offset of the wildcard within [`Self::pattern`].
    #[must_use]
    pub const fn percent(&self) -> Option<usize> {
        self.percent
    }

    /// Directories in search order.
    #[must_use]
    pub fn dirs(&self) -> &[String] {
        &self.dirs
    }

    /// Length of the longest directory name.
    #[must_use]
    pub const fn max_len(&self) -> usize {
        self.max_len
    }

    /// Whether missing files matching the pattern are created in the first
    /// directory.
    #[must_use]
    pub const fn is_target_goal(&self) -> bool {
        self.target_goal
    }

    /// Whether `name` selects this search path.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        search_pattern_matches(&self.pattern, self.percent, name)
    }

    fn same_entry(&self, pattern: &str, percent: Option<usize>) -> bool {
        self.percent == percent && self.pattern == pattern
    }
}

/// Which list produced a resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchOrigin {
    /// The selective search path at this position in declaration order.
    Selective(usize),
    /// The general `VPATH` list.
    General,
}

/// A prerequisite located through a search path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Located {
    /// Relocated name of the prerequisite.
    pub path: Utf8PathBuf,
    /// Modification time learned while locating it.
    pub mtime: Mtime,
    /// Index of the directory that produced the hit.
    pub path_index: usize,
    /// List the directory belongs to.
    pub origin: SearchOrigin,
    /// The hit came from a `.path` entry.
    pub target_goal: bool,
}

/// Outcome of [`PathSet::resolve`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// The prerequisite lives at, or will be created at, the given location.
    Located(Located),
    /// No search path produced a location.
    NotFound,
}

impl Resolution {
    /// Borrow the located prerequisite, if any.
    #[must_use]
    pub const fn located(&self) -> Option<&Located> {
        match self {
            Self::Located(hit) => Some(hit),
            Self::NotFound => None,
        }
    }

    /// Relocated path, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8Path> {
        self.located().map(|hit| hit.path.as_path())
    }
}

/// All search paths of a build.
#[derive(Clone, Debug, Default)]
pub struct PathSet {
    selective: VecDeque<SearchPath>,
    general: Option<SearchPath>,
    gpath: Option<SearchPath>,
    finalized: bool,
}

impl PathSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or remove selective search paths.
    ///
    /// With a non-blank `dir_list`, a search path for `pattern` is recorded.
    /// Without one, existing entries with the same pattern (every entry when
    /// `pattern` is `None`) in the same target-goal class are removed.
    pub fn add_pattern(
        &mut self,
        pattern: Option<&str>,
        dir_list: Option<&str>,
        target_goal: bool,
        cache: &mut dyn DirectoryCache,
    ) {
        let Some(list) = dir_list.filter(|list| !list.trim().is_empty()) else {
            self.remove_matching(pattern, target_goal);
            return;
        };
        let Some(path) = SearchPath::parse(pattern.unwrap_or("%"), list, target_goal, cache) else {
            return;
        };
        if self.finalized {
            self.selective.push_back(path);
        } else {
            self.selective.push_front(path);
        }
    }

    fn remove_matching(&mut self, pattern: Option<&str>, target_goal: bool) {
        let key = pattern.map(find_percent);
        self.selective.retain(|path| {
            let same_pattern = key
                .as_ref()
                .is_none_or(|(pat, percent)| path.same_entry(pat, *percent));
            !(same_pattern && path.target_goal == target_goal)
        });
    }

    /// Put selective paths in declaration order and build the general lists.
    ///
    /// `vpath_value` and `gpath_value` are the expanded values of the `VPATH`
    /// and `GPATH` variables. The selective list is reversed only on the first
    /// call. The general lists are rebuilt on every call, so a blank value
    /// clears the list it names.
    pub fn finalize(&mut self, vpath_value: &str, gpath_value: &str, cache: &mut dyn DirectoryCache) {
        if !self.finalized {
            self.selective.make_contiguous().reverse();
            self.finalized = true;
        }
        self.general = SearchPath::parse("%", vpath_value.trim(), false, cache);
        self.gpath = SearchPath::parse("%", gpath_value.trim(), false, cache);
    }

    /// Selective search paths in search order.
    pub fn selective(&self) -> impl Iterator<Item = &SearchPath> {
        self.selective.iter()
    }

    /// The general `VPATH` search path.
    #[must_use]
    pub const fn general(&self) -> Option<&SearchPath> {
        self.general.as_ref()
    }

    /// The `GPATH` search path.
    #[must_use]
    pub const fn gpath(&self) -> Option<&SearchPath> {
        self.gpath.as_ref()
    }

    /// Whether [`Self::resolve`] can never locate anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selective.is_empty() && self.general.is_none()
    }

    /// Whether `name` is exactly one of the `GPATH` directories.
    #[must_use]
    pub fn gpath_contains(&self, name: &str) -> bool {
        self.gpath.as_ref().is_some_and(|gpath| {
            name.len() <= gpath.max_len && gpath.dirs.iter().any(|dir| dir == name)
        })
    }

    /// Locate `name` through the search paths.
    ///
    /// Absolute names are never relocated.
    pub fn resolve(
        &self,
        name: &str,
        graph: &dyn DependencyGraph,
        cache: &mut dyn DirectoryCache,
    ) -> Resolution {
        if is_absolute(name) || self.is_empty() {
            return Resolution::NotFound;
        }
        let probe = Probe::new(name, graph);

        for (index, path) in self.selective.iter().enumerate() {
            if !path.matches(name) {
                continue;
            }
            if let Probed::Found(hit) = probe.search(path, false, cache) {
                return probe.located(hit, SearchOrigin::Selective(index), path.target_goal);
            }
        }

        let mut fallback = None;
        for (index, path) in self.selective.iter().enumerate() {
            if !path.target_goal || !path.matches(name) {
                continue;
            }
            match probe.search(path, true, cache) {
                Probed::Found(hit) => {
                    return probe.located(hit, SearchOrigin::Selective(index), true);
                }
                Probed::CreateAt(candidate) => {
                    fallback.get_or_insert((index, candidate));
                }
                Probed::Missing => {}
            }
        }

        if let Some((index, candidate)) = fallback {
            let hit = Hit {
                path: candidate,
                mtime: Mtime::Unknown,
                index: 0,
            };
            return probe.located(hit, SearchOrigin::Selective(index), true);
        }

        if let Some(general) = &self.general
            && let Probed::Found(hit) = probe.search(general, general.target_goal, cache)
        {
            return probe.located(hit, SearchOrigin::General, general.target_goal);
        }

        Resolution::NotFound
    }
}

struct Hit {
    path: String,
    mtime: Mtime,
    index: usize,
}

enum Probed {
    Found(Hit),
    CreateAt(String),
    Missing,
}

/// Per-name state shared by every search-path probe.
struct Probe<'a> {
    name: &'a str,
    name_is_target: bool,
    dir_prefix: Option<&'a str>,
    file: &'a str,
    graph: &'a dyn DependencyGraph,
}

impl<'a> Probe<'a> {
    fn new(name: &'a str, graph: &'a dyn DependencyGraph) -> Self {
        let (dir_prefix, file) = split_dir_prefix(name);
        Self {
            name,
            name_is_target: graph.lookup(name).is_some_and(|f| f.is_target),
            dir_prefix,
            file,
            graph,
        }
    }

    fn search(&self, path: &SearchPath, target_goal: bool, cache: &mut dyn DirectoryCache) -> Probed {
        let mut create_at = None;
        for (index, dir) in path.dirs.iter().enumerate() {
            let candidate = compose_path(dir, self.name);
            let mut mtime = Mtime::Unknown;
            let mut exists = false;

            if let Some(known) = self.graph.lookup(&candidate) {
                exists = !self.name_is_target || known.is_target;
                if exists && known.last_mtime.is_assumed() {
                    mtime = known.last_mtime;
                }
            }

            let in_cache = !exists && {
                let lookup_dir = self
                    .dir_prefix
                    .map_or_else(|| dir.clone(), |prefix| compose_path(dir, prefix));
                cache.dirent_exists(&lookup_dir, self.file)
            };

            if exists || in_cache {
                if in_cache {
                    match Utf8Path::new(&candidate).metadata() {
                        Ok(meta) => mtime = Mtime::from_metadata(&meta),
                        Err(_) if !target_goal && !self.name_is_target => continue,
                        Err(_) => {}
                    }
                }
                return Probed::Found(Hit {
                    path: candidate,
                    mtime,
                    index,
                });
            }

            if target_goal && create_at.is_none() {
                create_at = Some(candidate);
            }
        }
        create_at.map_or(Probed::Missing, Probed::CreateAt)
    }

    fn located(&self, hit: Hit, origin: SearchOrigin, target_goal: bool) -> Resolution {
        debug!("Relocating '{}' to '{}'", self.name, hit.path);
        Resolution::Located(Located {
            path: Utf8PathBuf::from(hit.path),
            mtime: hit.mtime,
            path_index: hit.index,
            origin,
            target_goal,
        })
    }
}
