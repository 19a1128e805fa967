//! In-memory directory cache.

use std::collections::HashSet;

use kumitate::dircache::DirectoryCache;

/// A [`DirectoryCache`] answering from a fixed set of `dir/file` entries.
///
/// Every lookup is recorded so tests can assert which directories were
/// probed and in what order.
#[derive(Debug, Default)]
pub struct FakeDirCache {
    entries: HashSet<(String, String)>,
    /// Directory and file name of every `dirent_exists` call.
    pub probes: Vec<(String, String)>,
}

impl FakeDirCache {
    /// Create a cache holding the given `dir/file` paths.
    pub fn with_files(paths: &[&str]) -> Self {
        let entries = paths
            .iter()
            .filter_map(|path| path.rsplit_once('/'))
            .map(|(dir, file)| (dir.to_owned(), file.to_owned()))
            .collect();
        Self {
            entries,
            probes: Vec::new(),
        }
    }
}

impl DirectoryCache for FakeDirCache {
    fn canonicalize(&mut self, dir: &str) -> String {
        dir.to_owned()
    }

    fn dirent_exists(&mut self, dir: &str, file: &str) -> bool {
        self.probes.push((dir.to_owned(), file.to_owned()));
        self.entries.contains(&(dir.to_owned(), file.to_owned()))
    }
}
