//! Database dump of the search paths.

use std::fmt;

use itertools::Itertools;

use super::{PATH_LIST_SEPARATOR, PathSet, SearchPath};

fn joined_dirs(path: &SearchPath) -> String {
    path.dirs().iter().join(&PATH_LIST_SEPARATOR.to_string())
}

impl fmt::Display for PathSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# VPATH Search Paths")?;
        for path in self.selective() {
            let keyword = if path.is_target_goal() { ".path" } else { "vpath" };
            writeln!(f, "{keyword} {} {}", path.pattern(), joined_dirs(path))?;
        }
        let count = self.selective.len();
        if count == 0 {
            writeln!(f, "# No 'vpath' search paths.")?;
        } else {
            writeln!(f, "\n# {count} 'vpath' search paths.")?;
        }
        match self.general() {
            None => writeln!(f, "\n# No general ('VPATH' variable) search path."),
            Some(general) => {
                writeln!(f, "\n# General ('VPATH' variable) search path:")?;
                writeln!(f, "# {}", joined_dirs(general))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dircache::DirectoryCache;

    struct Registry;

    impl DirectoryCache for Registry {
        fn canonicalize(&mut self, dir: &str) -> String {
            dir.to_owned()
        }

        fn dirent_exists(&mut self, _dir: &str, _file: &str) -> bool {
            false
        }
    }

    #[test]
    fn empty_set_reports_no_paths() {
        let dump = PathSet::new().to_string();
        assert_eq!(
            dump,
            "# VPATH Search Paths\n# No 'vpath' search paths.\n\n# No general ('VPATH' variable) search path.\n"
        );
    }

    #[test]
    fn target_goal_entries_use_the_path_keyword() {
        let mut paths = PathSet::new();
        paths.add_pattern(Some("%.o"), Some("obj"), true, &mut Registry);
        paths.finalize("", "", &mut Registry);
        assert!(paths.to_string().contains("\n.path %.o obj\n"));
    }
}
