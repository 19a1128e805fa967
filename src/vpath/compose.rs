//! Path composition for search-path candidates.

/// Join a search directory and a (possibly nested) relative name.
///
/// A single `/` separates the two unless `dir` already ends in one, as the
/// root directory does.
///
/// # Examples
///
/// ```
/// use kumitate::vpath::compose_path;
///
/// assert_eq!(compose_path("src", "x.c"), "src/x.c");
/// assert_eq!(compose_path("src", "sub/x.c"), "src/sub/x.c");
/// assert_eq!(compose_path("/", "x.c"), "/x.c");
/// ```
#[must_use]
pub fn compose_path(dir: &str, rest: &str) -> String {
    let mut path = String::with_capacity(dir.len() + 1 + rest.len());
    path.push_str(dir);
    if !path.is_empty() && !path.ends_with(is_separator) {
        path.push('/');
    }
    path.push_str(rest);
    path
}

/// Split `name` at its last directory separator.
///
/// Returns the directory prefix (if any) and the name within that directory.
pub(crate) fn split_dir_prefix(name: &str) -> (Option<&str>, &str) {
    match name.rfind(is_separator) {
        Some(idx) if idx > 0 => {
            let (dir, file) = name.split_at(idx);
            (Some(dir), file.get(1..).unwrap_or_default())
        }
        _ => (None, name),
    }
}

#[cfg(not(windows))]
const fn is_separator(ch: char) -> bool {
    ch == '/'
}

#[cfg(windows)]
const fn is_separator(ch: char) -> bool {
    matches!(ch, '/' | '\\')
}

/// Whether `name` is rooted, so searching directories is pointless.
pub(crate) fn is_absolute(name: &str) -> bool {
    if name.starts_with(is_separator) {
        return true;
    }
    cfg!(windows) && name.chars().nth(1) == Some(':')
}
