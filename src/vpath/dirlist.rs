//! Tokenising directory lists given to `vpath`, `VPATH` and `GPATH`.

/// Separator between entries of a search-path list.
#[cfg(not(windows))]
pub const PATH_LIST_SEPARATOR: char = ':';
/// Separator between entries of a search-path list.
#[cfg(windows)]
pub const PATH_LIST_SEPARATOR: char = ';';

const fn is_blank(ch: char) -> bool {
    matches!(ch, ' ' | '\t')
}

fn is_stop(ch: char) -> bool {
    is_blank(ch) || ch == PATH_LIST_SEPARATOR
}

/// Split a directory list into canonical directory names.
///
/// Entries are separated by [`PATH_LIST_SEPARATOR`] or by blanks that are
/// not escaped with a backslash. One trailing `/` is removed from every entry
/// except the root directory. `.` entries are dropped unless the list names
/// nothing else.
///
/// # Examples
///
/// ```
/// use kumitate::vpath::split_dir_list;
///
/// assert_eq!(split_dir_list("src/ lib:include"), ["src", "lib", "include"]);
/// assert_eq!(split_dir_list(". src"), ["src"]);
/// assert_eq!(split_dir_list("."), ["."]);
/// assert_eq!(split_dir_list("/"), ["/"]);
/// ```
#[must_use]
pub fn split_dir_list(list: &str) -> Vec<String> {
    let entries = tokens(list);
    let saw_dot = entries.iter().any(|entry| *entry == ".");
    let mut dirs: Vec<String> = entries
        .into_iter()
        .filter(|entry| *entry != ".")
        .map(str::to_owned)
        .collect();
    if dirs.is_empty() && saw_dot {
        dirs.push(".".to_owned());
    }
    dirs
}

fn tokens(list: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = list.trim_start_matches(is_stop);
    while !rest.is_empty() {
        let end = entry_end(rest);
        let (entry, tail) = rest.split_at(end);
        out.push(strip_trailing_separator(entry));
        rest = tail.trim_start_matches(is_stop);
    }
    out
}

/// Byte offset where the first entry of `text` ends.
fn entry_end(text: &str) -> usize {
    let mut escaped = false;
    for (idx, ch) in text.char_indices() {
        if ch == PATH_LIST_SEPARATOR || (is_blank(ch) && !escaped) {
            return idx;
        }
        escaped = ch == '\\' && !escaped;
    }
    text.len()
}

#[cfg(not(windows))]
fn strip_trailing_separator(entry: &str) -> &str {
    if entry.len() > 1 {
        entry.strip_suffix('/').unwrap_or(entry)
    } else {
        entry
    }
}

#[cfg(windows)]
fn strip_trailing_separator(entry: &str) -> &str {
    let drive_root = entry.len() <= 3 && entry.chars().nth(1) == Some(':');
    if entry.len() > 1 && !drive_root {
        entry
            .strip_suffix('/')
            .or_else(|| entry.strip_suffix('\\'))
            .unwrap_or(entry)
    } else {
        entry
    }
}
