//! `%` pattern handling for search-path selection.

/// Unescape `raw` and locate its wildcard.
///
/// Returns the pattern with quoting backslashes removed and the byte offset
/// of the first unquoted `%`. A `%` preceded by an odd run of backslashes is
/// literal; each pair of backslashes before a `%` collapses to one. Text after
/// the active wildcard is kept verbatim, so the result never records more
/// than one wildcard position.
///
/// # Examples
///
/// ```
/// use kumitate::vpath::find_percent;
///
/// assert_eq!(find_percent("%.c"), ("%.c".to_owned(), Some(0)));
/// assert_eq!(find_percent(r"a\%b%"), ("a%b%".to_owned(), Some(3)));
/// assert_eq!(find_percent("plain"), ("plain".to_owned(), None));
/// ```
#[must_use]
pub fn find_percent(raw: &str) -> (String, Option<usize>) {
    let mut out = String::with_capacity(raw.len());
    let mut percent = None;
    let mut backslashes = 0_usize;
    for ch in raw.chars() {
        if ch == '\\' && percent.is_none() {
            backslashes += 1;
            continue;
        }
        if ch == '%' && percent.is_none() {
            push_backslashes(&mut out, backslashes >> 1);
            if backslashes.is_multiple_of(2) {
                percent = Some(out.len());
            }
        } else {
            push_backslashes(&mut out, backslashes);
        }
        backslashes = 0;
        out.push(ch);
    }
    push_backslashes(&mut out, backslashes);
    (out, percent)
}

fn push_backslashes(out: &mut String, count: usize) {
    out.extend(std::iter::repeat_n('\\', count));
}

/// Match `name` against `pattern` whose wildcard sits at `percent`.
///
/// Without a wildcard the match is exact. With one, `name` must start with the
/// text before the `%`, end with the text after it, and leave room for a
/// (possibly empty) stem between them.
#[must_use]
pub fn pattern_matches(pattern: &str, percent: Option<usize>, name: &str) -> bool {
    let Some(offset) = percent else {
        return pattern == name;
    };
    if !pattern.is_char_boundary(offset) {
        return false;
    }
    let (prefix, rest) = pattern.split_at(offset);
    let suffix = rest.strip_prefix('%').unwrap_or(rest);
    name.len() >= prefix.len() + suffix.len()
        && name.starts_with(prefix)
        && name.ends_with(suffix)
}

/// Match used for search-path selection.
///
/// A pattern ending in `.` additionally matches names that have no extension
/// at all, as if the trailing dot were absent.
pub(crate) fn search_pattern_matches(pattern: &str, percent: Option<usize>, name: &str) -> bool {
    if pattern_matches(pattern, percent, name) {
        return true;
    }
    match pattern.strip_suffix('.') {
        Some(stripped) if !name.contains('.') => {
            let trimmed_percent = percent.filter(|&p| p < stripped.len());
            pattern_matches(stripped, trimmed_percent, name)
        }
        _ => false,
    }
}
