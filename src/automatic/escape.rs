//! Space escaping for automatic-variable word lists.

use std::borrow::Cow;

/// Escape every space in `name` with a backslash.
///
/// # Examples
///
/// ```
/// use kumitate::automatic::escape_spaces;
///
/// assert_eq!(escape_spaces("my file.c"), r"my\ file.c");
/// assert_eq!(escape_spaces("plain.c"), "plain.c");
/// ```
#[must_use]
pub fn escape_spaces(name: &str) -> Cow<'_, str> {
    if name.contains(' ') {
        let mut out = String::with_capacity(name.len() + 4);
        push_escaped(&mut out, name);
        Cow::Owned(out)
    } else {
        Cow::Borrowed(name)
    }
}

/// Append `name` to `buf` with spaces escaped.
pub(crate) fn push_escaped(buf: &mut String, name: &str) {
    for ch in name.chars() {
        if ch == ' ' {
            buf.push('\\');
        }
        buf.push(ch);
    }
}

/// Append `name` as the next word of a space-separated list.
pub(crate) fn push_word(buf: &mut String, name: &str) {
    if !buf.is_empty() {
        buf.push(' ');
    }
    push_escaped(buf, name);
}
