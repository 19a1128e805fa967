//! Recognition of `archive(member)` target names.
//!
//! Static library members are named by wrapping the member in parentheses
//! after the archive file name, e.g. `libfoo.a(bar.o)`. Reading the archive
//! itself is left to the [`ArchiveNames`] implementation; [`ArchiveSyntax`]
//! only understands the naming convention.

use std::time::SystemTime;

/// Archive-name collaborator used by automatic variables and cleanup.
pub trait ArchiveNames {
    /// Whether `name` has the `archive(member)` form.
    fn is_archive_member(&self, name: &str) -> bool;

    /// Split `archive(member)` into its archive and member parts.
    fn split_archive<'a>(&self, name: &'a str) -> Option<(&'a str, &'a str)>;

    /// Date recorded for the member inside the archive, if it is present.
    fn member_mtime(&self, name: &str) -> Option<SystemTime>;
}

/// Syntax-only [`ArchiveNames`] implementation.
///
/// It never opens archives, so every member is reported as absent from its
/// archive.
#[derive(Clone, Copy, Debug, Default)]
pub struct ArchiveSyntax;

impl ArchiveNames for ArchiveSyntax {
    fn is_archive_member(&self, name: &str) -> bool {
        split_member(name).is_some()
    }

    fn split_archive<'a>(&self, name: &'a str) -> Option<(&'a str, &'a str)> {
        split_member(name)
    }

    fn member_mtime(&self, _name: &str) -> Option<SystemTime> {
        None
    }
}

/// Split `archive(member)` into `("archive", "member")`.
///
/// Names with nothing before the parenthesis, an empty member, or the
/// `archive((entry))` symbol form are not members.
///
/// # Examples
///
/// ```
/// use kumitate::archive::split_member;
///
/// assert_eq!(split_member("libm.a(sin.o)"), Some(("libm.a", "sin.o")));
/// assert_eq!(split_member("(x)"), None);
/// assert_eq!(split_member("lib.a((sym))"), None);
/// ```
#[must_use]
pub fn split_member(name: &str) -> Option<(&str, &str)> {
    let (archive, rest) = name.split_once('(')?;
    if archive.is_empty() {
        return None;
    }
    let member = rest.strip_suffix(')')?;
    if member.is_empty() {
        return None;
    }
    if member.starts_with('(') && member.ends_with(')') {
        return None;
    }
    Some((archive, member))
}

/// Return the member portion of `name`, or `name` itself when it is not an
/// archive member.
pub fn member_or_name<'a>(archives: &dyn ArchiveNames, name: &'a str) -> &'a str {
    archives
        .split_archive(name)
        .map_or(name, |(_, member)| member)
}
