//! Modification-time bookkeeping for targets and resolved prerequisites.
//!
//! A build tool needs more than a bare [`SystemTime`]: a file may not have
//! been checked yet, may be known not to exist, or may have been forced old
//! or new from the command line (`-o` and `-W`). [`Mtime`] carries those
//! states alongside real timestamps.

use std::fs::Metadata;
use std::time::{SystemTime, UNIX_EPOCH};

/// Last known modification time of a file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mtime {
    /// The file has not been examined yet.
    #[default]
    Unknown,
    /// The file was examined and does not exist.
    Nonexistent,
    /// The file is treated as very old regardless of its real timestamp.
    AssumeOld,
    /// The file is treated as infinitely new regardless of its real timestamp.
    AssumeNew,
    /// A timestamp read from the filesystem.
    At(SystemTime),
}

impl Mtime {
    /// Capture the modification time from file metadata.
    ///
    /// Platforms that cannot report modification times yield
    /// [`Mtime::Unknown`].
    #[must_use]
    pub fn from_metadata(meta: &Metadata) -> Self {
        meta.modified().map_or(Self::Unknown, Self::At)
    }

    /// Report whether the value is one of the command-line sentinels.
    #[must_use]
    pub const fn is_assumed(self) -> bool {
        matches!(self, Self::AssumeOld | Self::AssumeNew)
    }

    /// Report whether `on_disk` is the same instant as this recorded time.
    ///
    /// Only [`Mtime::At`] can match a real timestamp.
    #[must_use]
    pub fn matches(self, on_disk: SystemTime) -> bool {
        matches!(self, Self::At(recorded) if recorded == on_disk)
    }

    /// Whole seconds since the Unix epoch, as archive headers record them.
    ///
    /// `None` for values that are not real timestamps and for times before
    /// the epoch.
    #[must_use]
    pub fn whole_seconds(self) -> Option<u64> {
        match self {
            Self::At(time) => time.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs()),
            _ => None,
        }
    }
}
