//! Per-line recipe modifiers.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Set of modifiers attached to one recipe line.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LineFlags(u8);

impl LineFlags {
    /// `+`: run even under `-n`, `-t` or `-q`; also set by `$(MAKE)`.
    pub const RECURSE: Self = Self(0b001);
    /// `@`: do not echo the line.
    pub const SILENT: Self = Self(0b010);
    /// `-`: ignore a failing exit status.
    pub const IGNORE_ERRORS: Self = Self(0b100);

    /// No modifiers.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Whether every flag in `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no flag is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Raw bit representation.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Flag selected by a recipe prefix character, if it is one.
    #[must_use]
    pub const fn from_prefix(ch: char) -> Option<Self> {
        match ch {
            '+' => Some(Self::RECURSE),
            '@' => Some(Self::SILENT),
            '-' => Some(Self::IGNORE_ERRORS),
            _ => None,
        }
    }
}

impl BitOr for LineFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for LineFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for LineFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (Self::RECURSE, "RECURSE"),
            (Self::SILENT, "SILENT"),
            (Self::IGNORE_ERRORS, "IGNORE_ERRORS"),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| name)
        .collect();
        write!(f, "LineFlags({})", names.join(" | "))
    }
}

impl fmt::Display for LineFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (flag, marker) in [
            (Self::IGNORE_ERRORS, '-'),
            (Self::SILENT, '@'),
            (Self::RECURSE, '+'),
        ] {
            if self.contains(flag) {
                write!(f, "{marker}")?;
            }
        }
        Ok(())
    }
}
