//! Classification of the signals that abort a build.

use std::fmt;

#[cfg(unix)]
use nix::libc::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};

#[cfg(not(unix))]
const SIGHUP: i32 = 1;
#[cfg(not(unix))]
const SIGINT: i32 = 2;
#[cfg(not(unix))]
const SIGQUIT: i32 = 3;
#[cfg(not(unix))]
const SIGTERM: i32 = 15;

/// A signal delivered to the build tool itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FatalSignal {
    /// `SIGTERM`.
    Terminate,
    /// `SIGINT`.
    Interrupt,
    /// `SIGHUP`.
    Hangup,
    /// `SIGQUIT`.
    Quit,
    /// Any other fatal signal, by number.
    Other(i32),
}

impl FatalSignal {
    /// Signals that should cancel the build and remove half-built targets.
    pub const CANCELLING: [Self; 4] = [Self::Terminate, Self::Interrupt, Self::Hangup, Self::Quit];

    /// Classify a raw signal number.
    #[must_use]
    pub const fn from_raw(raw: i32) -> Self {
        match raw {
            SIGTERM => Self::Terminate,
            SIGINT => Self::Interrupt,
            SIGHUP => Self::Hangup,
            SIGQUIT => Self::Quit,
            other => Self::Other(other),
        }
    }

    /// Raw signal number.
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        match self {
            Self::Terminate => SIGTERM,
            Self::Interrupt => SIGINT,
            Self::Hangup => SIGHUP,
            Self::Quit => SIGQUIT,
            Self::Other(raw) => raw,
        }
    }

    /// Whether the signal asks for the build to be cancelled.
    ///
    /// Cancelling signals forward to remote children and delete the targets
    /// of running jobs; other fatal signals only wait for the jobs.
    #[must_use]
    pub const fn is_cancelling(self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl fmt::Display for FatalSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminate => f.write_str("SIGTERM"),
            Self::Interrupt => f.write_str("SIGINT"),
            Self::Hangup => f.write_str("SIGHUP"),
            Self::Quit => f.write_str("SIGQUIT"),
            Self::Other(raw) => write!(f, "signal {raw}"),
        }
    }
}

#[cfg(unix)]
impl TryFrom<FatalSignal> for nix::sys::signal::Signal {
    type Error = nix::errno::Errno;

    fn try_from(signal: FatalSignal) -> Result<Self, Self::Error> {
        Self::try_from(signal.as_raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(FatalSignal::Terminate)]
    #[case(FatalSignal::Interrupt)]
    #[case(FatalSignal::Hangup)]
    #[case(FatalSignal::Quit)]
    fn named_signals_survive_raw_conversion(#[case] signal: FatalSignal) {
        assert_eq!(FatalSignal::from_raw(signal.as_raw()), signal);
        assert!(signal.is_cancelling());
    }

    #[test]
    fn unknown_numbers_are_other() {
        let signal = FatalSignal::from_raw(63);
        assert_eq!(signal, FatalSignal::Other(63));
        assert!(!signal.is_cancelling());
        assert_eq!(signal.to_string(), "signal 63");
    }
}
