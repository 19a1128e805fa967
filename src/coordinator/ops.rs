//! Operating-system signal primitives used while shutting down.

use std::io;

use super::FatalSignal;

/// Signal operations the coordinator performs on processes.
pub trait SignalOps {
    /// Restore the default disposition of `signal`.
    ///
    /// # Errors
    ///
    /// Returns the operating system error when the disposition cannot change.
    fn reset_default(&mut self, signal: FatalSignal) -> io::Result<()>;

    /// Send `signal` to the local process `pid`.
    ///
    /// # Errors
    ///
    /// Returns the operating system error when delivery fails.
    fn kill(&mut self, pid: i32, signal: FatalSignal) -> io::Result<()>;

    /// Send `signal` to the calling thread of the current process.
    ///
    /// # Errors
    ///
    /// Returns the operating system error when delivery fails.
    fn raise(&mut self, signal: FatalSignal) -> io::Result<()>;

    /// Hold back further deliveries of `signal` to the calling thread.
    ///
    /// # Errors
    ///
    /// Returns the operating system error when the mask cannot change.
    fn block(&mut self, signal: FatalSignal) -> io::Result<()>;

    /// Release `signal`, delivering it at once if it is pending.
    ///
    /// # Errors
    ///
    /// Returns the operating system error when the mask cannot change.
    fn unblock(&mut self, signal: FatalSignal) -> io::Result<()>;

    /// Whether the platform can terminate a process by signalling itself.
    fn can_self_signal(&self) -> bool;
}

/// Signal operations backed by `nix`.
#[cfg(unix)]
#[derive(Clone, Copy, Debug, Default)]
pub struct NixSignalOps;

#[cfg(unix)]
impl SignalOps for NixSignalOps {
    fn reset_default(&mut self, signal: FatalSignal) -> io::Result<()> {
        use nix::sys::signal::{SigHandler, Signal, signal as set_handler};

        let sig = Signal::try_from(signal)?;
        // SAFETY: installing SIG_DFL does not run any Rust code in signal
        // context.
        unsafe { set_handler(sig, SigHandler::SigDfl) }?;
        Ok(())
    }

    fn kill(&mut self, pid: i32, signal: FatalSignal) -> io::Result<()> {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        kill(Pid::from_raw(pid), Signal::try_from(signal)?)?;
        Ok(())
    }

    fn raise(&mut self, signal: FatalSignal) -> io::Result<()> {
        use nix::sys::signal::{Signal, raise};

        raise(Signal::try_from(signal)?)?;
        Ok(())
    }

    fn block(&mut self, signal: FatalSignal) -> io::Result<()> {
        single_set(signal)?.thread_block()?;
        Ok(())
    }

    fn unblock(&mut self, signal: FatalSignal) -> io::Result<()> {
        single_set(signal)?.thread_unblock()?;
        Ok(())
    }

    fn can_self_signal(&self) -> bool {
        true
    }
}

#[cfg(unix)]
fn single_set(signal: FatalSignal) -> io::Result<nix::sys::signal::SigSet> {
    use nix::sys::signal::{SigSet, Signal};

    let mut set = SigSet::empty();
    set.add(Signal::try_from(signal)?);
    Ok(set)
}

/// Signal operations for platforms that cannot signal processes.
///
/// Children are never signalled and shutdown always ends with an exit
/// status instead of re-delivering the signal.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExitOnlySignalOps;

impl SignalOps for ExitOnlySignalOps {
    fn reset_default(&mut self, _signal: FatalSignal) -> io::Result<()> {
        Ok(())
    }

    fn kill(&mut self, _pid: i32, _signal: FatalSignal) -> io::Result<()> {
        Err(io::Error::from(io::ErrorKind::Unsupported))
    }

    fn raise(&mut self, _signal: FatalSignal) -> io::Result<()> {
        Err(io::Error::from(io::ErrorKind::Unsupported))
    }

    fn block(&mut self, _signal: FatalSignal) -> io::Result<()> {
        Ok(())
    }

    fn unblock(&mut self, _signal: FatalSignal) -> io::Result<()> {
        Ok(())
    }

    fn can_self_signal(&self) -> bool {
        false
    }
}

/// Signal operations for the current platform.
#[must_use]
pub fn platform_signal_ops() -> Box<dyn SignalOps> {
    #[cfg(unix)]
    {
        Box::new(NixSignalOps)
    }
    #[cfg(not(unix))]
    {
        Box::new(ExitOnlySignalOps)
    }
}
