//! Process-wide trap for fatal signals.
//!
//! The installed handler only records the signal number. The build driver
//! polls [`take_pending`] between scheduling steps and runs the cleanup in
//! [`SignalCoordinator::handle_fatal_signal`](super::SignalCoordinator::handle_fatal_signal)
//! on its own thread, where allocation, logging and file removal are safe.

use std::sync::atomic::{AtomicI32, Ordering};

use super::{FatalSignal, SignalError};

static PENDING: AtomicI32 = AtomicI32::new(0);

#[cfg(unix)]
extern "C" fn record(raw: nix::libc::c_int) {
    PENDING.store(raw, Ordering::SeqCst);
}

/// Route `signals` to the trap.
///
/// On platforms without POSIX signals this does nothing.
///
/// # Errors
///
/// Returns [`SignalError::Install`] for the first signal whose handler
/// cannot be installed.
pub fn install(signals: &[FatalSignal]) -> Result<(), SignalError> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};

        let action = SigAction::new(
            SigHandler::Handler(record),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );
        for &signal in signals {
            let install_one = || -> nix::Result<()> {
                let sig = Signal::try_from(signal)?;
                // SAFETY: `record` performs a single atomic store, which is
                // async-signal-safe.
                unsafe { sigaction(sig, &action) }?;
                Ok(())
            };
            install_one().map_err(|errno| SignalError::Install {
                signal,
                source: errno.into(),
            })?;
        }
    }
    #[cfg(not(unix))]
    let _ = signals;
    Ok(())
}

/// Take the most recent trapped signal, clearing it.
#[must_use]
pub fn take_pending() -> Option<FatalSignal> {
    match PENDING.swap(0, Ordering::SeqCst) {
        0 => None,
        raw => Some(FatalSignal::from_raw(raw)),
    }
}
