//! Starting recipes and cleaning up after fatal signals.
//!
//! [`SignalCoordinator::trigger`] is the last step before a target's recipe is
//! handed to the job launcher: it short-circuits empty recipes, computes the
//! automatic variables and unloads dynamically loaded objects bound to the
//! target.
//!
//! When the build receives a fatal signal, [`SignalCoordinator::handle_fatal_signal`]
//! forwards it to running jobs, deletes the targets those jobs may have left
//! half-written, waits for the jobs, removes intermediate files and finally
//! lets the signal terminate the process. The signal itself is caught by the
//! minimal handler in [`trap`]; the cleanup runs on the driver's thread once
//! the driver notices the pending signal.
//!
//! Collaborators outside this crate (job launching, remote execution,
//! intermediate files, loaded objects) are reached through traits so the
//! coordinator can be driven by any scheduler and exercised in tests without
//! touching real processes.
//!
//! # Driving the coordinator
//!
//! The crate does not run builds itself, so a driver wires the pieces
//! together: it calls [`trap::install`] before starting jobs, checks
//! [`trap::take_pending`] between scheduling steps, passes a pending signal
//! to [`SignalCoordinator::handle_fatal_signal`] and ends the process with
//! [`Termination::finish`].
//!
//! ```no_run
//! use kumitate::automatic::AutomaticVars;
//! use kumitate::coordinator::{
//!     ChildList, FatalSignal, JobLauncher, SignalCoordinator, SignalError, trap,
//! };
//! use kumitate::graph::{FileTable, Target};
//!
//! struct Jobs;
//!
//! impl JobLauncher for Jobs {
//!     fn launch(&mut self, _target: &Target, _vars: &AutomaticVars) {}
//!     fn notice_finished(&mut self, _target: &Target) {}
//! }
//!
//! fn main() -> Result<(), SignalError> {
//!     trap::install(&FatalSignal::CANCELLING)?;
//!     let mut coordinator = SignalCoordinator::new(Box::new(Jobs));
//!     let mut children = ChildList::new();
//!     let graph = FileTable::default();
//!     loop {
//!         // Start and reap jobs here.
//!         if let Some(signal) = trap::take_pending() {
//!             coordinator
//!                 .handle_fatal_signal(signal, &mut children, &graph)?
//!                 .finish();
//!             return Ok(());
//!         }
//!     }
//! }
//! ```

mod children;
mod cleanup;
mod error;
mod ops;
mod signal;
pub mod trap;

use std::io;

use tracing::{debug, info};

use crate::archive::{ArchiveNames, ArchiveSyntax};
use crate::automatic::{AutomaticVars, VariableMaterializer};
use crate::graph::{CommandState, DependencyGraph, Target, UpdateStatus};

pub use children::{Child, ChildList, ChildReaper, ForgetfulReaper, platform_reaper};
#[cfg(unix)]
pub use children::WaitpidReaper;
pub use cleanup::StaleOutcome;
pub use error::SignalError;
#[cfg(unix)]
pub use ops::NixSignalOps;
pub use ops::{ExitOnlySignalOps, SignalOps, platform_signal_ops};
pub use signal::FatalSignal;

/// Exit status after a quit signal, reported as a build failure.
pub const QUIT_EXIT_STATUS: i32 = 2;

/// Exit status used where a process cannot signal itself, as shells report
/// an interrupted command.
pub const INTERRUPTED_EXIT_STATUS: i32 = 130;

/// Starts recipe jobs.
pub trait JobLauncher {
    /// Start a job running `target`'s recipe with the given variables.
    fn launch(&mut self, target: &Target, vars: &AutomaticVars);

    /// Record that `target` finished without running a job.
    fn notice_finished(&mut self, target: &Target);
}

/// Signals jobs running on remote hosts.
pub trait RemoteKiller {
    /// Send `signal` to the remote job `pid`.
    ///
    /// # Errors
    ///
    /// Returns the transport error when the signal could not be delivered.
    fn remote_kill(&mut self, pid: i32, signal: FatalSignal) -> io::Result<()>;
}

/// Removes intermediate files made during the build.
pub trait IntermediateCleaner {
    /// Delete non-precious intermediate files; `force` skips the usual
    /// progress message.
    fn remove_intermediates(&mut self, force: bool);
}

/// Manages objects loaded into the build tool for a target.
pub trait ObjectLoader {
    /// Unload the object bound to `name`, reporting success.
    fn unload(&mut self, name: &str) -> bool;
}

/// Remote execution is not configured; nothing to signal.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoRemoteHosts;

impl RemoteKiller for NoRemoteHosts {
    fn remote_kill(&mut self, _pid: i32, _signal: FatalSignal) -> io::Result<()> {
        Ok(())
    }
}

/// No intermediate-file bookkeeping.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoIntermediates;

impl IntermediateCleaner for NoIntermediates {
    fn remove_intermediates(&mut self, _force: bool) {}
}

/// Dynamic loading is not supported; unloading always fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoLoadedObjects;

impl ObjectLoader for NoLoadedObjects {
    fn unload(&mut self, _name: &str) -> bool {
        false
    }
}

/// Result of [`SignalCoordinator::trigger`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A fatal signal is being handled; no new jobs start.
    Suppressed,
    /// The recipe had nothing to run; the target is already finished.
    NothingToDo,
    /// A job was handed to the launcher.
    Launched,
}

/// How the process should end after a fatal signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    /// Another invocation is already handling a fatal signal.
    AlreadyHandling,
    /// Exit with the given status.
    Exit(i32),
    /// The signal was re-delivered with its default disposition.
    Reraised(FatalSignal),
}

impl Termination {
    /// Process exit status for this outcome, if the process should exit.
    #[must_use]
    pub const fn exit_code(self) -> Option<i32> {
        match self {
            Self::AlreadyHandling => None,
            Self::Exit(code) => Some(code),
            Self::Reraised(signal) => Some(128 + signal.as_raw()),
        }
    }

    /// End the process as this outcome requires.
    ///
    /// Returns only for [`Termination::AlreadyHandling`].
    pub fn finish(self) {
        if let Some(code) = self.exit_code() {
            std::process::exit(code);
        }
    }
}

/// Starts recipes and runs fatal-signal cleanup.
pub struct SignalCoordinator {
    launcher: Box<dyn JobLauncher>,
    remote: Box<dyn RemoteKiller>,
    reaper: Box<dyn ChildReaper>,
    cleaner: Box<dyn IntermediateCleaner>,
    loader: Box<dyn ObjectLoader>,
    signals: Box<dyn SignalOps>,
    archives: Box<dyn ArchiveNames>,
    handling: bool,
}

impl SignalCoordinator {
    /// Create a coordinator starting jobs with `launcher`.
    ///
    /// Other collaborators default to the platform's signal operations and
    /// reaper, no remote hosts, no intermediate files and no loaded objects.
    #[must_use]
    pub fn new(launcher: Box<dyn JobLauncher>) -> Self {
        Self {
            launcher,
            remote: Box::new(NoRemoteHosts),
            reaper: platform_reaper(),
            cleaner: Box::new(NoIntermediates),
            loader: Box::new(NoLoadedObjects),
            signals: platform_signal_ops(),
            archives: Box::new(ArchiveSyntax),
            handling: false,
        }
    }

    /// Use `remote` to signal remote jobs.
    #[must_use]
    pub fn with_remote(mut self, remote: Box<dyn RemoteKiller>) -> Self {
        self.remote = remote;
        self
    }

    /// Use `reaper` to wait for jobs.
    #[must_use]
    pub fn with_reaper(mut self, reaper: Box<dyn ChildReaper>) -> Self {
        self.reaper = reaper;
        self
    }

    /// Use `cleaner` to remove intermediate files.
    #[must_use]
    pub fn with_cleaner(mut self, cleaner: Box<dyn IntermediateCleaner>) -> Self {
        self.cleaner = cleaner;
        self
    }

    /// Use `loader` to unload objects bound to targets.
    #[must_use]
    pub fn with_loader(mut self, loader: Box<dyn ObjectLoader>) -> Self {
        self.loader = loader;
        self
    }

    /// Use `signals` for signal delivery.
    #[must_use]
    pub fn with_signal_ops(mut self, signals: Box<dyn SignalOps>) -> Self {
        self.signals = signals;
        self
    }

    /// Use `archives` to recognise archive members during cleanup.
    #[must_use]
    pub fn with_archives(mut self, archives: Box<dyn ArchiveNames>) -> Self {
        self.archives = archives;
        self
    }

    /// Whether a fatal signal is being handled.
    #[must_use]
    pub const fn is_handling(&self) -> bool {
        self.handling
    }

    /// Start `target`'s recipe.
    ///
    /// A recipe made only of blanks and line modifiers finishes the target
    /// immediately. Otherwise the automatic variables are computed with
    /// `materializer` (`suffixes` is the `.SUFFIXES` list), a loaded object
    /// bound to the target is unloaded and the job is launched.
    pub fn trigger(
        &mut self,
        target: &mut Target,
        materializer: &mut VariableMaterializer,
        suffixes: &[String],
    ) -> TriggerOutcome {
        if self.handling {
            debug!(target = %target.name, "not starting a job during fatal-signal cleanup");
            return TriggerOutcome::Suppressed;
        }
        if target.recipe.as_ref().is_none_or(crate::recipe::Recipe::is_blank) {
            target.command_state = CommandState::Running;
            target.update_status = UpdateStatus::Success;
            self.launcher.notice_finished(target);
            return TriggerOutcome::NothingToDo;
        }

        let vars = materializer.compute(target, None, suffixes);
        if target.loaded && self.loader.unload(&target.name) {
            debug!(target = %target.name, "unloaded object before running recipe");
            target.loaded = false;
            target.unloaded = true;
        }
        self.launcher.launch(target, vars);
        TriggerOutcome::Launched
    }

    /// Clean up after `signal` and decide how the process ends.
    ///
    /// Running jobs get the signal where the operating system would not
    /// deliver it to them. For cancelling signals further deliveries of the
    /// signal are held back, and every job's stale targets are deleted before
    /// waiting for the jobs. Intermediate files are then
    /// removed. A quit signal exits with [`QUIT_EXIT_STATUS`] rather than
    /// dumping core; other signals are re-delivered to this process with
    /// their default disposition, or end in [`INTERRUPTED_EXIT_STATUS`] where
    /// that is impossible. A held-back signal is released only after it has
    /// been raised again, so it takes effect at that point.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::Reraise`] when re-delivering or releasing the
    /// signal fails.
    pub fn handle_fatal_signal(
        &mut self,
        signal: FatalSignal,
        children: &mut ChildList,
        graph: &dyn DependencyGraph,
    ) -> Result<Termination, SignalError> {
        if self.handling {
            debug!(%signal, "fatal signal already being handled");
            return Ok(Termination::AlreadyHandling);
        }
        self.handling = true;
        info!(%signal, jobs = children.len(), "handling fatal signal");

        if let Err(err) = self.signals.reset_default(signal) {
            debug!(%signal, error = %err, "cannot restore default disposition");
        }
        if signal == FatalSignal::Terminate {
            self.kill_local_children(signal, children);
        }
        if signal.is_cancelling() {
            if let Err(err) = self.signals.block(signal) {
                debug!(%signal, error = %err, "cannot block repeated signal");
            }
            self.kill_remote_children(signal, children);
            for child in children.iter_mut() {
                self.delete_targets_of_child(child, graph);
            }
            self.reaper.wait_for_children(children, true);
        } else {
            self.reaper.wait_for_children(children, false);
        }
        self.cleaner.remove_intermediates(true);

        if signal == FatalSignal::Quit {
            return Ok(Termination::Exit(QUIT_EXIT_STATUS));
        }
        if !self.signals.can_self_signal() {
            return Ok(Termination::Exit(INTERRUPTED_EXIT_STATUS));
        }
        self.signals
            .raise(signal)
            .map_err(|source| SignalError::Reraise { signal, source })?;
        if signal.is_cancelling() {
            self.signals
                .unblock(signal)
                .map_err(|source| SignalError::Reraise { signal, source })?;
        }
        Ok(Termination::Reraised(signal))
    }

    fn kill_local_children(&mut self, signal: FatalSignal, children: &ChildList) {
        let pids = children
            .iter()
            .filter(|child| !child.remote)
            .filter_map(|child| child.pid)
            .filter(|&pid| pid > 0);
        for pid in pids {
            if let Err(err) = self.signals.kill(pid, signal) {
                debug!(pid, error = %err, "cannot signal job");
            }
        }
    }

    fn kill_remote_children(&mut self, signal: FatalSignal, children: &ChildList) {
        let pids = children
            .iter()
            .filter(|child| child.remote)
            .filter_map(|child| child.pid)
            .filter(|&pid| pid > 0);
        for pid in pids {
            if let Err(err) = self.remote.remote_kill(pid, signal) {
                debug!(pid, error = %err, "cannot signal remote job");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::Recipe;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Log {
        launched: Vec<(String, String)>,
        finished: Vec<String>,
    }

    struct Recorder(Rc<RefCell<Log>>);

    impl JobLauncher for Recorder {
        fn launch(&mut self, target: &Target, vars: &AutomaticVars) {
            self.0
                .borrow_mut()
                .launched
                .push((target.name.clone(), vars.sources.clone()));
        }

        fn notice_finished(&mut self, target: &Target) {
            self.0.borrow_mut().finished.push(target.name.clone());
        }
    }

    fn coordinator() -> (SignalCoordinator, Rc<RefCell<Log>>) {
        let log = Rc::new(RefCell::new(Log::default()));
        let coordinator = SignalCoordinator::new(Box::new(Recorder(Rc::clone(&log))))
            .with_reaper(Box::new(ForgetfulReaper))
            .with_signal_ops(Box::new(ExitOnlySignalOps));
        (coordinator, log)
    }

    #[test]
    fn blank_recipes_finish_without_a_job() {
        let (mut coordinator, log) = coordinator();
        let mut target = Target::new("stamp");
        target.recipe = Some(Recipe::new(" @-\n\t+ \n"));
        let outcome = coordinator.trigger(&mut target, &mut VariableMaterializer::new(false), &[]);
        assert_eq!(outcome, TriggerOutcome::NothingToDo);
        assert_eq!(target.command_state, CommandState::Running);
        assert_eq!(target.update_status, UpdateStatus::Success);
        assert_eq!(log.borrow().finished, ["stamp"]);
        assert!(log.borrow().launched.is_empty());
    }

    #[test]
    fn recipes_launch_with_computed_variables() {
        let (mut coordinator, log) = coordinator();
        let mut target = Target::new("prog");
        target.deps = vec![crate::graph::Dependency::new("main.o")];
        target.recipe = Some(Recipe::new("cc -o $@ $^"));
        target.loaded = true;
        let outcome = coordinator.trigger(&mut target, &mut VariableMaterializer::new(false), &[]);
        assert_eq!(outcome, TriggerOutcome::Launched);
        assert_eq!(log.borrow().launched, [("prog".to_owned(), "main.o".to_owned())]);
        assert!(target.loaded, "a failed unload leaves the target loaded");
        assert!(!target.unloaded);
    }

    #[test]
    fn exit_codes_follow_the_outcome() {
        assert_eq!(Termination::AlreadyHandling.exit_code(), None);
        assert_eq!(Termination::Exit(QUIT_EXIT_STATUS).exit_code(), Some(2));
        let interrupted = Termination::Reraised(FatalSignal::Interrupt);
        assert_eq!(interrupted.exit_code(), Some(128 + FatalSignal::Interrupt.as_raw()));
    }

    #[test]
    fn finish_returns_while_another_handler_runs() {
        Termination::AlreadyHandling.finish();
    }
}
