//! Fatal-signal cleanup driven through mocked collaborators.

use std::fs;
use std::io;
use std::time::UNIX_EPOCH;

use anyhow::Result;
use kumitate::automatic::{AutomaticVars, VariableMaterializer};
use kumitate::coordinator::{
    Child, ChildList, ChildReaper, ExitOnlySignalOps, FatalSignal, ForgetfulReaper,
    IntermediateCleaner, JobLauncher, RemoteKiller, SignalCoordinator, SignalOps, StaleOutcome,
    Termination, TriggerOutcome,
};
use kumitate::graph::{FileTable, Target};
use kumitate::recipe::Recipe;
use kumitate::timestamp::Mtime;
use mockall::{Sequence, mock};
use rstest::{fixture, rstest};
use test_support::TempTree;

mock! {
    pub Launcher {}
    impl JobLauncher for Launcher {
        fn launch(&mut self, target: &Target, vars: &AutomaticVars);
        fn notice_finished(&mut self, target: &Target);
    }
}

mock! {
    pub Remote {}
    impl RemoteKiller for Remote {
        fn remote_kill(&mut self, pid: i32, signal: FatalSignal) -> io::Result<()>;
    }
}

mock! {
    pub Reaper {}
    impl ChildReaper for Reaper {
        fn wait_for_children(&mut self, children: &mut ChildList, quiet: bool);
    }
}

mock! {
    pub Cleaner {}
    impl IntermediateCleaner for Cleaner {
        fn remove_intermediates(&mut self, force: bool);
    }
}

mock! {
    pub Signals {}
    impl SignalOps for Signals {
        fn reset_default(&mut self, signal: FatalSignal) -> io::Result<()>;
        fn kill(&mut self, pid: i32, signal: FatalSignal) -> io::Result<()>;
        fn raise(&mut self, signal: FatalSignal) -> io::Result<()>;
        fn block(&mut self, signal: FatalSignal) -> io::Result<()>;
        fn unblock(&mut self, signal: FatalSignal) -> io::Result<()>;
        fn can_self_signal(&self) -> bool;
    }
}

#[fixture]
fn tree() -> TempTree {
    TempTree::new().expect("temp tree")
}

fn idle_launcher() -> Box<MockLauncher> {
    Box::new(MockLauncher::new())
}

fn quiet_coordinator() -> SignalCoordinator {
    SignalCoordinator::new(idle_launcher())
        .with_reaper(Box::new(ForgetfulReaper))
        .with_signal_ops(Box::new(ExitOnlySignalOps))
}

/// A target whose recorded time predates the file on disk.
fn stale_target(tree: &TempTree, rel: &str) -> Result<Target> {
    let path = tree.file(rel, "partial output")?;
    let mut target = Target::new(path.as_str());
    target.last_mtime = Mtime::At(UNIX_EPOCH);
    Ok(target)
}

fn permissive_signals() -> MockSignals {
    let mut signals = MockSignals::new();
    signals.expect_reset_default().returning(|_| Ok(()));
    signals
}

/// Signal operations that also accept holding back the signal.
fn holding_signals() -> MockSignals {
    let mut signals = permissive_signals();
    signals.expect_block().returning(|_| Ok(()));
    signals.expect_unblock().returning(|_| Ok(()));
    signals
}

#[rstest]
fn stale_targets_are_deleted_once_per_job(tree: TempTree) -> Result<()> {
    let target = stale_target(&tree, "out.o")?;
    let path = tree.path("out.o");
    let graph: FileTable = [target].into_iter().collect();
    let coordinator = quiet_coordinator();
    let mut child = Child::local(4242, path.as_str());

    coordinator.delete_targets_of_child(&mut child, &graph);
    assert!(!path.exists());
    assert!(child.deleted);

    tree.file("out.o", "rebuilt by someone else")?;
    coordinator.delete_targets_of_child(&mut child, &graph);
    assert!(path.exists(), "a second cleanup of the same job does nothing");
    Ok(())
}

#[rstest]
fn detached_jobs_keep_their_targets(tree: TempTree) -> Result<()> {
    let target = stale_target(&tree, "out.o")?;
    let path = tree.path("out.o");
    let graph: FileTable = [target].into_iter().collect();
    let mut child = Child::local(1, path.as_str());
    child.pid = None;

    quiet_coordinator().delete_targets_of_child(&mut child, &graph);
    assert!(path.exists());
    assert!(!child.deleted);
    Ok(())
}

#[rstest]
fn also_made_files_are_cleaned_with_the_job(tree: TempTree) -> Result<()> {
    let side = stale_target(&tree, "parser.h")?;
    let mut main = stale_target(&tree, "parser.c")?;
    main.also_make = vec![side.name.clone()];
    let main_name = main.name.clone();
    let graph: FileTable = [main, side].into_iter().collect();

    let mut child = Child::local(77, main_name);
    quiet_coordinator().delete_targets_of_child(&mut child, &graph);
    assert!(!tree.path("parser.c").exists());
    assert!(!tree.path("parser.h").exists());
    Ok(())
}

#[rstest]
#[case::precious(true, false)]
#[case::phony(false, true)]
fn protected_targets_are_kept(tree: TempTree, #[case] precious: bool, #[case] phony: bool) -> Result<()> {
    let mut target = stale_target(&tree, "keep.me")?;
    target.precious = precious;
    target.phony = phony;
    let outcome = quiet_coordinator().delete_target_if_stale(&target, None);
    assert!(matches!(outcome, StaleOutcome::Kept));
    assert!(tree.path("keep.me").exists());
    Ok(())
}

#[rstest]
fn untouched_targets_survive(tree: TempTree) -> Result<()> {
    let path = tree.file("fresh.o", "complete")?;
    let mut target = Target::new(path.as_str());
    target.last_mtime = Mtime::from_metadata(&fs::metadata(&path)?);
    let outcome = quiet_coordinator().delete_target_if_stale(&target, None);
    assert!(matches!(outcome, StaleOutcome::Unchanged));
    assert!(path.exists());
    Ok(())
}

#[rstest]
fn directories_are_never_deleted(tree: TempTree) -> Result<()> {
    let path = tree.dir("outdir")?;
    let mut target = Target::new(path.as_str());
    target.last_mtime = Mtime::At(UNIX_EPOCH);
    let outcome = quiet_coordinator().delete_target_if_stale(&target, None);
    assert!(matches!(outcome, StaleOutcome::Unchanged));
    assert!(path.exists());
    Ok(())
}

#[rstest]
fn missing_targets_are_reported(tree: TempTree) {
    let target = Target::new(tree.path("never-built").as_str());
    let outcome = quiet_coordinator().delete_target_if_stale(&target, Some("all"));
    assert!(matches!(outcome, StaleOutcome::NotFound));
}

#[rstest]
#[case(Mtime::At(UNIX_EPOCH), true)]
#[case(Mtime::Nonexistent, false)]
#[case(Mtime::Unknown, false)]
fn archive_members_are_only_reported(#[case] recorded: Mtime, #[case] suspect: bool) {
    let mut target = Target::new("libutil.a(str.o)");
    target.last_mtime = recorded;
    let outcome = quiet_coordinator().delete_target_if_stale(&target, None);
    if suspect {
        assert!(matches!(outcome, StaleOutcome::ArchiveSuspect));
    } else {
        assert!(matches!(outcome, StaleOutcome::Unchanged));
    }
}

#[rstest]
fn cancelling_signal_deletes_before_waiting(tree: TempTree) -> Result<()> {
    let local = stale_target(&tree, "local.o")?;
    let remote = stale_target(&tree, "remote.o")?;
    let local_path = tree.path("local.o");
    let remote_path = tree.path("remote.o");
    let mut children: ChildList = [
        Child::local(101, local.name.clone()),
        Child::remote(7, remote.name.clone()),
    ]
    .into_iter()
    .collect();
    let graph: FileTable = [local, remote].into_iter().collect();

    let mut seq = Sequence::new();
    let mut remote_hosts = MockRemote::new();
    remote_hosts
        .expect_remote_kill()
        .withf(|&pid, &signal| pid == 7 && signal == FatalSignal::Interrupt)
        .times(1)
        .returning(|_, _| Ok(()));
    let mut reaper = MockReaper::new();
    reaper
        .expect_wait_for_children()
        .times(1)
        .in_sequence(&mut seq)
        .returning(move |children, quiet| {
            assert!(quiet, "cancelling signals wait quietly");
            assert!(!local_path.exists() && !remote_path.exists());
            assert!(children.iter().all(|child| child.deleted));
            children.clear();
        });
    let mut cleaner = MockCleaner::new();
    cleaner
        .expect_remove_intermediates()
        .withf(|&force| force)
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());
    let mut signals = holding_signals();
    signals.expect_kill().never();
    signals.expect_raise().never();
    signals.expect_can_self_signal().return_const(false);

    let mut coordinator = SignalCoordinator::new(idle_launcher())
        .with_remote(Box::new(remote_hosts))
        .with_reaper(Box::new(reaper))
        .with_cleaner(Box::new(cleaner))
        .with_signal_ops(Box::new(signals));
    let termination = coordinator.handle_fatal_signal(FatalSignal::Interrupt, &mut children, &graph)?;
    assert_eq!(termination, Termination::Exit(130));
    assert!(children.is_empty());
    Ok(())
}

#[test]
fn repeated_signal_is_held_back_until_reraised() -> Result<()> {
    let mut seq = Sequence::new();
    let mut signals = MockSignals::new();
    signals
        .expect_reset_default()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    signals
        .expect_block()
        .withf(|&signal| signal == FatalSignal::Hangup)
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    let mut reaper = MockReaper::new();
    reaper
        .expect_wait_for_children()
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());
    let mut cleaner = MockCleaner::new();
    cleaner
        .expect_remove_intermediates()
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());
    signals.expect_can_self_signal().return_const(true);
    signals
        .expect_raise()
        .withf(|&signal| signal == FatalSignal::Hangup)
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    signals
        .expect_unblock()
        .withf(|&signal| signal == FatalSignal::Hangup)
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));

    let mut coordinator = SignalCoordinator::new(idle_launcher())
        .with_reaper(Box::new(reaper))
        .with_cleaner(Box::new(cleaner))
        .with_signal_ops(Box::new(signals));
    let termination =
        coordinator.handle_fatal_signal(FatalSignal::Hangup, &mut ChildList::new(), &FileTable::default())?;
    assert_eq!(termination, Termination::Reraised(FatalSignal::Hangup));
    Ok(())
}

#[test]
fn terminate_is_forwarded_to_local_jobs_and_reraised() -> Result<()> {
    let mut children: ChildList = [
        Child::local(42, "a"),
        Child::local(0, "b"),
        Child::remote(9, "c"),
    ]
    .into_iter()
    .collect();

    let mut signals = holding_signals();
    signals
        .expect_kill()
        .withf(|&pid, &signal| pid == 42 && signal == FatalSignal::Terminate)
        .times(1)
        .returning(|_, _| Ok(()));
    signals.expect_can_self_signal().return_const(true);
    signals
        .expect_raise()
        .withf(|&signal| signal == FatalSignal::Terminate)
        .times(1)
        .returning(|_| Ok(()));
    let mut remote_hosts = MockRemote::new();
    remote_hosts.expect_remote_kill().times(1).returning(|_, _| Ok(()));

    let mut coordinator = SignalCoordinator::new(idle_launcher())
        .with_remote(Box::new(remote_hosts))
        .with_reaper(Box::new(ForgetfulReaper))
        .with_signal_ops(Box::new(signals));
    let termination =
        coordinator.handle_fatal_signal(FatalSignal::Terminate, &mut children, &FileTable::default())?;
    assert_eq!(termination, Termination::Reraised(FatalSignal::Terminate));
    Ok(())
}

#[test]
fn quit_exits_with_failure_instead_of_dumping_core() -> Result<()> {
    let mut signals = holding_signals();
    signals.expect_raise().never();
    signals.expect_can_self_signal().return_const(true);
    let mut coordinator = SignalCoordinator::new(idle_launcher())
        .with_reaper(Box::new(ForgetfulReaper))
        .with_signal_ops(Box::new(signals));
    let termination =
        coordinator.handle_fatal_signal(FatalSignal::Quit, &mut ChildList::new(), &FileTable::default())?;
    assert_eq!(termination, Termination::Exit(2));
    assert_eq!(termination.exit_code(), Some(2));
    Ok(())
}

#[test]
fn failed_reraise_is_an_error() {
    let mut signals = holding_signals();
    signals.expect_can_self_signal().return_const(true);
    signals
        .expect_raise()
        .returning(|_| Err(io::Error::other("blocked")));
    let mut coordinator = SignalCoordinator::new(idle_launcher())
        .with_reaper(Box::new(ForgetfulReaper))
        .with_signal_ops(Box::new(signals));
    let err = coordinator
        .handle_fatal_signal(FatalSignal::Hangup, &mut ChildList::new(), &FileTable::default())
        .expect_err("raise failed");
    assert_eq!(err.to_string(), "kill: failed to re-deliver SIGHUP to this process");
}

#[rstest]
fn non_cancelling_signals_leave_targets_alone(tree: TempTree) -> Result<()> {
    let target = stale_target(&tree, "keep.o")?;
    let mut children: ChildList = [Child::local(55, target.name.clone())].into_iter().collect();
    let graph: FileTable = [target].into_iter().collect();

    let mut reaper = MockReaper::new();
    reaper
        .expect_wait_for_children()
        .withf(|_, &quiet| !quiet)
        .times(1)
        .return_const(());
    let mut signals = permissive_signals();
    signals.expect_kill().never();
    signals.expect_block().never();
    signals.expect_unblock().never();
    signals.expect_can_self_signal().return_const(false);

    let mut coordinator = SignalCoordinator::new(idle_launcher())
        .with_reaper(Box::new(reaper))
        .with_signal_ops(Box::new(signals));
    let termination = coordinator.handle_fatal_signal(FatalSignal::Other(10), &mut children, &graph)?;
    assert_eq!(termination, Termination::Exit(130));
    assert!(tree.path("keep.o").exists());
    Ok(())
}

#[test]
fn second_signal_is_ignored_and_jobs_stop_starting() -> Result<()> {
    let mut launcher = MockLauncher::new();
    launcher.expect_launch().never();
    let mut cleaner = MockCleaner::new();
    cleaner.expect_remove_intermediates().times(1).return_const(());
    let mut coordinator = SignalCoordinator::new(Box::new(launcher))
        .with_reaper(Box::new(ForgetfulReaper))
        .with_cleaner(Box::new(cleaner))
        .with_signal_ops(Box::new(ExitOnlySignalOps));

    let graph = FileTable::default();
    let first = coordinator.handle_fatal_signal(FatalSignal::Interrupt, &mut ChildList::new(), &graph)?;
    assert_eq!(first, Termination::Exit(130));
    let second = coordinator.handle_fatal_signal(FatalSignal::Terminate, &mut ChildList::new(), &graph)?;
    assert_eq!(second, Termination::AlreadyHandling);
    assert!(coordinator.is_handling());

    let mut target = Target::new("late");
    target.recipe = Some(Recipe::new("echo late"));
    let outcome = coordinator.trigger(&mut target, &mut VariableMaterializer::new(false), &[]);
    assert_eq!(outcome, TriggerOutcome::Suppressed);
    Ok(())
}

#[test]
fn trigger_hands_variables_to_the_launcher() {
    let mut launcher = MockLauncher::new();
    launcher
        .expect_launch()
        .withf(|target, vars| target.name == "prog" && vars.sources == "main.o util.o")
        .times(1)
        .return_const(());
    launcher.expect_notice_finished().never();
    let mut coordinator = SignalCoordinator::new(Box::new(launcher))
        .with_signal_ops(Box::new(ExitOnlySignalOps));

    let mut target = Target::new("prog");
    target.deps = test_support::deps(&[("main.o", false), ("util.o", false), ("out", true)]);
    target.recipe = Some(Recipe::new("cc -o $@ $^"));
    let outcome = coordinator.trigger(&mut target, &mut VariableMaterializer::new(false), &[]);
    assert_eq!(outcome, TriggerOutcome::Launched);
}

#[cfg(unix)]
mod trap {
    use kumitate::coordinator::{FatalSignal, NixSignalOps, SignalOps, trap};
    use nix::sys::signal::{SigSet, Signal, raise};
    use serial_test::serial;

    #[test]
    #[serial]
    fn held_back_signal_arrives_once_released() {
        let usr2 = FatalSignal::from_raw(nix::libc::SIGUSR2);
        trap::install(&[usr2]).expect("install trap");
        let mut ops = NixSignalOps;

        ops.block(usr2).expect("block");
        let mask = SigSet::thread_get_mask().expect("mask");
        assert!(mask.contains(Signal::SIGUSR2));
        raise(Signal::SIGUSR2).expect("raise");
        assert!(trap::take_pending().is_none(), "blocked signal must stay pending");

        ops.unblock(usr2).expect("unblock");
        assert_eq!(trap::take_pending(), Some(usr2));
        let mask = SigSet::thread_get_mask().expect("mask");
        assert!(!mask.contains(Signal::SIGUSR2));
    }

    #[test]
    #[serial]
    fn trapped_signal_is_recorded_until_taken() {
        let usr1 = FatalSignal::from_raw(nix::libc::SIGUSR1);
        assert!(trap::take_pending().is_none());
        trap::install(&[usr1]).expect("install trap");
        raise(Signal::SIGUSR1).expect("raise");
        assert_eq!(trap::take_pending(), Some(usr1));
        assert!(trap::take_pending().is_none());
    }
}
