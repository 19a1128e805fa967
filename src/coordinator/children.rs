//! Records of running recipe jobs.

use tracing::{debug, warn};

/// A job running a target's recipe.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Child {
    /// Process id, or `None` once the job has been detached from its process.
    pub pid: Option<i32>,
    /// Target the job is building.
    pub target: String,
    /// Whether the job runs on a remote host.
    pub remote: bool,
    /// Whether the job's targets have already been deleted.
    pub deleted: bool,
}

impl Child {
    /// A local job with process id `pid`.
    #[must_use]
    pub fn local(pid: i32, target: impl Into<String>) -> Self {
        Self {
            pid: Some(pid),
            target: target.into(),
            remote: false,
            deleted: false,
        }
    }

    /// A job running on a remote host under the remote id `pid`.
    #[must_use]
    pub fn remote(pid: i32, target: impl Into<String>) -> Self {
        Self {
            remote: true,
            ..Self::local(pid, target)
        }
    }

    /// Whether the job has been detached from its process.
    #[must_use]
    pub const fn is_detached(&self) -> bool {
        self.pid.is_none()
    }
}

/// The build's running jobs, in start order.
#[derive(Clone, Debug, Default)]
pub struct ChildList {
    children: Vec<Child>,
}

impl ChildList {
    /// Create an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            children: Vec::new(),
        }
    }

    /// Record a started job.
    pub fn push(&mut self, child: Child) {
        self.children.push(child);
    }

    /// Forget the job with process id `pid`, returning it.
    pub fn remove_pid(&mut self, pid: i32) -> Option<Child> {
        let idx = self.children.iter().position(|child| child.pid == Some(pid))?;
        Some(self.children.remove(idx))
    }

    /// Forget every job.
    pub fn clear(&mut self) {
        self.children.clear();
    }

    /// Iterate over the jobs.
    pub fn iter(&self) -> std::slice::Iter<'_, Child> {
        self.children.iter()
    }

    /// Iterate mutably over the jobs.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Child> {
        self.children.iter_mut()
    }

    /// Number of running jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Whether no job is running.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl FromIterator<Child> for ChildList {
    fn from_iter<I: IntoIterator<Item = Child>>(iter: I) -> Self {
        Self {
            children: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ChildList {
    type Item = &'a Child;
    type IntoIter = std::slice::Iter<'a, Child>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Waits for running jobs to exit.
pub trait ChildReaper {
    /// Block until `children` is empty, removing each job as it exits.
    ///
    /// Unless `quiet`, announce that the build is waiting for unfinished jobs.
    fn wait_for_children(&mut self, children: &mut ChildList, quiet: bool);
}

fn announce(children: &ChildList, quiet: bool) {
    if !quiet && !children.is_empty() {
        warn!("*** Waiting for unfinished jobs....");
    }
}

/// Reaps local jobs with `waitpid`.
///
/// Detached and remote jobs cannot be waited for locally and are dropped
/// from the list.
#[cfg(unix)]
#[derive(Clone, Copy, Debug, Default)]
pub struct WaitpidReaper;

#[cfg(unix)]
impl ChildReaper for WaitpidReaper {
    fn wait_for_children(&mut self, children: &mut ChildList, quiet: bool) {
        use nix::errno::Errno;
        use nix::sys::wait::waitpid;
        use nix::unistd::Pid;

        announce(children, quiet);
        children
            .children
            .retain(|child| !child.remote && child.pid.is_some());
        while !children.is_empty() {
            match waitpid(Pid::from_raw(-1), None) {
                Ok(status) => {
                    if let Some(pid) = status.pid()
                        && let Some(child) = children.remove_pid(pid.as_raw())
                    {
                        debug!(target = %child.target, pid = pid.as_raw(), "reaped job");
                    }
                }
                Err(Errno::EINTR) => {}
                Err(errno) => {
                    debug!(error = %errno, "no more jobs to reap");
                    children.clear();
                }
            }
        }
    }
}

/// Forgets jobs without waiting, for platforms without `waitpid`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ForgetfulReaper;

impl ChildReaper for ForgetfulReaper {
    fn wait_for_children(&mut self, children: &mut ChildList, quiet: bool) {
        announce(children, quiet);
        children.clear();
    }
}

/// Reaper for the current platform.
#[must_use]
pub fn platform_reaper() -> Box<dyn ChildReaper> {
    #[cfg(unix)]
    {
        Box::new(WaitpidReaper)
    }
    #[cfg(not(unix))]
    {
        Box::new(ForgetfulReaper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_jobs_by_pid() {
        let mut children: ChildList = [Child::local(10, "a"), Child::remote(11, "b")]
            .into_iter()
            .collect();
        assert_eq!(children.remove_pid(11).map(|c| c.target), Some("b".to_owned()));
        assert_eq!(children.remove_pid(11), None);
        assert_eq!(children.len(), 1);
    }

    #[test]
    fn forgetful_reaper_empties_the_list() {
        let mut children: ChildList = std::iter::once(Child::local(1, "a")).collect();
        ForgetfulReaper.wait_for_children(&mut children, true);
        assert!(children.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn waitpid_reaper_reaps_real_processes() {
        let spawned = std::process::Command::new("true").spawn().expect("spawn true");
        let pid = i32::try_from(spawned.id()).expect("pid fits");
        let mut children: ChildList = [Child::local(pid, "out"), Child::remote(99, "far")]
            .into_iter()
            .collect();
        WaitpidReaper.wait_for_children(&mut children, true);
        assert!(children.is_empty());
    }
}
