use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Result, ShellError};
use crate::job_control::Pid;

/// The lifecycle state of a tracked job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JobState {
    /// Holds the terminal while the shell waits on it. Never stored in the registry.
    Foreground,
    Background,
    Stopped,
}

impl JobState {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            JobState::Foreground => "Foreground",
            JobState::Background => "Background",
            JobState::Stopped => "Stopped",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single tracked background or stopped process group.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Job {
    pub(crate) pgid: Pid,
    pub(crate) command: String,
    pub(crate) state: JobState,
}

impl Job {
    pub(crate) fn new(pgid: Pid, command: impl Into<String>, state: JobState) -> Self {
        Self {
            pgid,
            command: command.into(),
            state,
        }
    }
}

/// The shell's job table, in insertion order.
///
/// Positions are 1-based and follow iteration order, so they shift when an
/// earlier job is removed. The process-group id is the stable identity.
/// Not synchronized: go through [`SharedJobs::block`] before touching it.
#[derive(Debug, Default)]
pub(crate) struct JobRegistry {
    jobs: Vec<Job>,
}

impl JobRegistry {
    pub(crate) fn new() -> Self {
        Self { jobs: Vec::new() }
    }

    /// Append a job. Returns its position.
    pub(crate) fn insert(&mut self, job: Job) -> Result<usize> {
        let index = self.jobs.len();
        self.insert_at(index, job)
    }

    /// Insert a job at a 0-based index, clamped to the end of the table.
    /// Returns its position.
    pub(crate) fn insert_at(&mut self, index: usize, job: Job) -> Result<usize> {
        debug_assert_ne!(job.state, JobState::Foreground);
        if self.contains_group(job.pgid) {
            return Err(ShellError::DuplicateGroup(job.pgid));
        }
        let index = index.min(self.jobs.len());
        self.jobs.insert(index, job);
        Ok(index + 1)
    }

    /// Insert a job just before the first of `followers` still present, or
    /// at the end if none is left. `followers` are the groups that came
    /// after the job when it was taken out, so this restores its place in
    /// insertion order even if other jobs were removed meanwhile.
    pub(crate) fn insert_before_any(&mut self, followers: &[Pid], job: Job) -> Result<usize> {
        let index = self
            .jobs
            .iter()
            .position(|other| followers.contains(&other.pgid))
            .unwrap_or(self.jobs.len());
        self.insert_at(index, job)
    }

    #[cfg(test)]
    pub(crate) fn get(&self, position: usize) -> Option<&Job> {
        position.checked_sub(1).and_then(|i| self.jobs.get(i))
    }

    pub(crate) fn get_mut(&mut self, position: usize) -> Option<&mut Job> {
        position.checked_sub(1).and_then(|i| self.jobs.get_mut(i))
    }

    pub(crate) fn find_by_group(&mut self, pgid: Pid) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|job| job.pgid == pgid)
    }

    pub(crate) fn contains_group(&self, pgid: Pid) -> bool {
        self.jobs.iter().any(|job| job.pgid == pgid)
    }

    /// Remove the job at `position`, handing it back to the caller.
    pub(crate) fn take(&mut self, position: usize) -> Option<Job> {
        let index = position.checked_sub(1)?;
        (index < self.jobs.len()).then(|| self.jobs.remove(index))
    }

    /// Remove the job owning `pgid`.
    pub(crate) fn remove(&mut self, pgid: Pid) -> Option<Job> {
        let index = self.jobs.iter().position(|job| job.pgid == pgid)?;
        Some(self.jobs.remove(index))
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.jobs.len()
    }

    /// `(position, job)` pairs in the order `jobs` reports them.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (usize, &Job)> {
        self.jobs.iter().enumerate().map(|(i, job)| (i + 1, job))
    }

    /// Process-group ids of every tracked job, in order.
    pub(crate) fn groups(&self) -> Vec<Pid> {
        self.jobs.iter().map(|job| job.pgid).collect()
    }
}

/// Handle to the registry shared by the command loop and the reconciler.
#[derive(Debug, Clone)]
pub(crate) struct SharedJobs {
    inner: Arc<Mutex<JobRegistry>>,
}

impl Default for SharedJobs {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedJobs {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(JobRegistry::new())),
        }
    }

    /// Enter the exclusion scope: while the returned guard lives, no
    /// reconciliation pass can run. Not reentrant; never nest two scopes
    /// on the same thread.
    ///
    /// Every mutation leaves the table consistent, so a poisoned lock is
    /// taken over rather than propagated.
    pub(crate) fn block(&self) -> BlockedJobs<'_> {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        BlockedJobs { guard }
    }
}

/// The registry, borrowed for the duration of a blocking scope.
pub(crate) struct BlockedJobs<'a> {
    guard: MutexGuard<'a, JobRegistry>,
}

impl Deref for BlockedJobs<'_> {
    type Target = JobRegistry;

    fn deref(&self) -> &JobRegistry {
        &self.guard
    }
}

impl DerefMut for BlockedJobs<'_> {
    fn deref_mut(&mut self) -> &mut JobRegistry {
        &mut self.guard
    }
}
