use std::fmt;

/// What a wait status says happened to a child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResultKind {
    Exited,
    Signaled,
    Suspended,
    Continued,
}

impl ResultKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            ResultKind::Exited => "Exited",
            ResultKind::Signaled => "Signaled",
            ResultKind::Suspended => "Suspended",
            ResultKind::Continued => "Continued",
        }
    }
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified wait status.
///
/// `info` is the exit code for [`ResultKind::Exited`], the terminating signal
/// for [`ResultKind::Signaled`], the stop signal for [`ResultKind::Suspended`]
/// and `0` for [`ResultKind::Continued`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WaitResult {
    pub(crate) kind: ResultKind,
    pub(crate) info: i32,
}

impl WaitResult {
    pub(crate) fn new(kind: ResultKind, info: i32) -> Self {
        Self { kind, info }
    }
}

/// Classify a raw status as filled in by `waitpid`.
///
/// The status must come from a successful wait; anything that is not a stop,
/// a signal death or a continue is treated as a normal exit.
pub(crate) fn classify(raw_status: libc::c_int) -> WaitResult {
    if unsafe { libc::WIFSTOPPED(raw_status) } {
        let signal = unsafe { libc::WSTOPSIG(raw_status) };
        return WaitResult::new(ResultKind::Suspended, signal);
    }

    if unsafe { libc::WIFCONTINUED(raw_status) } {
        return WaitResult::new(ResultKind::Continued, 0);
    }

    if unsafe { libc::WIFSIGNALED(raw_status) } {
        let signal = unsafe { libc::WTERMSIG(raw_status) };
        return WaitResult::new(ResultKind::Signaled, signal);
    }

    WaitResult::new(ResultKind::Exited, unsafe { libc::WEXITSTATUS(raw_status) })
}
