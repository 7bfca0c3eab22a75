use std::io;

use tracing::warn;

use crate::status::{self, WaitResult};

pub(crate) type Pid = libc::pid_t;

/// Terminal signals the shell ignores and every child restores.
const TERMINAL_SIGNALS: [libc::c_int; 4] =
    [libc::SIGQUIT, libc::SIGTSTP, libc::SIGTTIN, libc::SIGTTOU];

/// The process and terminal operations job control needs from the OS.
pub(crate) trait ProcessControl {
    /// Block until the group stops or terminates.
    fn wait_group(&self, pgid: Pid) -> io::Result<WaitResult>;

    /// Non-blocking, stop/continue-aware poll. `Ok(None)` means no change.
    fn poll_group(&self, pgid: Pid) -> io::Result<Option<WaitResult>>;

    /// Send SIGCONT to every process in the group.
    fn continue_group(&self, pgid: Pid) -> io::Result<()>;

    /// Make `pgid` the foreground group of the controlling terminal.
    fn set_terminal_foreground(&self, pgid: Pid) -> io::Result<()>;

    /// The shell's own process group.
    fn shell_group(&self) -> Pid;

    /// Whether there is a controlling terminal to hand around.
    fn has_terminal(&self) -> bool;
}

/// [`ProcessControl`] backed by the real system calls.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Unix {
    tty_fd: Option<libc::c_int>,
    shell_pgid: Pid,
}

impl Unix {
    /// Capture the shell's process group and, if stdin is a terminal, the
    /// terminal to hand around. Without a terminal the handoff is a no-op.
    pub(crate) fn new() -> Self {
        let tty_fd = if unsafe { libc::isatty(libc::STDIN_FILENO) } == 1 {
            Some(libc::STDIN_FILENO)
        } else {
            None
        };
        let shell_pgid = unsafe { libc::getpgrp() };
        Self { tty_fd, shell_pgid }
    }
}

#[cfg(test)]
impl Unix {
    /// Never touches the terminal, whatever stdin is.
    pub(crate) fn detached() -> Self {
        Self {
            tty_fd: None,
            shell_pgid: unsafe { libc::getpgrp() },
        }
    }
}

impl Default for Unix {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessControl for Unix {
    fn wait_group(&self, pgid: Pid) -> io::Result<WaitResult> {
        loop {
            if let Some(result) = wait_raw(-pgid, libc::WUNTRACED)? {
                return Ok(result);
            }
        }
    }

    fn poll_group(&self, pgid: Pid) -> io::Result<Option<WaitResult>> {
        wait_raw(-pgid, libc::WUNTRACED | libc::WNOHANG | libc::WCONTINUED)
    }

    fn continue_group(&self, pgid: Pid) -> io::Result<()> {
        check_group(pgid)?;
        retry_eintr(|| unsafe { libc::killpg(pgid, libc::SIGCONT) })
    }

    fn set_terminal_foreground(&self, pgid: Pid) -> io::Result<()> {
        let Some(fd) = self.tty_fd else {
            return Ok(());
        };
        check_group(pgid)?;
        retry_eintr(|| unsafe { libc::tcsetpgrp(fd, pgid) })
    }

    fn shell_group(&self) -> Pid {
        self.shell_pgid
    }

    fn has_terminal(&self) -> bool {
        self.tty_fd.is_some()
    }
}

/// Hands the terminal to a job's process group and gives it back to the
/// shell when dropped, on every exit path.
pub(crate) struct TerminalHandoff<'a, P: ProcessControl + ?Sized> {
    control: &'a P,
    pgid: Pid,
}

impl<'a, P: ProcessControl + ?Sized> TerminalHandoff<'a, P> {
    /// Give the terminal to `pgid`. Failure is only logged; the guard still
    /// reclaims the terminal on drop.
    pub(crate) fn give(control: &'a P, pgid: Pid) -> Self {
        if let Err(e) = control.set_terminal_foreground(pgid) {
            warn!(pgid, error = %e, "could not give terminal to job");
        }
        Self { control, pgid }
    }
}

impl<P: ProcessControl + ?Sized> Drop for TerminalHandoff<'_, P> {
    fn drop(&mut self) {
        let shell = self.control.shell_group();
        if let Err(e) = self.control.set_terminal_foreground(shell) {
            warn!(pgid = self.pgid, error = %e, "could not reclaim terminal");
        }
    }
}

/// Put `pid` into process group `pgid` from the parent side.
pub(crate) fn set_process_group(pid: Pid, pgid: Pid) -> io::Result<()> {
    loop {
        let rc = unsafe { libc::setpgid(pid, pgid) };
        if rc == 0 {
            return Ok(());
        }

        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(code) if code == libc::EINTR => continue,
            // Child already exec'd (and did it itself) or is gone.
            Some(code) if code == libc::EACCES || code == libc::ESRCH => return Ok(()),
            _ => return Err(err),
        }
    }
}

/// Ignore the terminal job-control signals in the shell itself, so it is
/// never stopped by the terminal driver and may call `tcsetpgrp` while in
/// the background.
pub(crate) fn ignore_terminal_signals() -> io::Result<()> {
    for signal in TERMINAL_SIGNALS {
        if unsafe { libc::signal(signal, libc::SIG_IGN) } == libc::SIG_ERR {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Finish preparing a forked child before exec: optionally take the
/// terminal, then restore default signal dispositions. The child is already
/// the leader of its own process group at this point.
///
/// Runs between fork and exec, so only async-signal-safe calls are allowed.
pub(crate) fn prepare_child(take_terminal: bool) -> io::Result<()> {
    unsafe {
        if take_terminal && libc::isatty(libc::STDIN_FILENO) == 1 {
            // SIGTTOU is still ignored here, so this cannot stop the child.
            libc::tcsetpgrp(libc::STDIN_FILENO, libc::getpid());
        }
        for signal in TERMINAL_SIGNALS {
            libc::signal(signal, libc::SIG_DFL);
        }
        libc::signal(libc::SIGINT, libc::SIG_DFL);
    }
    Ok(())
}

fn wait_raw(pid: Pid, options: libc::c_int) -> io::Result<Option<WaitResult>> {
    let mut raw_status: libc::c_int = 0;
    loop {
        let rc = unsafe { libc::waitpid(pid, &mut raw_status, options) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                continue;
            }
            return Err(err);
        }
        if rc == 0 {
            return Ok(None);
        }
        return Ok(Some(status::classify(raw_status)));
    }
}

fn retry_eintr(mut call: impl FnMut() -> libc::c_int) -> io::Result<()> {
    loop {
        if call() == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        return Err(err);
    }
}

fn check_group(pgid: Pid) -> io::Result<()> {
    if pgid <= 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "invalid process group id",
        ));
    }
    Ok(())
}
