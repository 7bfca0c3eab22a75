use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;

use signal_hook::consts::signal::{SIGCHLD, SIGHUP};
use signal_hook::iterator::Signals;
use tracing::{debug, warn};

use crate::job_control::{ProcessControl, Unix};
use crate::jobs::{JobRegistry, JobState, SharedJobs};
use crate::status::ResultKind;

/// One reconciliation pass: poll every tracked group without blocking and
/// bring its record up to date.
///
/// The caller must hold the blocking scope for the whole pass. Groups are
/// visited in registry order, and each group is polled until it has nothing
/// more to report, since several changes can arrive behind one SIGCHLD. A
/// group that reports an error is left as is.
pub(crate) fn reconcile<P: ProcessControl + ?Sized>(
    registry: &mut JobRegistry,
    control: &P,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) {
    for pgid in registry.groups() {
        loop {
            let result = match control.poll_group(pgid) {
                Ok(Some(result)) => result,
                Ok(None) => break,
                Err(e) => {
                    let _ = writeln!(stderr, "jcsh: wait error for job {pgid}: {e}");
                    break;
                }
            };

            let Some(job) = registry.find_by_group(pgid) else {
                break;
            };
            let _ = writeln!(
                stdout,
                "Background pid: {}, command: {}, {}, info: {}",
                job.pgid, job.command, result.kind, result.info
            );

            match result.kind {
                ResultKind::Suspended => job.state = JobState::Stopped,
                ResultKind::Continued => job.state = JobState::Background,
                ResultKind::Exited | ResultKind::Signaled => {
                    registry.remove(pgid);
                    debug!(pgid, kind = %result.kind, remaining = registry.len(), "reaped job");
                    break;
                }
            }
        }
    }
}

/// Start the thread that reacts to SIGCHLD (reconciliation pass) and SIGHUP
/// (append a line to `hup_log`).
pub(crate) fn spawn_listener(
    jobs: SharedJobs,
    control: Unix,
    hup_log: PathBuf,
) -> io::Result<thread::JoinHandle<()>> {
    let mut signals = Signals::new([SIGCHLD, SIGHUP])?;

    thread::Builder::new()
        .name("jcsh-signals".to_string())
        .spawn(move || {
            for signal in signals.forever() {
                match signal {
                    SIGCHLD => {
                        let mut registry = jobs.block();
                        reconcile(
                            &mut registry,
                            &control,
                            &mut io::stdout(),
                            &mut io::stderr(),
                        );
                        let _ = io::stdout().flush();
                    }
                    SIGHUP => {
                        if let Err(e) = log_hangup(&hup_log) {
                            eprintln!("jcsh: {}: {e}", hup_log.display());
                        }
                    }
                    other => warn!(signal = other, "unexpected signal"),
                }
            }
        })
}

/// Append the hang-up notice to `path`, creating the file if needed.
pub(crate) fn log_hangup(path: &Path) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "SIGHUP received.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job_control::fake::{Call, FakeOs};
    use crate::jobs::Job;
    use crate::status::WaitResult;

    fn registry(jobs: &[(i32, &str, JobState)]) -> JobRegistry {
        let mut registry = JobRegistry::new();
        for &(pgid, command, state) in jobs {
            registry.insert(Job::new(pgid, command, state)).unwrap();
        }
        registry
    }

    fn pass(registry: &mut JobRegistry, os: &FakeOs) -> (String, String) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        reconcile(registry, os, &mut out, &mut err);
        (
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn unchanged_groups_are_left_alone() {
        let mut registry = registry(&[(10, "sleep", JobState::Background)]);
        let os = FakeOs::new();

        let (out, err) = pass(&mut registry, &os);

        assert!(out.is_empty() && err.is_empty());
        assert_eq!(registry.get(1).unwrap().state, JobState::Background);
        assert_eq!(os.calls(), vec![Call::Poll(10)]);
    }

    #[test]
    fn continue_and_exit_behind_one_signal_are_both_seen() {
        let mut registry = registry(&[(10, "sh", JobState::Stopped)]);
        let os = FakeOs::new();
        os.queue_poll(10, Ok(Some(WaitResult::new(ResultKind::Continued, 0))));
        os.queue_poll(10, Ok(Some(WaitResult::new(ResultKind::Exited, 6))));

        let (out, _) = pass(&mut registry, &os);

        assert!(registry.is_empty());
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Background pid: 10, command: sh, Continued, info: 0",
                "Background pid: 10, command: sh, Exited, info: 6",
            ]
        );
        assert_eq!(os.calls(), vec![Call::Poll(10), Call::Poll(10)]);
    }

    #[test]
    fn suspended_group_becomes_stopped() {
        let mut registry = registry(&[(10, "sleep", JobState::Background)]);
        let os = FakeOs::new();
        os.queue_poll(10, Ok(Some(WaitResult::new(ResultKind::Suspended, libc::SIGTSTP))));

        let (out, _) = pass(&mut registry, &os);

        assert_eq!(registry.get(1).unwrap().state, JobState::Stopped);
        assert_eq!(
            out,
            format!("Background pid: 10, command: sleep, Suspended, info: {}\n", libc::SIGTSTP)
        );
    }

    #[test]
    fn continued_group_becomes_background() {
        let mut registry = registry(&[(10, "sleep", JobState::Stopped)]);
        let os = FakeOs::new();
        os.queue_poll(10, Ok(Some(WaitResult::new(ResultKind::Continued, 0))));

        let (out, _) = pass(&mut registry, &os);

        assert_eq!(registry.get(1).unwrap().state, JobState::Background);
        assert!(out.contains("Continued, info: 0"), "stdout was: {out}");
    }

    #[test]
    fn exited_group_is_removed() {
        let mut registry = registry(&[
            (10, "sleep", JobState::Background),
            (20, "yes", JobState::Background),
        ]);
        let os = FakeOs::new();
        os.queue_poll(10, Ok(Some(WaitResult::new(ResultKind::Exited, 0))));
        os.queue_poll(20, Ok(Some(WaitResult::new(ResultKind::Signaled, libc::SIGKILL))));

        let (out, _) = pass(&mut registry, &os);

        assert!(registry.is_empty());
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "Background pid: 10, command: sleep, Exited, info: 0");
        assert_eq!(
            lines[1],
            format!("Background pid: 20, command: yes, Signaled, info: {}", libc::SIGKILL)
        );
    }

    #[test]
    fn poll_error_leaves_record_untouched() {
        let mut registry = registry(&[(10, "sleep", JobState::Stopped)]);
        let os = FakeOs::new();
        os.queue_poll(10, Err(io::Error::from_raw_os_error(libc::ECHILD)));

        let (out, err) = pass(&mut registry, &os);

        assert!(out.is_empty());
        assert!(err.contains("wait error for job 10"), "stderr was: {err}");
        assert_eq!(registry.get(1).unwrap().state, JobState::Stopped);
    }

    #[test]
    fn stop_then_exit_removes_exactly_once() {
        let mut registry = registry(&[
            (10, "sleep", JobState::Background),
            (20, "cat", JobState::Stopped),
        ]);
        let os = FakeOs::new();

        os.queue_poll(10, Ok(Some(WaitResult::new(ResultKind::Suspended, libc::SIGSTOP))));
        pass(&mut registry, &os);
        assert_eq!(registry.get(1).unwrap().state, JobState::Stopped);

        os.queue_poll(10, Ok(Some(WaitResult::new(ResultKind::Exited, 1))));
        let (out, _) = pass(&mut registry, &os);
        assert_eq!(out.matches("pid: 10").count(), 1);
        assert_eq!(registry.groups(), vec![20]);

        os.calls.borrow_mut().clear();
        pass(&mut registry, &os);
        assert_eq!(os.calls(), vec![Call::Poll(20)]);
    }

    #[test]
    fn hangup_log_appends_lines() {
        let path = std::env::temp_dir().join(format!("jcsh_hup_{}.txt", std::process::id()));
        let _ = std::fs::remove_file(&path);

        log_hangup(&path).unwrap();
        log_hangup(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "SIGHUP received.\nSIGHUP received.\n");
        let _ = std::fs::remove_file(&path);
    }
}
