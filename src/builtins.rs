use std::io::Write;

use tracing::debug;

use crate::error::ShellError;
use crate::job_control::{ProcessControl, TerminalHandoff};
use crate::jobs::{JobState, SharedJobs};
use crate::status::ResultKind;

/// The list of all builtin command names.
const BUILTINS: &[&str] = &["cd", "fg", "bg", "jobs", "exit"];

#[derive(Debug, PartialEq)]
pub(crate) enum BuiltinAction {
    Continue,
    Exit(i32),
}

/// Returns true if the command name is a shell builtin.
pub(crate) fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// Execute a builtin command, writing output to the provided streams.
/// `args` excludes the command name.
pub(crate) fn execute<P: ProcessControl + ?Sized>(
    program: &str,
    args: &[String],
    jobs: &SharedJobs,
    control: &P,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> BuiltinAction {
    match program {
        "cd" => builtin_cd(args, stderr),
        "fg" => builtin_fg(args, jobs, control, stdout, stderr),
        "bg" => builtin_bg(args, jobs, control, stdout, stderr),
        "jobs" => builtin_jobs(jobs, stdout),
        "exit" => {
            let _ = writeln!(stdout, "Bye");
            return BuiltinAction::Exit(0);
        }
        _ => {
            let _ = writeln!(stderr, "jcsh: unknown builtin: {program}");
        }
    }
    BuiltinAction::Continue
}

fn builtin_cd(args: &[String], stderr: &mut dyn Write) {
    let Some(target) = args.first() else {
        let _ = writeln!(stderr, "missing argument for cd");
        return;
    };

    if let Err(e) = std::env::set_current_dir(target) {
        let _ = writeln!(stderr, "cd: {target}: {e}");
    }
}

// ── Job control builtins ──

/// List all tracked jobs.
fn builtin_jobs(jobs: &SharedJobs, stdout: &mut dyn Write) {
    let registry = jobs.block();
    if registry.is_empty() {
        let _ = writeln!(stdout, "There are no jobs in the list");
        return;
    }

    for (position, job) in registry.iter() {
        let _ = writeln!(stdout, "[{position}] {} {} {}", job.pgid, job.command, job.state);
    }
}

/// Bring a background or stopped job to the foreground and wait for it.
///
/// The job leaves the registry for the duration of the wait, so the
/// reconciler can never see (or reap) it meanwhile. If it stops again it
/// goes back in front of the jobs that followed it.
fn builtin_fg<P: ProcessControl + ?Sized>(
    args: &[String],
    jobs: &SharedJobs,
    control: &P,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) {
    let Some(position) = parse_position(args.first(), stdout) else {
        return;
    };

    let (mut job, followers) = {
        let mut registry = jobs.block();
        let Some(job) = registry.take(position) else {
            let _ = writeln!(stdout, "{}", ShellError::NoSuchJob(position.to_string()));
            return;
        };
        let followers = registry.groups().split_off(position - 1);
        (job, followers)
    };

    let _ = writeln!(stdout, "Bringing job to foreground: [{position}] {}", job.command);
    let _ = stdout.flush();

    let previous = job.state;
    job.state = JobState::Foreground;
    let outcome = {
        let _terminal = TerminalHandoff::give(control, job.pgid);
        if let Err(e) = control.continue_group(job.pgid) {
            let _ = writeln!(stderr, "jcsh: fg: {e}");
        }
        control.wait_group(job.pgid)
    };

    job.state = match outcome {
        Ok(result) => {
            let _ = writeln!(
                stdout,
                "Foreground pid: {}, command: {}, {}, info: {}",
                job.pgid, job.command, result.kind, result.info
            );
            match result.kind {
                ResultKind::Suspended => JobState::Stopped,
                // Never reported: wait_group does not pass WCONTINUED.
                ResultKind::Continued => JobState::Background,
                ResultKind::Exited | ResultKind::Signaled => {
                    debug!(pgid = job.pgid, kind = %result.kind, "foreground job finished");
                    return;
                }
            }
        }
        Err(e) => {
            let _ = writeln!(stderr, "jcsh: wait error: {e}");
            previous
        }
    };

    if let Err(e) = jobs.block().insert_before_any(&followers, job) {
        let _ = writeln!(stderr, "jcsh: fg: {e}");
    }
}

/// Resume a stopped job in the background.
fn builtin_bg<P: ProcessControl + ?Sized>(
    args: &[String],
    jobs: &SharedJobs,
    control: &P,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) {
    let Some(position) = parse_position(args.first(), stdout) else {
        return;
    };

    let mut registry = jobs.block();
    let Some(job) = registry.get_mut(position) else {
        let _ = writeln!(stdout, "{}", ShellError::NoSuchJob(position.to_string()));
        return;
    };

    if job.state != JobState::Stopped {
        let _ = writeln!(stdout, "Job [{position}] is not stopped. Nothing to do.");
        return;
    }

    if let Err(e) = control.continue_group(job.pgid) {
        let _ = writeln!(stderr, "jcsh: bg: {e}");
        return;
    }

    job.state = JobState::Background;
    let _ = writeln!(
        stdout,
        "Background pid: {}, command: {}, {}, info: 0",
        job.pgid,
        job.command,
        ResultKind::Continued
    );
}

// ── Helpers ──

/// Parse a 1-based job position, defaulting to the first job.
fn parse_position(arg: Option<&String>, stdout: &mut dyn Write) -> Option<usize> {
    let Some(arg) = arg else {
        return Some(1);
    };
    match arg.parse::<usize>() {
        Ok(position) if position > 0 => Some(position),
        _ => {
            let _ = writeln!(stdout, "{}", ShellError::NoSuchJob(arg.clone()));
            None
        }
    }
}
