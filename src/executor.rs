use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::process::CommandExt;
use std::process::Command;

use tracing::{debug, warn};

use crate::error::{Result, ShellError};
use crate::job_control::{self, Pid, ProcessControl, TerminalHandoff};
use crate::jobs::{Job, JobState, SharedJobs};
use crate::parser::ParsedCommand;
use crate::status::ResultKind;

/// Launch an external command in a new process group.
///
/// Foreground: hand it the terminal, wait until it stops or ends, take the
/// terminal back, and track it only if it stopped. Background: track it
/// right away and return without waiting.
pub(crate) fn launch<P: ProcessControl + ?Sized>(
    cmd: &ParsedCommand,
    jobs: &SharedJobs,
    control: &P,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) {
    let take_terminal = !cmd.background && control.has_terminal();
    let mut command = match build_command(cmd, take_terminal) {
        Ok(command) => command,
        Err(e) => {
            let _ = writeln!(stderr, "{e}");
            return;
        }
    };

    if cmd.background {
        launch_background(cmd.program(), &mut command, jobs, stdout, stderr);
    } else {
        launch_foreground(cmd.program(), &mut command, jobs, control, stdout, stderr);
    }
}

fn launch_foreground<P: ProcessControl + ?Sized>(
    program: &str,
    command: &mut Command,
    jobs: &SharedJobs,
    control: &P,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) {
    let Some(pgid) = spawn(program, command, stderr) else {
        return;
    };
    debug!(pgid, program, "launched foreground job");

    let outcome = {
        let _terminal = TerminalHandoff::give(control, pgid);
        control.wait_group(pgid)
    };

    let result = match outcome {
        Ok(result) => result,
        Err(e) => {
            let _ = writeln!(stderr, "jcsh: wait error: {e}");
            return;
        }
    };

    let _ = writeln!(
        stdout,
        "Foreground pid: {pgid}, command: {program}, {}, info: {}",
        result.kind, result.info
    );

    if result.kind == ResultKind::Suspended {
        let mut registry = jobs.block();
        if let Err(e) = registry.insert(Job::new(pgid, program, JobState::Stopped)) {
            let _ = writeln!(stderr, "jcsh: {e}");
        }
    }
}

fn launch_background(
    program: &str,
    command: &mut Command,
    jobs: &SharedJobs,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) {
    // Spawn inside the scope: the record must exist before any
    // reconciliation pass can observe the child's first state change.
    let mut registry = jobs.block();
    let Some(pgid) = spawn(program, command, stderr) else {
        return;
    };
    debug!(pgid, program, "launched background job");

    let _ = writeln!(stdout, "Background job running... pid: {pgid}, command: {program}");
    if let Err(e) = registry.insert(Job::new(pgid, program, JobState::Background)) {
        let _ = writeln!(stderr, "jcsh: {e}");
    }
}

/// Spawn the child and return its process-group id. The `Child` handle is
/// dropped on purpose: the group is reaped through `waitpid`.
fn spawn(program: &str, command: &mut Command, stderr: &mut dyn Write) -> Option<Pid> {
    match command.spawn() {
        Ok(child) => {
            let pid = child.id() as Pid;
            if let Err(e) = job_control::set_process_group(pid, pid) {
                warn!(pid, error = %e, "setpgid from parent failed");
            }
            Some(pid)
        }
        Err(e) => {
            let _ = writeln!(stderr, "jcsh: Fork error: {program}: {e}");
            None
        }
    }
}

fn build_command(cmd: &ParsedCommand, take_terminal: bool) -> Result<Command> {
    let image = ExecImage::new(&cmd.args)?;
    let mut command = Command::new(cmd.program());
    command.args(&cmd.args[1..]).process_group(0);

    if let Some(path) = &cmd.input {
        let file = File::open(path)
            .map_err(|e| ShellError::io(format!("Input redirection error: {path}"), e))?;
        command.stdin(file);
    }

    if let Some(path) = &cmd.output {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o644)
            .open(path)
            .map_err(|e| ShellError::io(format!("Output redirection error: {path}"), e))?;
        command.stdout(file);
    }

    // The child execs by itself from pre_exec, so a failed exec ends in an
    // ordinary exit status that the parent waits for like any other.
    // SAFETY: prepare_child and ExecImage::exec only make async-signal-safe calls.
    unsafe {
        command.pre_exec(move || {
            job_control::prepare_child(take_terminal)?;
            image.exec()
        });
    }

    Ok(command)
}

/// A program and its arguments as C strings, built before fork so the child
/// does not allocate.
struct ExecImage {
    argv: Vec<CString>,
    argv_ptrs: Vec<*const libc::c_char>,
    not_found: Vec<u8>,
}

// SAFETY: `argv_ptrs` only points into the strings owned by `argv`, which
// are never mutated, and is only dereferenced in the forked child.
unsafe impl Send for ExecImage {}
unsafe impl Sync for ExecImage {}

impl ExecImage {
    fn new(args: &[String]) -> Result<Self> {
        let argv = args
            .iter()
            .map(|arg| CString::new(arg.as_str()))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| ShellError::Syntax("argument contains a NUL byte".into()))?;
        let mut argv_ptrs: Vec<*const libc::c_char> = argv.iter().map(|a| a.as_ptr()).collect();
        argv_ptrs.push(std::ptr::null());
        let not_found = format!("Error, command not found: {}\n", args[0]).into_bytes();
        Ok(Self {
            argv,
            argv_ptrs,
            not_found,
        })
    }

    /// Replace the child's image, searching PATH. If that fails, report it
    /// and exit with failure status.
    fn exec(&self) -> ! {
        unsafe {
            libc::execvp(self.argv[0].as_ptr(), self.argv_ptrs.as_ptr());
            libc::write(
                libc::STDERR_FILENO,
                self.not_found.as_ptr().cast(),
                self.not_found.len(),
            );
            libc::_exit(libc::EXIT_FAILURE)
        }
    }
}
