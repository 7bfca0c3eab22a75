use std::io::Write;

use crate::builtins::{self, BuiltinAction};
use crate::executor;
use crate::job_control::ProcessControl;
use crate::jobs::SharedJobs;
use crate::parser::{self, ParsedCommand};

/// What the read loop should do after a command.
#[derive(Debug, PartialEq)]
pub(crate) enum Flow {
    Continue,
    Exit(i32),
}

/// The command dispatcher: routes each parsed command to a builtin or to
/// the external launch path, all sharing one job registry.
pub(crate) struct Shell<P> {
    jobs: SharedJobs,
    control: P,
}

impl<P: ProcessControl> Shell<P> {
    pub(crate) fn new(jobs: SharedJobs, control: P) -> Self {
        Self { jobs, control }
    }

    /// Parse and run one input line.
    pub(crate) fn run_line(&self, line: &str, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Flow {
        match parser::parse(line) {
            Ok(Some(cmd)) => self.dispatch(&cmd, stdout, stderr),
            Ok(None) => Flow::Continue,
            Err(e) => {
                let _ = writeln!(stderr, "jcsh: {e}");
                Flow::Continue
            }
        }
    }

    pub(crate) fn dispatch(
        &self,
        cmd: &ParsedCommand,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Flow {
        let program = cmd.program();
        if !builtins::is_builtin(program) {
            executor::launch(cmd, &self.jobs, &self.control, stdout, stderr);
            return Flow::Continue;
        }

        match builtins::execute(
            program,
            &cmd.args[1..],
            &self.jobs,
            &self.control,
            stdout,
            stderr,
        ) {
            BuiltinAction::Continue => Flow::Continue,
            BuiltinAction::Exit(code) => Flow::Exit(code),
        }
    }
}
