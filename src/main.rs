#[cfg(not(unix))]
compile_error!("jcsh needs a Unix platform with POSIX job control");

mod builtins;
mod config;
mod error;
mod executor;
mod job_control;
mod jobs;
mod parser;
mod reconcile;
mod redirect;
mod shell;
mod status;

use std::io::{self, Write};

use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::job_control::Unix;
use crate::jobs::SharedJobs;
use crate::shell::{Flow, Shell};

fn main() {
    // Diagnostics go to stderr so they never mix with job status lines.
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let config = Config::from_env();

    if let Err(e) = ctrlc::set_handler(|| {
        println!();
        let _ = io::stdout().flush();
    }) {
        warn!(error = %e, "failed to set Ctrl-C handler");
    }

    if let Err(e) = job_control::ignore_terminal_signals() {
        eprintln!("jcsh: cannot ignore terminal signals: {e}");
    }

    let control = Unix::new();
    let jobs = SharedJobs::new();
    if let Err(e) = reconcile::spawn_listener(jobs.clone(), control, config.hup_log.clone()) {
        eprintln!("jcsh: cannot watch child processes: {e}");
    }

    let shell = Shell::new(jobs, control);
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut stderr = io::stderr();

    loop {
        print!("{}", config.prompt);
        if stdout.flush().is_err() {
            break;
        }

        let mut input = String::new();
        match stdin.read_line(&mut input) {
            Ok(0) => {
                println!("\nBye");
                break;
            }
            Ok(_) => {
                if let Flow::Exit(code) = shell.run_line(&input, &mut stdout, &mut stderr) {
                    let _ = stdout.flush();
                    std::process::exit(code);
                }
            }
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        }
    }
}
