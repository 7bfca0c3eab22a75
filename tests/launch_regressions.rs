use std::io::Write;
use std::process::{Command, Stdio};

fn run_shell(lines: &[&str]) -> std::process::Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_jcsh"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn jcsh");

    {
        let stdin = child.stdin.as_mut().expect("stdin");
        for line in lines {
            writeln!(stdin, "{line}").expect("write line");
        }
        writeln!(stdin, "exit").expect("write exit");
    }

    child.wait_with_output().expect("wait output")
}

#[test]
fn exit_says_bye_and_succeeds() {
    let output = run_shell(&[]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Bye"), "stdout was: {stdout}");
    assert!(output.status.success());
}

#[test]
fn foreground_status_line_reports_exit_code() {
    let output = run_shell(&["sh -c 'exit 3'"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Foreground pid: "), "stdout was: {stdout}");
    assert!(
        stdout.contains("command: sh, Exited, info: 3"),
        "stdout was: {stdout}"
    );
}

#[test]
fn unknown_command_exits_with_failure_and_shell_continues() {
    let output = run_shell(&["jcsh-no-such-command-xyz", "echo ALIVE"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Error, command not found: jcsh-no-such-command-xyz"),
        "stderr was: {stderr}"
    );
    assert!(
        stdout.contains("command: jcsh-no-such-command-xyz, Exited, info: 1"),
        "stdout was: {stdout}"
    );
    assert!(stdout.contains("ALIVE"), "stdout was: {stdout}");
}

#[test]
fn unknown_background_command_is_reaped_like_any_job() {
    let output = run_shell(&["jcsh-no-such-command-xyz &", "sleep 1", "jobs"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Error, command not found: jcsh-no-such-command-xyz"),
        "stderr was: {stderr}"
    );
    assert!(
        stdout.contains("Background job running... pid: "),
        "stdout was: {stdout}"
    );
    assert!(
        stdout.contains("Background pid: ")
            && stdout.contains("command: jcsh-no-such-command-xyz, Exited, info: 1"),
        "stdout was: {stdout}"
    );
    assert!(stdout.contains("There are no jobs in the list"), "stdout was: {stdout}");
}

#[test]
fn redirections_round_trip_through_a_file() {
    let path = std::env::temp_dir().join(format!("jcsh_redirect_{}.txt", std::process::id()));
    let write = format!("echo REDIRECTED > {}", path.display());
    let read = format!("cat < {}", path.display());

    let output = run_shell(&[write.as_str(), read.as_str()]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(stdout.matches("REDIRECTED").count(), 1, "stdout was: {stdout}");
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "REDIRECTED\n");
    let _ = std::fs::remove_file(&path);
}

#[test]
fn cd_changes_directory_for_later_commands() {
    let output = run_shell(&["cd /", "sh -c 'echo CWD=$(pwd)'"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("CWD=/\n"), "stdout was: {stdout}");
}

#[test]
fn cd_without_argument_is_reported() {
    let output = run_shell(&["cd"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("missing argument for cd"), "stderr was: {stderr}");
}

#[test]
fn custom_prompt_from_environment() {
    let mut child = Command::new(env!("CARGO_BIN_EXE_jcsh"))
        .env("JCSH_PROMPT", "jcsh$ ")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn jcsh");
    writeln!(child.stdin.as_mut().expect("stdin"), "exit").expect("write exit");

    let output = child.wait_with_output().expect("wait output");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("jcsh$ "), "stdout was: {stdout}");
}
