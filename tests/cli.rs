//! Runs the compiled `envdir` and `envshell` binaries.
#![cfg(unix)]

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn envdir() -> Command {
    binary(env!("CARGO_BIN_EXE_envdir"))
}

fn envshell() -> Command {
    binary(env!("CARGO_BIN_EXE_envshell"))
}

/// Points the binary at a config file that does not exist, so user settings never leak in.
fn binary(path: &str) -> Command {
    let mut command = Command::new(path);
    command.env(
        "ENVDIR_CONFIG",
        std::env::temp_dir().join("envdir-tests-no-such-config.toml"),
    );
    command
}

/// Waits until `path` exists with content, which means the child got that far.
fn wait_for_file(path: &Path) -> String {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if let Ok(content) = fs::read_to_string(path) {
            if !content.trim().is_empty() {
                return content.trim().to_string();
            }
        }
        assert!(Instant::now() < deadline, "{} never appeared", path.display());
        thread::sleep(Duration::from_millis(20));
    }
}

fn send(child: &Child, signal: Signal) {
    kill(Pid::from_raw(child.id() as i32), signal).unwrap();
}

/// Starts `envdir <dir> sh` with a child that records its pid and then sleeps.
fn spawn_sleeping_child(envdir_dir: &Path, pid_file: &Path) -> Child {
    envdir()
        .arg(envdir_dir)
        .args([
            "sh",
            "-c",
            "echo $$ > \"$1.tmp\" && mv \"$1.tmp\" \"$1\" && exec sleep 30",
            "sh",
        ])
        .arg(pid_file)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .spawn()
        .unwrap()
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_usage_without_arguments() {
    let output = envdir().output().unwrap();

    assert_eq!(output.status.code(), Some(2));
    let stderr = stderr_of(&output);
    assert!(stderr.contains("usage: envdir"));
    assert!(stderr.contains("incorrect number of arguments"));
}

#[test]
fn test_usage_without_child() {
    let dir = TempDir::new().unwrap();

    let output = envdir().arg(dir.path()).output().unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr_of(&output).contains("incorrect number of arguments"));
}

#[test]
fn test_missing_directory_exits_111() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing");

    let output = envdir().arg(&missing).arg("ls").output().unwrap();

    assert_eq!(output.status.code(), Some(111));
    let stderr = stderr_of(&output);
    assert!(stderr.contains(missing.to_str().unwrap()));
    assert!(stderr.contains("does not exist"));
}

#[test]
fn test_printenv_sees_greeting() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("GREETING"), "hello").unwrap();

    let output = envdir()
        .arg(dir.path())
        .args(["printenv", "GREETING"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout_of(&output), "hello\n");
}

#[test]
fn test_child_flags_and_separator_pass_through() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("MULTI_LINE"), "multi\nline\n").unwrap();

    let output = envdir()
        .arg(dir.path())
        .args(["--", "sh", "-c", "printf '%s' \"$MULTI_LINE\""])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout_of(&output), "multi\nline");
}

#[test]
fn test_exit_code_of_child() {
    let dir = TempDir::new().unwrap();

    let output = envdir()
        .arg(dir.path())
        .args(["sh", "-c", "exit 19"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(19));
}

#[test]
fn test_unknown_command() {
    let dir = TempDir::new().unwrap();

    let output = envdir()
        .arg(dir.path())
        .arg("doesnt-exist-envdir-test")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr_of(&output).contains("Unable to find command doesnt-exist-envdir-test"));
}

#[test]
fn test_version() {
    let output = envdir().arg("--version").output().unwrap();

    assert_eq!(output.status.code(), Some(0));
    assert!(stdout_of(&output).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_malformed_config_is_reported() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.toml");
    fs::write(&config, "naming = 3\n").unwrap();

    let output = envdir()
        .env("ENVDIR_CONFIG", &config)
        .arg(dir.path())
        .arg("true")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr_of(&output).contains("config"));
}

#[test]
fn test_envshell_announces_directory_and_runs_shell() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("TEST_SHELL"), "test").unwrap();

    let output = envshell()
        .env("SHELL", "true")
        .arg(dir.path())
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    assert!(stdout_of(&output).contains("Launching envshell for "));
}

#[test]
fn test_envshell_missing_shell() {
    let dir = TempDir::new().unwrap();

    let output = envshell()
        .env("SHELL", "/does/not/exist")
        .arg(dir.path())
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr_of(&output).contains("Unable to find shell /does/not/exist"));
}

#[test]
fn test_envshell_usage() {
    let output = envshell().output().unwrap();

    assert_eq!(output.status.code(), Some(2));
    let stderr = stderr_of(&output);
    assert!(stderr.contains("usage: envshell"));
    assert!(stderr.contains("incorrect number of arguments"));
}

fn assert_signal_stops_run(signal: Signal) {
    let dir = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let pid_file = scratch.path().join("child.pid");

    let mut launcher = spawn_sleeping_child(dir.path(), &pid_file);
    let child_pid: i32 = wait_for_file(&pid_file).parse().unwrap();

    let started = Instant::now();
    send(&launcher, signal);
    let status = launcher.wait().unwrap();

    // -SIGTERM as an exit status.
    assert_eq!(status.code(), Some(241));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(kill(Pid::from_raw(child_pid), None), Err(Errno::ESRCH));
}

#[test]
fn test_sigterm_terminates_the_child_and_reports_it() {
    assert_signal_stops_run(Signal::SIGTERM);
}

#[test]
fn test_sigint_terminates_the_child_and_reports_it() {
    assert_signal_stops_run(Signal::SIGINT);
}

#[test]
fn test_envshell_outlives_ctrl_c() {
    let dir = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let ready = scratch.path().join("ready");
    fs::write(dir.path().join("READY_FILE"), ready.to_str().unwrap()).unwrap();

    let mut launcher = envshell()
        .env("SHELL", "/bin/sh")
        .arg(dir.path())
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .spawn()
        .unwrap();
    {
        let mut stdin = launcher.stdin.take().unwrap();
        stdin
            .write_all(b"trap '' INT\necho up > \"$READY_FILE\"\nsleep 2\nexit 5\n")
            .unwrap();
    }

    wait_for_file(&ready);
    send(&launcher, Signal::SIGINT);
    let status = launcher.wait().unwrap();

    assert_eq!(status.code(), Some(5));
}

#[test]
fn test_envshell_stops_shell_on_sigterm() {
    let dir = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let ready = scratch.path().join("ready");
    fs::write(dir.path().join("READY_FILE"), ready.to_str().unwrap()).unwrap();

    let mut launcher = envshell()
        .env("SHELL", "/bin/sh")
        .arg(dir.path())
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .spawn()
        .unwrap();
    {
        let mut stdin = launcher.stdin.take().unwrap();
        stdin
            .write_all(b"echo $$ > \"$READY_FILE\"\nexec sleep 30\n")
            .unwrap();
    }

    let shell_pid: i32 = wait_for_file(&ready).parse().unwrap();
    send(&launcher, Signal::SIGTERM);
    let status = launcher.wait().unwrap();

    assert_eq!(status.code(), Some(241));
    assert_eq!(kill(Pid::from_raw(shell_pid), None), Err(Errno::ESRCH));
}
