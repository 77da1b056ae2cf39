// src/system/launcher.rs

//! Run and shell modes: spawn under the applied envdir, supervise, report the status.

use crate::{
    CancellationToken,
    constants::{ARGS_SEPARATOR, GENERIC_FAILURE_STATUS, NOT_FOUND_STATUS, USAGE_ERROR_STATUS},
    core::{
        backend::{EnvironmentBackend, ProcessEnv},
        config::EnvdirConfig,
        overlay::{EnvironmentOverlay, StoreError},
        paths::{self, PathError},
    },
    system::{
        process_group::{self, Isolation, ProcessGroupHandle, Termination},
        shell,
        signals::{RUN_STOP_SIGNALS, SHELL_ABSORBED_SIGNALS, SHELL_STOP_SIGNALS, SignalListener},
    },
};
use std::io::{self, ErrorKind, Write};
use std::process::{Child, Command, ExitStatus};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Reasons the launcher could not run its child to completion.
#[derive(Error, Debug)]
pub enum LaunchError {
    /// No directory, or no command after it.
    #[error("incorrect number of arguments")]
    Usage,
    /// The envdir could not be resolved or applied.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The program to run does not exist. `status` is the spawn errno.
    #[error("Unable to find command {command}")]
    CommandNotFound { command: String, status: i32 },
    /// The interactive shell does not exist. `status` is the spawn errno.
    #[error("Unable to find shell {shell}")]
    ShellNotFound { shell: String, status: i32 },
    /// Spawning failed for a reason other than a missing program.
    #[error("An error occurred while starting '{command}': {source}")]
    LaunchFailure {
        command: String,
        #[source]
        source: io::Error,
    },
    /// Signal handlers could not be installed.
    #[error("Could not listen for termination signals: {0}")]
    Signals(#[source] io::Error),
    /// Waiting on the child failed.
    #[error("Lost track of child process {pid}: {source}")]
    Wait {
        pid: u32,
        #[source]
        source: io::Error,
    },
}

impl LaunchError {
    /// Exit status the launcher reports for this error.
    pub fn status(&self) -> i32 {
        match self {
            Self::Usage => USAGE_ERROR_STATUS,
            Self::Store(e) => e.status(),
            Self::CommandNotFound { status, .. } | Self::ShellNotFound { status, .. } => *status,
            Self::LaunchFailure { source, .. }
            | Self::Signals(source)
            | Self::Wait { source, .. } => source.raw_os_error().unwrap_or(GENERIC_FAILURE_STATUS),
        }
    }
}

impl From<PathError> for LaunchError {
    fn from(e: PathError) -> Self {
        Self::Store(StoreError::Path(e))
    }
}

/// How a child is started and supervised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Run,
    Shell,
}

impl Mode {
    fn isolation(self) -> Isolation {
        match self {
            Self::Run => Isolation::OwnGroup,
            Self::Shell => Isolation::Shared,
        }
    }

    fn stop_signals(self) -> &'static [i32] {
        match self {
            Self::Run => RUN_STOP_SIGNALS,
            Self::Shell => SHELL_STOP_SIGNALS,
        }
    }

    /// Signals the launcher survives without acting on them.
    fn absorbed_signals(self) -> &'static [i32] {
        match self {
            Self::Run => &[],
            Self::Shell => SHELL_ABSORBED_SIGNALS,
        }
    }

    fn not_found(self, program: &str, status: i32) -> LaunchError {
        match self {
            Self::Run => LaunchError::CommandNotFound {
                command: program.to_string(),
                status,
            },
            Self::Shell => LaunchError::ShellNotFound {
                shell: program.to_string(),
                status,
            },
        }
    }
}

/// Applies an envdir and runs a child process under it.
///
/// The launcher blocks until the child exits. If a stop is requested while
/// waiting (SIGINT/SIGTERM, or the cancellation token set by the host), the
/// child's process group gets SIGTERM, then SIGKILL if it is still alive after
/// the grace period. The child's exit code becomes the launcher's status; a
/// child killed by signal `N` yields `-N`.
#[derive(Debug)]
pub struct Launcher<B: EnvironmentBackend = ProcessEnv> {
    config: EnvdirConfig,
    backend: B,
    cancellation_token: CancellationToken,
    listen_for_signals: bool,
}

impl Launcher<ProcessEnv> {
    /// A launcher that applies the envdir to the real process environment.
    pub fn new(config: EnvdirConfig) -> Self {
        Self::with_backend(config, ProcessEnv)
    }
}

impl<B: EnvironmentBackend> Launcher<B> {
    /// A launcher applying the envdir to `backend`; the child receives that environment.
    pub fn with_backend(config: EnvdirConfig, backend: B) -> Self {
        Self {
            config,
            backend,
            cancellation_token: Arc::new(AtomicBool::new(false)),
            listen_for_signals: true,
        }
    }

    /// Uses `token` as the stop request flag.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Does not install signal handlers; only the cancellation token stops the child.
    pub fn without_signal_handlers(mut self) -> Self {
        self.listen_for_signals = false;
        self
    }

    /// Run mode: applies `dir` and runs `command_line`, returning the mapped status.
    ///
    /// A leading `--` in `command_line` is dropped.
    pub fn run<S: AsRef<str>>(self, dir: &str, command_line: &[S]) -> Result<i32, LaunchError> {
        let args: Vec<&str> = command_line.iter().map(AsRef::as_ref).collect();
        let args = strip_separator(&args);
        let Some((program, program_args)) = args.split_first() else {
            return Err(LaunchError::Usage);
        };

        let root = paths::resolve_path(dir)?;
        let overlay = EnvironmentOverlay::open_with(root, self.backend, self.config.naming)?;

        let supervisor = Supervisor {
            config: &self.config,
            token: &self.cancellation_token,
            listen_for_signals: self.listen_for_signals,
        };
        supervisor.launch(overlay.backend(), program, program_args, Mode::Run)
    }

    /// Shell mode: announces `dir`, applies it and runs the user's interactive shell.
    ///
    /// The shell comes from `SHELL` (read after the envdir is applied), then the
    /// `shell` config setting, then the platform default.
    pub fn shell(self, dir: &str) -> Result<i32, LaunchError> {
        let root = paths::resolve_path(dir)?;
        println!(t!("shell.info.launching"), path = root);
        io::stdout().flush().ok();

        let overlay = EnvironmentOverlay::open_with(root, self.backend, self.config.naming)?;
        let shell_program = shell::resolve_shell(overlay.backend(), &self.config);

        let supervisor = Supervisor {
            config: &self.config,
            token: &self.cancellation_token,
            listen_for_signals: self.listen_for_signals,
        };
        supervisor.launch(overlay.backend(), &shell_program, &[], Mode::Shell)
    }
}

struct Supervisor<'a> {
    config: &'a EnvdirConfig,
    token: &'a CancellationToken,
    listen_for_signals: bool,
}

impl Supervisor<'_> {
    fn launch<B: EnvironmentBackend>(
        &self,
        backend: &B,
        program: &str,
        args: &[&str],
        mode: Mode,
    ) -> Result<i32, LaunchError> {
        // Registered before spawning so that no stop request can be missed.
        let _listener = if self.listen_for_signals {
            let listener =
                SignalListener::register(self.token, mode.stop_signals(), mode.absorbed_signals())
                    .map_err(LaunchError::Signals)?;
            Some(listener)
        } else {
            None
        };

        let mut child = spawn(backend, program, args, mode)?;
        let pid = child.id();
        log::debug!("Spawned '{}' (PID: {})", program, pid);

        let handle = process_group::handle_for(&child);
        let status = self
            .wait(&mut child, &handle)
            .map_err(|e| LaunchError::Wait { pid, source: e })?;

        let code = exit_status_code(status);
        log::debug!("Child {} finished: {} -> status {}", pid, status, code);
        Ok(code)
    }

    /// Polls the child until it exits or a stop is requested.
    fn wait(&self, child: &mut Child, handle: &impl ProcessGroupHandle) -> io::Result<ExitStatus> {
        let poll = self.config.poll_interval();
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if self.token.load(Ordering::SeqCst) {
                log::debug!(
                    "Stop requested, terminating child process (PID: {})...",
                    child.id()
                );
                return terminate(child, handle, self.config.grace_period(), poll);
            }
            thread::sleep(poll);
        }
    }
}

/// Graceful signal, grace period, then forceful signal. No further retries.
fn terminate(
    child: &mut Child,
    handle: &impl ProcessGroupHandle,
    grace: Duration,
    poll: Duration,
) -> io::Result<ExitStatus> {
    if let Err(e) = handle.send(child, Termination::Graceful) {
        log::warn!("Failed to send graceful termination to {}: {}", child.id(), e);
    }

    let deadline = Instant::now() + grace;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep(poll.min(deadline - now));
    }

    log::debug!(
        "Child {} still running after {:?}, killing it.",
        child.id(),
        grace
    );
    if let Err(e) = handle.send(child, Termination::Forceful) {
        log::warn!("Failed to kill child process {}: {}", child.id(), e);
    }
    child.wait()
}

fn spawn<B: EnvironmentBackend>(
    backend: &B,
    program: &str,
    args: &[&str],
    mode: Mode,
) -> Result<Child, LaunchError> {
    let build = |program: &str, args: &[&str]| {
        let mut command = Command::new(program);
        command.args(args);
        backend.configure(&mut command);
        process_group::isolate(&mut command, mode.isolation());
        command
    };

    let spawned = match build(program, args).spawn() {
        Ok(child) => Ok(child),
        // Built-in commands like `echo` only exist inside `cmd.exe`.
        Err(e) if e.kind() == ErrorKind::NotFound && cfg!(target_os = "windows") => {
            log::debug!("Command '{}' not found. Retrying with cmd /C.", program);
            let mut cmd_args = vec!["/C", program];
            cmd_args.extend_from_slice(args);
            build("cmd", &cmd_args).spawn().map_err(|_| e)
        }
        Err(e) => Err(e),
    };

    spawned.map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            mode.not_found(program, e.raw_os_error().unwrap_or(NOT_FOUND_STATUS))
        } else {
            LaunchError::LaunchFailure {
                command: program.to_string(),
                source: e,
            }
        }
    })
}

/// Drops one leading `--` separator.
fn strip_separator<'a, 'b>(args: &'a [&'b str]) -> &'a [&'b str] {
    match args.split_first() {
        Some((&first, rest)) if first == ARGS_SEPARATOR => rest,
        _ => args,
    }
}

/// Maps a child's termination to the launcher's status: the exit code, or `-N` for signal `N`.
pub fn exit_status_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    GENERIC_FAILURE_STATUS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backend::MemoryEnv;
    use tempfile::TempDir;

    fn quiet_launcher() -> Launcher<MemoryEnv> {
        Launcher::with_backend(EnvdirConfig::default(), MemoryEnv::from_process())
            .without_signal_handlers()
    }

    #[test]
    fn test_shell_mode_absorbs_keyboard_signals() {
        assert_eq!(Mode::Shell.isolation(), Isolation::Shared);
        assert!(Mode::Shell.absorbed_signals().contains(&signal_hook::consts::SIGINT));
        assert!(!Mode::Shell.stop_signals().contains(&signal_hook::consts::SIGINT));
        assert!(Mode::Run.absorbed_signals().is_empty());
        assert!(Mode::Run.stop_signals().contains(&signal_hook::consts::SIGINT));
    }

    #[test]
    fn test_strip_separator() {
        assert_eq!(strip_separator(&["--", "ls"]), &["ls"]);
        assert_eq!(strip_separator(&["ls", "--"]), &["ls", "--"]);
        assert_eq!(strip_separator(&["--", "--", "x"]), &["--", "x"]);
        assert!(strip_separator(&["--"]).is_empty());
        assert!(strip_separator(&[]).is_empty());
    }

    #[test]
    fn test_empty_command_line_is_a_usage_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_str().unwrap();

        let empty: [&str; 0] = [];
        let err = quiet_launcher().run(path, &empty).unwrap_err();
        assert!(matches!(err, LaunchError::Usage));
        assert_eq!(err.status(), 2);
        assert!(err.to_string().contains("incorrect number of arguments"));

        let err = quiet_launcher().run(path, &["--"]).unwrap_err();
        assert!(matches!(err, LaunchError::Usage));
    }

    #[test]
    fn test_error_statuses() {
        let not_found = LaunchError::CommandNotFound {
            command: "nope".into(),
            status: 2,
        };
        assert_eq!(not_found.status(), 2);

        let failure = LaunchError::LaunchFailure {
            command: "x".into(),
            source: io::Error::from_raw_os_error(13),
        };
        assert_eq!(failure.status(), 13);

        let path: LaunchError = PathError::PathNotFound {
            path: "/missing".into(),
        }
        .into();
        assert_eq!(path.status(), 111);
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_status_code_mapping() {
        let exited = Command::new("sh").args(["-c", "exit 19"]).status().unwrap();
        assert_eq!(exit_status_code(exited), 19);

        let killed = Command::new("sh")
            .args(["-c", "kill -TERM $$"])
            .status()
            .unwrap();
        assert_eq!(exit_status_code(killed), -15);
    }
}
