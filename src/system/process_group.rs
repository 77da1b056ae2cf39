// src/system/process_group.rs

//! Targets termination signals at a child's whole process group.
//!
//! On POSIX the child is started in a new session (`setsid`), so its group
//! can be signalled without touching the launcher's own group. Windows has no
//! process groups in that sense; there the child gets a new console process
//! group and both termination stages use `Child::kill`.

use std::io;
use std::process::{Child, Command};

/// Which stage of the termination sequence to deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Ask the child to stop (SIGTERM).
    Graceful,
    /// Stop it unconditionally (SIGKILL).
    Forceful,
}

/// Whether a child gets its own process group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Isolation {
    /// New session / process group.
    OwnGroup,
    /// Stays in the launcher's group (and terminal foreground job).
    Shared,
}

/// Something that can deliver a termination stage to a running child.
pub trait ProcessGroupHandle {
    /// Delivers `termination`. A child that is already gone is not an error.
    fn send(&self, child: &mut Child, termination: Termination) -> io::Result<()>;
}

/// Configures `command` according to `isolation`.
pub fn isolate(command: &mut Command, isolation: Isolation) {
    if isolation == Isolation::Shared {
        return;
    }
    #[cfg(unix)]
    posix::new_session(command);
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
        command.creation_flags(CREATE_NEW_PROCESS_GROUP);
    }
}

/// The handle for a freshly spawned child on this platform.
#[cfg(unix)]
pub fn handle_for(child: &Child) -> impl ProcessGroupHandle + std::fmt::Debug + use<> {
    posix::PosixProcessGroup::for_child(child)
}

/// The handle for a freshly spawned child on this platform.
#[cfg(not(unix))]
pub fn handle_for(_child: &Child) -> impl ProcessGroupHandle + std::fmt::Debug + use<> {
    ChildOnly
}

#[cfg(unix)]
mod posix {
    use super::{ProcessGroupHandle, Termination};
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, kill, killpg};
    use nix::unistd::{Pid, getpgid, getpgrp, setsid};
    use std::io;
    use std::os::unix::process::CommandExt;
    use std::process::{Child, Command};

    #[allow(unsafe_code)]
    pub(super) fn new_session(command: &mut Command) {
        // SAFETY: `setsid` is async-signal-safe and the closure touches no
        // shared state, as required between fork and exec.
        unsafe {
            command.pre_exec(|| {
                setsid()?;
                Ok(())
            });
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Target {
        Group(Pid),
        Process(Pid),
    }

    #[derive(Debug)]
    pub(super) struct PosixProcessGroup {
        target: Target,
    }

    impl PosixProcessGroup {
        /// Signals the child's group, unless it is our own group.
        pub(super) fn for_child(child: &Child) -> Self {
            let pid = Pid::from_raw(child.id() as i32);
            let target = match getpgid(Some(pid)) {
                Ok(group) if group == getpgrp() => Target::Process(pid),
                Ok(group) => Target::Group(group),
                Err(e) => {
                    log::warn!("Could not read process group of {}: {}", pid, e);
                    Target::Process(pid)
                }
            };
            log::trace!("Termination target for child {}: {:?}", pid, target);
            Self { target }
        }
    }

    impl ProcessGroupHandle for PosixProcessGroup {
        fn send(&self, _child: &mut Child, termination: Termination) -> io::Result<()> {
            let signal = match termination {
                Termination::Graceful => Signal::SIGTERM,
                Termination::Forceful => Signal::SIGKILL,
            };
            let result = match self.target {
                Target::Group(group) => killpg(group, signal),
                Target::Process(pid) => kill(pid, signal),
            };
            log::debug!("Sent {} to {:?}", signal, self.target);
            match result {
                Ok(()) | Err(Errno::ESRCH) => Ok(()),
                Err(e) => Err(e.into()),
            }
        }
    }
}

/// Fallback handle: kills the child process itself.
#[cfg(not(unix))]
#[derive(Debug)]
struct ChildOnly;

#[cfg(not(unix))]
impl ProcessGroupHandle for ChildOnly {
    fn send(&self, child: &mut Child, termination: Termination) -> io::Result<()> {
        log::debug!("Killing child {} ({:?})", child.id(), termination);
        match child.kill() {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(e),
        }
    }
}
