// src/system/signals.rs

//! Signal handling while the launcher waits on its child.

use crate::CancellationToken;
use signal_hook::SigId;
use std::io;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Stop requests honoured while running a command.
pub const RUN_STOP_SIGNALS: &[i32] = &[signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM];

/// Stop requests honoured while running an interactive shell. Ctrl+C belongs to the shell.
pub const SHELL_STOP_SIGNALS: &[i32] = &[signal_hook::consts::SIGTERM];

/// Keyboard signals the launcher must outlive while the shell shares its terminal group.
#[cfg(unix)]
pub const SHELL_ABSORBED_SIGNALS: &[i32] = &[signal_hook::consts::SIGINT, signal_hook::consts::SIGQUIT];

/// Keyboard signals the launcher must outlive while the shell shares its terminal group.
#[cfg(not(unix))]
pub const SHELL_ABSORBED_SIGNALS: &[i32] = &[signal_hook::consts::SIGINT];

/// Raises a [`CancellationToken`] when one of the stop signals arrives.
///
/// Absorbed signals get a handler that records nothing anyone reads, which
/// replaces their default action of killing the launcher. Handlers are
/// registered for the lifetime of the value and removed on drop.
#[derive(Debug)]
pub struct SignalListener {
    ids: Vec<SigId>,
}

impl SignalListener {
    /// Installs handlers: `stop` signals set `token`, `absorbed` signals are swallowed.
    pub fn register(token: &CancellationToken, stop: &[i32], absorbed: &[i32]) -> io::Result<Self> {
        let mut listener = Self { ids: Vec::new() };
        for &signal in stop {
            let id = signal_hook::flag::register(signal, Arc::clone(token))?;
            log::trace!("Listening for signal {}", signal);
            listener.ids.push(id);
        }

        let swallowed = Arc::new(AtomicBool::new(false));
        for &signal in absorbed {
            let id = signal_hook::flag::register(signal, Arc::clone(&swallowed))?;
            log::trace!("Absorbing signal {}", signal);
            listener.ids.push(id);
        }
        Ok(listener)
    }
}

impl Drop for SignalListener {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            signal_hook::low_level::unregister(id);
        }
    }
}
