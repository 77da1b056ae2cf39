//! # envdir
//!
//! Runs a program, or an interactive shell, with environment variables taken
//! from a directory: each file is one variable, named after the file, whose
//! value is the file's trimmed content.
//!
//! - **`core`**: the environment store. Resolves directories, discovers
//!   variable files and applies them to an environment backend as a
//!   reversible [`core::overlay::EnvironmentOverlay`].
//! - **`system`**: the process launcher. Spawns the child, waits for it,
//!   escalates termination when interrupted and maps its exit to a status.
//! - **`cli`**: the thin argument layer shared by the `envdir` and `envshell`
//!   binaries.

include!(concat!(env!("OUT_DIR"), "/translations.rs"));

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Flag raised when the launcher is asked to stop waiting on its child.
pub type CancellationToken = Arc<AtomicBool>;

pub mod cli;
pub mod constants;
pub mod core;
pub mod system;
