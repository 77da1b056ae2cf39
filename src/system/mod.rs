//! # Process Launcher
//!
//! Starts the child under the applied environment and turns its termination
//! into the launcher's own exit status.
//!
//! ## Modules
//!
//! - **`launcher`**: run and shell modes, the wait loop and the two-stage
//!   termination escalation (graceful, then forceful).
//! - **`process_group`**: process-group isolation at spawn time and the
//!   platform handle that delivers termination signals to the child's group.
//! - **`signals`**: turns SIGINT/SIGTERM received by the launcher into a
//!   cancellation request.
//! - **`shell`**: picks the interactive shell for `envshell`.

pub mod launcher;
pub mod process_group;
pub mod shell;
pub mod signals;

pub use launcher::{LaunchError, Launcher, exit_status_code};
