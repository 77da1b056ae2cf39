// src/constants.rs

//! Status codes, names and defaults shared across the crate.

/// Exit status for environment setup failures (daemontools convention).
pub const SETUP_ERROR_STATUS: i32 = 111;

/// Exit status for a bad invocation.
pub const USAGE_ERROR_STATUS: i32 = 2;

/// Status used when a launch failure carries no OS error number.
pub const GENERIC_FAILURE_STATUS: i32 = 1;

/// Status used when a "not found" failure carries no OS error number (ENOENT).
pub const NOT_FOUND_STATUS: i32 = 2;

/// Separator that may precede the child command line.
pub const ARGS_SEPARATOR: &str = "--";

/// Name of the default envdir next to a host application's base directory.
pub const DEFAULT_ENVDIR_NAME: &str = "envdir";

/// Environment variable naming the interactive shell.
pub const SHELL_VAR: &str = "SHELL";

/// Environment variable overriding the configuration file location.
pub const CONFIG_PATH_VAR: &str = "ENVDIR_CONFIG";

/// Directory (inside the platform config dir) holding the configuration file.
pub const CONFIG_DIR_NAME: &str = "envdir";

/// Name of the configuration file.
pub const CONFIG_FILENAME: &str = "config.toml";

/// Default time between the graceful and the forceful termination signal.
pub const DEFAULT_GRACE_PERIOD_MS: u64 = 2000;

/// Interval at which the launcher polls the child and the cancellation flag.
pub const WAIT_POLL_INTERVAL_MS: u64 = 50;
