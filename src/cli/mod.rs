//! Argument parsing and error reporting shared by the `envdir` and `envshell` binaries.

use crate::{constants::GENERIC_FAILURE_STATUS, system::LaunchError};
use clap::Parser;
use colored::Colorize;

fn styles() -> clap::builder::Styles {
    clap::builder::Styles::styled()
        .header(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .usage(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .literal(clap::builder::styling::AnsiColor::Cyan.on_default().bold())
        .placeholder(clap::builder::styling::AnsiColor::Green.on_default())
}

/// `envdir [--help] [--version] <dir> [--] <command> [args...]`
#[derive(Parser, Debug)]
#[command(name = "envdir", version, about = t!("cli.about.envdir"), styles = styles())]
pub struct EnvdirCli {
    /// Directory with one file per environment variable.
    pub dir: Option<String>,

    /// The program to run, followed by its arguments.
    ///
    /// Everything after the directory is passed through untouched, including
    /// arguments that look like flags.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub child: Vec<String>,
}

/// `envshell [--help] [--version] <dir>`
#[derive(Parser, Debug)]
#[command(name = "envshell", version, about = t!("cli.about.envshell"), styles = styles())]
pub struct EnvshellCli {
    /// Directory with one file per environment variable.
    pub dir: Option<String>,
}

/// Prints `error` to stderr and returns the status the process should exit with.
///
/// Usage errors are preceded by `usage`.
pub fn report_error(error: &anyhow::Error, usage: &str) -> i32 {
    let label = t!("cli.error.label").red().bold();
    match error.downcast_ref::<LaunchError>() {
        Some(launch_error) => {
            if matches!(launch_error, LaunchError::Usage) {
                eprintln!("{}", usage);
            }
            eprintln!("{}: {}", label, launch_error);
            launch_error.status()
        }
        None => {
            eprintln!("{}: {:#}", label, error);
            GENERIC_FAILURE_STATUS
        }
    }
}
