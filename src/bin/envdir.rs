// src/bin/envdir.rs

use anyhow::{Context, Result};
use clap::Parser;
use envdir::{
    cli::{self, EnvdirCli},
    core::EnvdirConfig,
    system::{LaunchError, Launcher},
};

/// Runs a program with the variables of an envdir applied, then exits with the
/// program's status (`111` for envdir setup errors, `2` for usage errors).
fn main() {
    env_logger::init();

    let status = match run_cli(EnvdirCli::parse()) {
        Ok(status) => status,
        Err(e) => cli::report_error(&e, envdir::t!("cli.usage.envdir")),
    };
    std::process::exit(status);
}

fn run_cli(cli: EnvdirCli) -> Result<i32> {
    log::debug!("CLI args parsed: {:?}", cli);

    let dir = cli.dir.ok_or(LaunchError::Usage)?;
    if cli.child.is_empty() {
        return Err(LaunchError::Usage.into());
    }

    let config = EnvdirConfig::load().context(envdir::t!("cli.error.config"))?;
    let status = Launcher::new(config).run(&dir, &cli.child)?;
    Ok(status)
}
