// src/bin/envshell.rs

use anyhow::{Context, Result};
use clap::Parser;
use envdir::{
    cli::{self, EnvshellCli},
    core::EnvdirConfig,
    system::{LaunchError, Launcher},
};

/// Opens an interactive shell with the variables of an envdir applied.
fn main() {
    env_logger::init();

    let status = match run_cli(EnvshellCli::parse()) {
        Ok(status) => status,
        Err(e) => cli::report_error(&e, envdir::t!("cli.usage.envshell")),
    };
    std::process::exit(status);
}

fn run_cli(cli: EnvshellCli) -> Result<i32> {
    log::debug!("CLI args parsed: {:?}", cli);

    let dir = cli.dir.ok_or(LaunchError::Usage)?;
    let config = EnvdirConfig::load().context(envdir::t!("cli.error.config"))?;
    let status = Launcher::new(config).shell(&dir)?;
    Ok(status)
}
