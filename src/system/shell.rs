// src/system/shell.rs

//! Shell selection for `envshell`.

use crate::{
    constants::SHELL_VAR,
    core::{backend::EnvironmentBackend, config::EnvdirConfig},
};

/// Picks the interactive shell: `SHELL`, then the configured fallback, then the platform default.
pub fn resolve_shell<B: EnvironmentBackend>(backend: &B, config: &EnvdirConfig) -> String {
    if let Some(shell) = backend.get(SHELL_VAR).filter(|s| !s.trim().is_empty()) {
        return shell;
    }
    if let Some(shell) = &config.shell {
        log::debug!("{} is not set, using configured shell '{}'", SHELL_VAR, shell.display());
        return shell.to_string_lossy().into_owned();
    }
    let fallback = get_default_shell();
    log::debug!("{} is not set, falling back to '{}'", SHELL_VAR, fallback);
    fallback.to_string()
}

/// Shell used when neither `SHELL` nor the config names one.
pub fn get_default_shell() -> &'static str {
    if cfg!(target_os = "windows") {
        "cmd.exe"
    } else {
        "/bin/sh"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backend::MemoryEnv;
    use std::path::PathBuf;

    #[test]
    fn test_shell_variable_wins() {
        let env = MemoryEnv::new().with("SHELL", "/bin/zsh");
        let config = EnvdirConfig {
            shell: Some(PathBuf::from("/bin/fish")),
            ..EnvdirConfig::default()
        };
        assert_eq!(resolve_shell(&env, &config), "/bin/zsh");
    }

    #[test]
    fn test_configured_shell_when_unset() {
        let env = MemoryEnv::new();
        let config = EnvdirConfig {
            shell: Some(PathBuf::from("/bin/fish")),
            ..EnvdirConfig::default()
        };
        assert_eq!(resolve_shell(&env, &config), "/bin/fish");
    }

    #[test]
    fn test_blank_shell_variable_is_ignored() {
        let env = MemoryEnv::new().with("SHELL", "  ");
        assert_eq!(
            resolve_shell(&env, &EnvdirConfig::default()),
            get_default_shell()
        );
    }
}
