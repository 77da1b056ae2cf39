// src/core/config.rs

//! Optional user settings read from `config.toml`.

use crate::{
    constants::{DEFAULT_GRACE_PERIOD_MS, WAIT_POLL_INTERVAL_MS},
    core::{naming::NamingRule, paths},
};
use serde::Deserialize;
use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

/// Failures loading `config.toml`. A missing file is not one of them.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("Could not read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The file is not valid TOML or has unknown keys.
    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// User settings for the store and the launcher.
///
/// ```toml
/// naming = "strict"
/// grace_period_ms = 500
/// shell = "/bin/zsh"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvdirConfig {
    /// Which directory entries count as variable files.
    pub naming: NamingRule,
    /// Time the child gets between the graceful and the forceful signal.
    pub grace_period_ms: u64,
    /// Shell used by `envshell` when `SHELL` is unset.
    pub shell: Option<PathBuf>,
}

impl Default for EnvdirConfig {
    fn default() -> Self {
        Self {
            naming: NamingRule::default(),
            grace_period_ms: DEFAULT_GRACE_PERIOD_MS,
            shell: None,
        }
    }
}

impl EnvdirConfig {
    /// Time between the graceful and the forceful termination signal.
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    /// How often the launcher checks on its child.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(WAIT_POLL_INTERVAL_MS)
    }

    /// Loads the user's configuration, falling back to defaults when there is no file.
    pub fn load() -> Result<Self, ConfigError> {
        match paths::config_file_path() {
            Some(path) => Self::load_from(&path),
            None => {
                log::debug!("No config directory on this platform, using defaults.");
                Ok(Self::default())
            }
        }
    }

    /// Loads the configuration at `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("Config file '{}' not found, using defaults.", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        };

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        log::debug!("Loaded config from '{}': {:?}", path.display(), config);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = EnvdirConfig::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, EnvdirConfig::default());
        assert_eq!(config.naming, NamingRule::Permissive);
        assert_eq!(config.grace_period(), Duration::from_millis(2000));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "naming = \"strict\"\n").unwrap();

        let config = EnvdirConfig::load_from(&path).unwrap();

        assert_eq!(config.naming, NamingRule::Strict);
        assert_eq!(config.grace_period_ms, DEFAULT_GRACE_PERIOD_MS);
        assert!(config.shell.is_none());
    }

    #[test]
    fn test_full_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "naming = \"permissive\"\ngrace_period_ms = 250\nshell = \"/bin/zsh\"\n",
        )
        .unwrap();

        let config = EnvdirConfig::load_from(&path).unwrap();

        assert_eq!(config.grace_period(), Duration::from_millis(250));
        assert_eq!(config.shell, Some(PathBuf::from("/bin/zsh")));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "naming = \"sometimes\"\n").unwrap();

        let err = EnvdirConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "grace = 3\n").unwrap();

        assert!(EnvdirConfig::load_from(&path).is_err());
    }
}
