// src/core/paths.rs

//! Envdir and config file locations.

use crate::constants::{
    CONFIG_DIR_NAME, CONFIG_FILENAME, CONFIG_PATH_VAR, DEFAULT_ENVDIR_NAME, SETUP_ERROR_STATUS,
};
use std::env;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failures while turning a user-supplied path into an envdir root.
///
/// Every variant is an environment setup failure and maps to status 111.
#[derive(Error, Debug)]
pub enum PathError {
    /// Nothing exists at the path.
    #[error("envdir '{path}' does not exist")]
    PathNotFound {
        /// The path as the user wrote it.
        path: String,
    },
    /// The path exists but is not a directory.
    #[error("envdir '{path}' not a directory")]
    NotADirectory {
        /// The path as the user wrote it.
        path: String,
    },
    /// The path could not be canonicalized for another reason (permissions, loops...).
    #[error("envdir '{path}' could not be resolved: {source}")]
    PathInaccessible {
        /// The path as the user wrote it.
        path: String,
        /// The underlying filesystem error.
        #[source]
        source: io::Error,
    },
}

impl PathError {
    /// Exit status associated with this error.
    pub fn status(&self) -> i32 {
        SETUP_ERROR_STATUS
    }
}

/// An envdir root that existed and was a directory when it was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath(PathBuf);

impl ResolvedPath {
    /// The absolute, canonical directory path.
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Consumes the wrapper, returning the path.
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl AsRef<Path> for ResolvedPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl std::fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Resolves a user-supplied envdir path.
///
/// Expands a leading `~`, canonicalizes the result and checks that it is a
/// directory. Error messages quote the path exactly as it was given.
pub fn resolve_path(path: &str) -> Result<ResolvedPath, PathError> {
    let expanded = shellexpand::tilde(path);
    log::debug!("Resolving envdir '{}' (expanded: '{}')", path, expanded);

    let canonical = dunce::canonicalize(expanded.as_ref()).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            PathError::PathNotFound {
                path: path.to_string(),
            }
        } else {
            PathError::PathInaccessible {
                path: path.to_string(),
                source: e,
            }
        }
    })?;

    if !canonical.is_dir() {
        return Err(PathError::NotADirectory {
            path: path.to_string(),
        });
    }

    log::debug!("envdir resolved to '{}'", canonical.display());
    Ok(ResolvedPath(canonical))
}

/// The conventional envdir location for a host application: `<base>/envdir`.
pub fn default_envdir(base: &Path) -> PathBuf {
    base.join(DEFAULT_ENVDIR_NAME)
}

/// Returns the location of the configuration file.
///
/// `ENVDIR_CONFIG` wins when set; otherwise `<config dir>/envdir/config.toml`.
/// `None` when neither is available (no config dir on this platform).
pub fn config_file_path() -> Option<PathBuf> {
    if let Some(explicit) = env::var_os(CONFIG_PATH_VAR) {
        return Some(PathBuf::from(explicit));
    }
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILENAME))
}
