// src/core/overlay.rs

//! # Environment Overlay
//!
//! An [`EnvironmentOverlay`] applies the variable files of one envdir to an
//! [`EnvironmentBackend`] and remembers enough to undo it:
//!
//! - `applied` maps every name the overlay currently manages to the value it
//!   injected (an empty value means "unset").
//! - `originals` holds the value a name had *before* the overlay first
//!   touched it. Names that did not exist have no entry.
//!
//! Reverting a name restores its original, or removes it if there was none.
//! [`EnvironmentOverlay::clear`] reverts everything, which leaves the backend
//! exactly as it was before the first mutation.

use crate::core::{
    backend::{EnvironmentBackend, ProcessEnv},
    naming::NamingRule,
    paths::{self, PathError, ResolvedPath},
};
use crate::constants::SETUP_ERROR_STATUS;
use scopeguard::ScopeGuard;
use std::{
    collections::{BTreeMap, BTreeSet},
    ffi::OsString,
    fmt, fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use walkdir::WalkDir;

/// Failures of the environment store. All of them are setup failures.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The envdir path could not be resolved.
    #[error(transparent)]
    Path(#[from] PathError),
    /// The directory itself could not be listed.
    #[error("Could not list envdir '{root}': {source}")]
    List {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    /// A variable file could not be read.
    #[error("Could not read variable file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// `write` or `insert` could not store the file.
    #[error("Could not write variable file '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// A variable file could not be deleted.
    #[error("Could not remove variable file '{path}': {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The name cannot be both a file in the envdir and a variable.
    #[error("'{0}' is not a valid environment variable name")]
    InvalidName(String),
    /// Values cannot carry NUL bytes into the environment.
    #[error("The value for '{0}' contains a NUL byte")]
    InvalidValue(String),
    /// `open_default` needs the working directory.
    #[error("Could not determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),
}

impl StoreError {
    /// Exit status associated with this error. All store failures are setup failures.
    pub fn status(&self) -> i32 {
        match self {
            Self::Path(e) => e.status(),
            _ => SETUP_ERROR_STATUS,
        }
    }
}

/// A scoped overlay: derefs to the overlay and clears it when dropped.
pub type ScopedOverlay<B> = ScopeGuard<EnvironmentOverlay<B>, fn(EnvironmentOverlay<B>)>;

/// The reversible set of environment mutations applied from one envdir.
#[derive(Debug)]
pub struct EnvironmentOverlay<B: EnvironmentBackend = ProcessEnv> {
    root: ResolvedPath,
    naming: NamingRule,
    backend: B,
    applied: BTreeMap<String, String>,
    originals: BTreeMap<String, OsString>,
    /// Files this overlay created through `insert`; deleted again on `clear`.
    created: BTreeSet<String>,
}

impl EnvironmentOverlay<ProcessEnv> {
    /// Resolves `path` and applies its variables to the process environment.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let root = paths::resolve_path(path)?;
        Self::open_with(root, ProcessEnv, NamingRule::default())
    }

    /// Opens `./envdir` relative to the current working directory.
    pub fn open_default() -> Result<Self, StoreError> {
        let cwd = std::env::current_dir().map_err(StoreError::CurrentDir)?;
        let default = paths::default_envdir(&cwd);
        Self::open(&default.to_string_lossy())
    }
}

impl<B: EnvironmentBackend> EnvironmentOverlay<B> {
    /// Creates an overlay without applying anything yet.
    pub fn new(root: ResolvedPath, backend: B) -> Self {
        Self {
            root,
            naming: NamingRule::default(),
            backend,
            applied: BTreeMap::new(),
            originals: BTreeMap::new(),
            created: BTreeSet::new(),
        }
    }

    /// Creates an overlay and immediately [`read`](Self::read)s the directory.
    ///
    /// On failure the backend is left as it was found.
    pub fn open_with(root: ResolvedPath, backend: B, naming: NamingRule) -> Result<Self, StoreError> {
        let mut overlay = Self::new(root, backend).with_naming(naming);
        if let Err(e) = overlay.read() {
            if let Err(cleanup) = overlay.clear() {
                log::warn!("Failed to revert {} after a read error: {}", overlay, cleanup);
            }
            return Err(e);
        }
        Ok(overlay)
    }

    /// Sets the filename rule used by discovery.
    pub fn with_naming(mut self, naming: NamingRule) -> Self {
        self.naming = naming;
        self
    }

    /// The resolved envdir directory.
    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    /// The environment this overlay mutates.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Names and values currently injected by this overlay.
    pub fn applied(&self) -> &BTreeMap<String, String> {
        &self.applied
    }

    /// Values the touched names had before this overlay changed them.
    pub fn originals(&self) -> &BTreeMap<String, OsString> {
        &self.originals
    }

    /// Applied names, in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.applied.keys().map(String::as_str)
    }

    /// Applied `(name, value)` pairs, in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.applied.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// True if `name` is applied or has a backing file.
    pub fn contains(&self, name: &str) -> bool {
        self.applied.contains_key(name)
            || (validate_name(name).is_ok() && self.file_path(name).is_file())
    }

    /// Lists the variable files currently in the directory (non-recursive).
    pub fn discover(&self) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        let walker = WalkDir::new(self.root.as_path())
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(StoreError::List {
                        root: self.root.as_path().to_path_buf(),
                        source: e,
                    });
                }
                Err(e) => {
                    log::warn!("Skipping unreadable envdir entry: {}", e);
                    continue;
                }
            };

            let Some(name) = entry.file_name().to_str() else {
                log::warn!(
                    "Skipping '{}': file name is not valid UTF-8.",
                    entry.path().display()
                );
                continue;
            };
            if !entry.file_type().is_file() {
                log::debug!("Skipping '{}': not a regular file.", name);
                continue;
            }
            if !self.naming.accepts(name) {
                log::trace!("Skipping '{}': not a variable name ({:?}).", name, self.naming);
                continue;
            }
            if validate_name(name).is_err() {
                log::debug!("Skipping '{}': not usable as a variable name.", name);
                continue;
            }
            names.push(name.to_string());
        }
        Ok(names)
    }

    /// Reads the value of `name` from its file: trimmed, with NUL bytes turned into newlines.
    pub fn get(&self, name: &str) -> Result<String, StoreError> {
        validate_name(name)?;
        let path = self.file_path(name);
        let bytes = fs::read(&path).map_err(|e| StoreError::Read { path, source: e })?;
        Ok(decode_value(&bytes))
    }

    /// Applies `name = value` to the backend.
    ///
    /// An empty value unsets the variable. The first time a name is touched
    /// its previous value, if any, is kept for [`delete`](Self::delete).
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), StoreError> {
        validate_name(name)?;
        if value.contains('\0') {
            return Err(StoreError::InvalidValue(name.to_string()));
        }

        if !self.applied.contains_key(name) {
            if let Some(existing) = self.backend.var_os(name) {
                self.originals.insert(name.to_string(), existing);
            }
        }
        self.applied.insert(name.to_string(), value.to_string());

        if !value.is_empty() {
            log::debug!("Setting {}", name);
            self.backend.set(name, value);
        } else if self.backend.var_os(name).is_some() {
            log::debug!("Unsetting {} (empty file)", name);
            self.backend.unset(name);
        }
        Ok(())
    }

    /// Reverts `name`: restores its original value, or removes it if it had none.
    ///
    /// Names this overlay does not manage are left alone, so repeated calls are harmless.
    pub fn delete(&mut self, name: &str) {
        if self.applied.remove(name).is_none() {
            log::trace!("{} is not managed by this overlay, nothing to revert.", name);
            return;
        }
        match self.originals.remove(name) {
            Some(original) => {
                log::debug!("Restoring {}", name);
                self.backend.set_os(name, &original);
            }
            None => {
                if self.backend.var_os(name).is_some() {
                    log::debug!("Removing {}", name);
                    self.backend.unset(name);
                }
            }
        }
    }

    /// Scans the directory and applies every variable file. Re-reading picks up changes on disk.
    ///
    /// Every file is read before anything is applied, so a failed read changes nothing.
    pub fn read(&mut self) -> Result<&BTreeMap<String, String>, StoreError> {
        let values = self
            .discover()?
            .into_iter()
            .map(|name| self.get(&name).map(|value| (name, value)))
            .collect::<Result<Vec<_>, _>>()?;
        for (name, value) in values {
            self.set(&name, &value)?;
        }
        log::debug!(
            "Applied {} variable(s) from '{}'",
            self.applied.len(),
            self.root
        );
        Ok(&self.applied)
    }

    /// Reverts every applied name and deletes the files created by [`insert`](Self::insert).
    ///
    /// All names are reverted even if removing a file fails; the first failure is returned.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        let names: Vec<String> = self.applied.keys().cloned().collect();
        for name in &names {
            self.delete(name);
        }

        let mut first_error = None;
        for name in std::mem::take(&mut self.created) {
            let path = self.file_path(&name);
            match fs::remove_file(&path) {
                Ok(()) => log::debug!("Removed created file '{}'", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(StoreError::Remove { path, source: e });
                    }
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Writes `value` to the file for `name`, creating or replacing it. The environment is not touched.
    pub fn write(&self, name: &str, value: &str) -> Result<(), StoreError> {
        validate_name(name)?;
        let path = self.file_path(name);
        fs::write(&path, value).map_err(|e| StoreError::Write { path, source: e })
    }

    /// Writes the file for `name` and applies it.
    ///
    /// If the file did not exist before, it is removed again by [`clear`](Self::clear).
    pub fn insert(&mut self, name: &str, value: &str) -> Result<(), StoreError> {
        validate_name(name)?;
        let existed = self.file_path(name).exists();
        self.write(name, value)?;
        self.set(name, value)?;
        if !existed {
            self.created.insert(name.to_string());
        }
        Ok(())
    }

    /// Deletes the file for `name` and reverts the variable.
    pub fn remove(&mut self, name: &str) -> Result<(), StoreError> {
        validate_name(name)?;
        let path = self.file_path(name);
        fs::remove_file(&path).map_err(|e| StoreError::Remove { path, source: e })?;
        self.created.remove(name);
        self.delete(name);
        Ok(())
    }

    /// Wraps the overlay so that it is cleared on every exit path.
    pub fn scoped(self) -> ScopedOverlay<B> {
        scopeguard::guard(self, release::<B> as fn(Self))
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.root.as_path().join(name)
    }
}

impl<B: EnvironmentBackend> fmt::Display for EnvironmentOverlay<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "envdir overlay '{}'", self.root)
    }
}

fn release<B: EnvironmentBackend>(mut overlay: EnvironmentOverlay<B>) {
    if let Err(e) = overlay.clear() {
        log::warn!("Failed to release {}: {}", overlay, e);
    }
}

/// Names must be usable both as a file in the envdir and as a variable.
fn validate_name(name: &str) -> Result<(), StoreError> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['=', '\0', '/', '\\']);
    if invalid {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn decode_value(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().replace('\0', "\n")
}
