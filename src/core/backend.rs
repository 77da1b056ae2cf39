// src/core/backend.rs

//! The environment an overlay mutates.
//!
//! [`ProcessEnv`] is the live process environment. [`MemoryEnv`] is a plain
//! map, used by tests and by hosts that want to build a child environment
//! without touching their own.

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::process::Command;

/// Capability to read and mutate a set of environment variables.
///
/// Values are carried as [`OsString`] so that whatever was there before an
/// overlay touched a name can be put back byte for byte.
pub trait EnvironmentBackend {
    /// Current value of `name`, if set.
    fn var_os(&self, name: &str) -> Option<OsString>;

    /// Sets `name` to `value`, replacing any previous value.
    fn set_os(&mut self, name: &str, value: &OsStr);

    /// Removes `name`. Removing an absent name is a no-op.
    fn unset(&mut self, name: &str);

    /// All variables, in name order.
    fn snapshot(&self) -> BTreeMap<OsString, OsString>;

    /// Current value of `name` as text. Invalid UTF-8 is replaced lossily.
    fn get(&self, name: &str) -> Option<String> {
        self.var_os(name)
            .map(|value| value.to_string_lossy().into_owned())
    }

    /// Sets `name` to a UTF-8 `value`.
    fn set(&mut self, name: &str, value: &str) {
        self.set_os(name, OsStr::new(value));
    }

    /// Gives `command` this environment.
    ///
    /// The default replaces the inherited environment with [`Self::snapshot`].
    fn configure(&self, command: &mut Command) {
        command.env_clear().envs(self.snapshot());
    }
}

/// The environment of the current process.
///
/// Mutating it is only sound while no other thread reads or writes the
/// environment. The launcher applies an overlay before it spawns anything;
/// hosts embedding the store in a multi-threaded program must serialize
/// access themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

#[allow(unsafe_code)]
impl EnvironmentBackend for ProcessEnv {
    fn var_os(&self, name: &str) -> Option<OsString> {
        std::env::var_os(name)
    }

    fn set_os(&mut self, name: &str, value: &OsStr) {
        // SAFETY: see the type-level contract; the store is the only mutator
        // while it is active and the core is single-threaded.
        unsafe { std::env::set_var(name, value) };
    }

    fn unset(&mut self, name: &str) {
        // SAFETY: as for `set_os`.
        unsafe { std::env::remove_var(name) };
    }

    fn snapshot(&self) -> BTreeMap<OsString, OsString> {
        std::env::vars_os().collect()
    }

    fn configure(&self, _command: &mut Command) {
        // Children inherit the process environment as is.
    }
}

/// An in-memory environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryEnv {
    vars: BTreeMap<OsString, OsString>,
}

impl MemoryEnv {
    /// An empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the current process environment.
    pub fn from_process() -> Self {
        Self {
            vars: ProcessEnv.snapshot(),
        }
    }

    /// Builder-style insert.
    pub fn with(mut self, name: &str, value: impl AsRef<OsStr>) -> Self {
        self.vars.insert(name.into(), value.as_ref().to_os_string());
        self
    }
}

impl<K: Into<OsString>, V: Into<OsString>> FromIterator<(K, V)> for MemoryEnv {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl EnvironmentBackend for MemoryEnv {
    fn var_os(&self, name: &str) -> Option<OsString> {
        self.vars.get(OsStr::new(name)).cloned()
    }

    fn set_os(&mut self, name: &str, value: &OsStr) {
        self.vars.insert(name.into(), value.to_os_string());
    }

    fn unset(&mut self, name: &str) {
        self.vars.remove(OsStr::new(name));
    }

    fn snapshot(&self) -> BTreeMap<OsString, OsString> {
        self.vars.clone()
    }
}

impl<B: EnvironmentBackend + ?Sized> EnvironmentBackend for &mut B {
    fn var_os(&self, name: &str) -> Option<OsString> {
        (**self).var_os(name)
    }

    fn set_os(&mut self, name: &str, value: &OsStr) {
        (**self).set_os(name, value);
    }

    fn unset(&mut self, name: &str) {
        (**self).unset(name);
    }

    fn snapshot(&self) -> BTreeMap<OsString, OsString> {
        (**self).snapshot()
    }

    fn configure(&self, command: &mut Command) {
        (**self).configure(command);
    }
}
