// src/core/mod.rs

//! # Environment Store
//!
//! - **`paths`**: resolves user-supplied envdir paths (`~` expansion,
//!   canonicalization, existence and type checks) and locates the config file.
//! - **`naming`**: the rule deciding which directory entries are variables.
//! - **`backend`**: the environment an overlay mutates (process or in-memory).
//! - **`overlay`**: discovery, value extraction and reversible apply/revert.
//! - **`config`**: the optional `config.toml` user settings.

pub mod backend;
pub mod config;
pub mod naming;
pub mod overlay;
pub mod paths;

pub use backend::{EnvironmentBackend, MemoryEnv, ProcessEnv};
pub use config::EnvdirConfig;
pub use naming::NamingRule;
pub use overlay::{EnvironmentOverlay, ScopedOverlay, StoreError};
pub use paths::{PathError, ResolvedPath, resolve_path};
