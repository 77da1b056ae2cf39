// src/core/naming.rs

//! Which directory entries are variable files.

use serde::Deserialize;

/// Decides which directory entries are variable files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingRule {
    /// Any name without `=`.
    #[default]
    Permissive,
    /// daemontools-style: all uppercase, no leading `_`, no `=`.
    Strict,
}

impl NamingRule {
    /// Returns true if a file called `name` holds a variable under this rule.
    ///
    /// Hidden names (leading `.`) never qualify.
    pub fn accepts(self, name: &str) -> bool {
        if name.is_empty() || name.starts_with('.') || name.contains('=') || name.contains('\0') {
            return false;
        }
        match self {
            Self::Permissive => true,
            Self::Strict => !name.starts_with('_') && name == name.to_uppercase(),
        }
    }
}
