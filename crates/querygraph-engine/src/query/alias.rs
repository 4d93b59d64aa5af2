//! Query-scoped alias generation.

use std::fmt;

/// An identifier naming one node in compiled text (`hobj1`, `hobj2`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Alias(String);

impl Alias {
    /// Returns the alias text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hands out aliases unique within one root query and all of its sub-queries.
#[derive(Debug, Clone)]
pub struct AliasProvider {
    prefix: String,
    issued: usize,
}

impl AliasProvider {
    /// Creates a provider whose aliases start with `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            issued: 0,
        }
    }

    /// Issues the next alias.
    pub fn next_alias(&mut self) -> Alias {
        self.issued += 1;
        Alias(format!("{}{}", self.prefix, self.issued))
    }

    /// Number of aliases issued so far.
    pub const fn issued(&self) -> usize {
        self.issued
    }
}
