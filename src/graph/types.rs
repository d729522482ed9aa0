//! Core identifier types for the graph engine.
//!
//! These types provide type-safe identifiers for nodes and scopes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a node within a graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(String);

/// Path-qualified identifier for a scope (task group).
///
/// Nested scopes are joined with `.`, e.g. `section_1.section_1_sub`.
/// The root scope is the empty path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScopeId(String);

impl NodeId {
    /// Create a new NodeId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the underlying string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl ScopeId {
    /// The root scope, which every graph has implicitly.
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Create a ScopeId from an already-qualified path.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Build the qualified id of a child scope under this one.
    pub fn child(&self, name: &str) -> Self {
        if self.0.is_empty() {
            Self(name.to_string())
        } else {
            Self(format!("{}.{}", self.0, name))
        }
    }

    /// Whether this is the root scope.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the underlying path value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ScopeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ScopeId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "<root>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}
