//! Content-derived identity keys.

use std::fmt;

use super::Expr;

/// Identity key of an expression.
///
/// Derived from the canonical rendering, so structurally equal expressions
/// share a key regardless of where they live, and a freshly constructed node
/// always carries a key that reflects its current structure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(String);

impl NodeKey {
    /// Computes the key of an expression.
    #[must_use]
    pub fn of(expr: &Expr) -> Self {
        NodeKey(expr.to_string())
    }

    /// Returns the canonical text behind this key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
