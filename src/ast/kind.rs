//! Flat enumeration of node kinds, used in diagnostics.

use std::fmt;

/// Kind of an AST node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    // Statements and queries
    Statement,
    Cte,
    Select,
    SetOperation,
    Join,
    SchemaSource,
    ReferenceSource,
    SubquerySource,
    Field,
    OrderItem,
    GroupBy,
    // Expressions
    Literal,
    Null,
    Identifier,
    Column,
    Member,
    Index,
    Binary,
    Unary,
    Call,
    Star,
    Case,
    InList,
    Between,
    IsNull,
    GroupRef,
}

impl NodeKind {
    /// Returns the name of this node kind.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Statement => "Statement",
            NodeKind::Cte => "Cte",
            NodeKind::Select => "Select",
            NodeKind::SetOperation => "SetOperation",
            NodeKind::Join => "Join",
            NodeKind::SchemaSource => "SchemaSource",
            NodeKind::ReferenceSource => "ReferenceSource",
            NodeKind::SubquerySource => "SubquerySource",
            NodeKind::Field => "Field",
            NodeKind::OrderItem => "OrderItem",
            NodeKind::GroupBy => "GroupBy",
            NodeKind::Literal => "Literal",
            NodeKind::Null => "Null",
            NodeKind::Identifier => "Identifier",
            NodeKind::Column => "Column",
            NodeKind::Member => "Member",
            NodeKind::Index => "Index",
            NodeKind::Binary => "Binary",
            NodeKind::Unary => "Unary",
            NodeKind::Call => "Call",
            NodeKind::Star => "Star",
            NodeKind::Case => "Case",
            NodeKind::InList => "InList",
            NodeKind::Between => "Between",
            NodeKind::IsNull => "IsNull",
            NodeKind::GroupRef => "GroupRef",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
