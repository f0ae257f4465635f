//! Abstract syntax tree shared by every compilation pass.
//!
//! The tree is produced by an external parser and never mutated in place:
//! the binder and every rewriter clone and reconstruct the nodes they visit,
//! so a source tree can be shared read-only between compilations.

mod display;
mod expr;
mod identity;
mod kind;

pub use expr::{BinaryOp, Expr, ExprKind, UnaryOp};
pub use identity::NodeKey;
pub use kind::NodeKind;

use serde::{Deserialize, Serialize};

use crate::binder::ScopeId;
use crate::types::DataType;

/// A top-level statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Plain query.
    Query(Query),
    /// Query preceded by common table expressions.
    With { ctes: Vec<CteDef>, body: Query },
}

impl Statement {
    /// Returns the body query of this statement.
    #[must_use]
    pub fn body(&self) -> &Query {
        match self {
            Statement::Query(q) | Statement::With { body: q, .. } => q,
        }
    }
}

/// Common table expression definition (`WITH name AS (query)`).
#[derive(Debug, Clone, PartialEq)]
pub struct CteDef {
    pub name: String,
    pub query: Query,
}

impl CteDef {
    /// Creates a CTE definition.
    #[must_use]
    pub fn new(name: impl Into<String>, query: Query) -> Self {
        CteDef {
            name: name.into(),
            query,
        }
    }
}

/// A row-producing query.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Single SELECT.
    Select(Box<SelectQuery>),
    /// Binary set operation.
    ///
    /// A right-nested chain `A op1 (B op2 C)` means `(A op1 B) op2 C`.
    SetOperation(Box<SetOperation>),
}

impl Query {
    /// Wraps a SELECT.
    #[must_use]
    pub fn select(select: SelectQuery) -> Self {
        Query::Select(Box::new(select))
    }

    /// Builds a set operation.
    #[must_use]
    pub fn set_operation(op: SetOperator, keys: Vec<String>, left: Query, right: Query) -> Self {
        Query::SetOperation(Box::new(SetOperation {
            op,
            keys,
            left,
            right,
        }))
    }

    /// Builds `left UNION (keys) right`.
    #[must_use]
    pub fn union(left: Query, right: Query, keys: Vec<String>) -> Self {
        Query::set_operation(SetOperator::Union, keys, left, right)
    }

    /// Builds `left UNION ALL right`.
    #[must_use]
    pub fn union_all(left: Query, right: Query) -> Self {
        Query::set_operation(SetOperator::UnionAll, Vec::new(), left, right)
    }

    /// Builds `left EXCEPT (keys) right`.
    #[must_use]
    pub fn except(left: Query, right: Query, keys: Vec<String>) -> Self {
        Query::set_operation(SetOperator::Except, keys, left, right)
    }

    /// Builds `left INTERSECT (keys) right`.
    #[must_use]
    pub fn intersect(left: Query, right: Query, keys: Vec<String>) -> Self {
        Query::set_operation(SetOperator::Intersect, keys, left, right)
    }

    /// Returns the node kind.
    #[must_use]
    pub fn node_kind(&self) -> NodeKind {
        match self {
            Query::Select(_) => NodeKind::Select,
            Query::SetOperation(_) => NodeKind::SetOperation,
        }
    }
}

/// Set operation node.
#[derive(Debug, Clone, PartialEq)]
pub struct SetOperation {
    pub op: SetOperator,
    /// Distinguishing column names (empty for UNION ALL).
    pub keys: Vec<String>,
    pub left: Query,
    pub right: Query,
}

/// Set operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SetOperator {
    Union,
    UnionAll,
    Except,
    Intersect,
}

impl SetOperator {
    /// Returns the SQL keyword(s) for this operator.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SetOperator::Union => "UNION",
            SetOperator::UnionAll => "UNION ALL",
            SetOperator::Except => "EXCEPT",
            SetOperator::Intersect => "INTERSECT",
        }
    }
}

/// SELECT query.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub fields: Vec<Field>,
    pub distinct: bool,
    pub from: FromClause,
    pub where_clause: Option<Expr>,
    pub group_by: Option<GroupByClause>,
    pub order_by: Vec<OrderItem>,
    pub skip: Option<u64>,
    pub take: Option<u64>,
    /// Lexical scope assigned by the binder.
    pub scope: Option<ScopeId>,
}

impl SelectQuery {
    /// Creates a new SELECT over the given source.
    #[must_use]
    pub fn new(fields: Vec<Field>, from: FromClause) -> Self {
        SelectQuery {
            fields,
            distinct: false,
            from,
            where_clause: None,
            group_by: None,
            order_by: Vec::new(),
            skip: None,
            take: None,
            scope: None,
        }
    }

    /// Sets the DISTINCT flag.
    #[must_use]
    pub fn with_distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Sets the WHERE clause.
    #[must_use]
    pub fn with_where(mut self, predicate: Expr) -> Self {
        self.where_clause = Some(predicate);
        self
    }

    /// Sets the GROUP BY keys.
    #[must_use]
    pub fn with_group_by(mut self, keys: Vec<Expr>) -> Self {
        let having = self.group_by.take().and_then(|g| g.having);
        self.group_by = Some(GroupByClause {
            keys,
            having,
            aggregates: Vec::new(),
        });
        self
    }

    /// Sets the HAVING predicate, creating an empty GROUP BY if needed.
    #[must_use]
    pub fn with_having(mut self, predicate: Expr) -> Self {
        let mut group_by = self.group_by.take().unwrap_or_default();
        group_by.having = Some(predicate);
        self.group_by = Some(group_by);
        self
    }

    /// Appends an ORDER BY item.
    #[must_use]
    pub fn with_order_by(mut self, item: OrderItem) -> Self {
        self.order_by.push(item);
        self
    }

    /// Sets the SKIP amount.
    #[must_use]
    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Sets the TAKE amount.
    #[must_use]
    pub fn with_take(mut self, take: u64) -> Self {
        self.take = Some(take);
        self
    }

    /// Returns true if the query groups rows.
    #[must_use]
    pub fn is_grouped(&self) -> bool {
        self.group_by.is_some()
    }

    /// Returns the output column names.
    #[must_use]
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(Field::name).collect()
    }
}

/// Selected field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl Field {
    /// Creates an unaliased field.
    #[must_use]
    pub fn new(expr: Expr) -> Self {
        Field { expr, alias: None }
    }

    /// Creates an aliased field.
    #[must_use]
    pub fn aliased(expr: Expr, alias: impl Into<String>) -> Self {
        Field {
            expr,
            alias: Some(alias.into()),
        }
    }

    /// Returns the output name: the alias, or the expression text.
    #[must_use]
    pub fn name(&self) -> String {
        self.alias.clone().unwrap_or_else(|| self.expr.to_string())
    }
}

/// ORDER BY item.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub expr: Expr,
    pub ascending: bool,
}

impl OrderItem {
    /// Creates an ascending order item.
    #[must_use]
    pub fn asc(expr: Expr) -> Self {
        OrderItem {
            expr,
            ascending: true,
        }
    }

    /// Creates a descending order item.
    #[must_use]
    pub fn desc(expr: Expr) -> Self {
        OrderItem {
            expr,
            ascending: false,
        }
    }
}

/// GROUP BY clause.
///
/// `aggregates` is empty until the aggregate rewrite has run; afterwards the
/// group-result row is laid out as `keys ++ aggregates`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupByClause {
    pub keys: Vec<Expr>,
    pub having: Option<Expr>,
    pub aggregates: Vec<AggregateCall>,
}

/// Aggregate call extracted from a grouped query.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateCall {
    /// Upper-cased function name.
    pub function: String,
    /// Argument; `None` for `COUNT(*)`.
    pub arg: Option<Expr>,
    pub distinct: bool,
    pub data_type: DataType,
}

/// FROM clause: a single source or a left-deep join chain.
#[derive(Debug, Clone, PartialEq)]
pub enum FromClause {
    Source(Source),
    Join(Box<Join>),
}

impl FromClause {
    /// Creates a FROM clause over a single source.
    #[must_use]
    pub fn source(source: Source) -> Self {
        FromClause::Source(source)
    }

    /// Joins another source onto this clause.
    #[must_use]
    pub fn join(self, right: Source, kind: JoinKind, on: Option<Expr>) -> Self {
        FromClause::Join(Box::new(Join {
            left: self,
            right,
            kind,
            on,
        }))
    }

    /// Inner-joins another source onto this clause.
    #[must_use]
    pub fn inner_join(self, right: Source, on: Expr) -> Self {
        self.join(right, JoinKind::Inner, Some(on))
    }
}

/// Join of a FROM chain with one more source.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub left: FromClause,
    pub right: Source,
    pub kind: JoinKind,
    pub on: Option<Expr>,
}

/// Join kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinKind {
    Inner,
    LeftOuter,
    RightOuter,
    Cross,
}

impl JoinKind {
    /// Returns the SQL keyword(s) for this join kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::LeftOuter => "LEFT OUTER JOIN",
            JoinKind::RightOuter => "RIGHT OUTER JOIN",
            JoinKind::Cross => "CROSS JOIN",
        }
    }
}

/// Row-producing source with its alias.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub alias: String,
    pub kind: SourceKind,
}

impl Source {
    /// Creates a schema method source (`#schema.method(args) alias`).
    #[must_use]
    pub fn schema(
        schema: impl Into<String>,
        method: impl Into<String>,
        args: Vec<Expr>,
        alias: impl Into<String>,
    ) -> Self {
        Source {
            alias: alias.into(),
            kind: SourceKind::Schema {
                schema: schema.into(),
                method: method.into(),
                args,
            },
        }
    }

    /// Creates a reference to a common table expression.
    #[must_use]
    pub fn reference(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Source {
            alias: alias.into(),
            kind: SourceKind::Reference { name: name.into() },
        }
    }

    /// Creates a derived-table source.
    #[must_use]
    pub fn subquery(query: Query, alias: impl Into<String>) -> Self {
        Source {
            alias: alias.into(),
            kind: SourceKind::Subquery(Box::new(query)),
        }
    }

    /// Returns the node kind.
    #[must_use]
    pub fn node_kind(&self) -> NodeKind {
        match self.kind {
            SourceKind::Schema { .. } => NodeKind::SchemaSource,
            SourceKind::Reference { .. } => NodeKind::ReferenceSource,
            SourceKind::Subquery(_) => NodeKind::SubquerySource,
        }
    }
}

/// Source variants.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceKind {
    Schema {
        schema: String,
        method: String,
        args: Vec<Expr>,
    },
    Reference {
        name: String,
    },
    Subquery(Box<Query>),
}
