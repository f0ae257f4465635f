//! Expression nodes.

use serde::{Deserialize, Serialize};

use crate::types::{DataType, Value};

use super::{NodeKey, NodeKind};

/// Expression node. `ty` is `None` until the binder has run.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Option<DataType>,
}

/// Expression variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Constant value.
    Literal(Value),
    /// Null literal; its type is `Null` until retyped from context.
    Null,
    /// Unqualified name.
    Identifier(String),
    /// Resolved column of a scope-bound alias.
    Column {
        alias: String,
        name: String,
        ordinal: Option<usize>,
    },
    /// Member access (`target.member`).
    Member { target: Box<Expr>, member: String },
    /// Indexer access (`target[index]`).
    Index { target: Box<Expr>, index: Box<Expr> },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary { op: UnaryOp, operand: Box<Expr> },
    /// Function or aggregate call.
    Call {
        name: String,
        args: Vec<Expr>,
        distinct: bool,
    },
    /// `*` inside `COUNT(*)`.
    Star,
    Case {
        whens: Vec<(Expr, Expr)>,
        otherwise: Option<Box<Expr>>,
    },
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    IsNull { operand: Box<Expr>, negated: bool },
    /// Ordinal access into a materialized group-result row.
    GroupRef { ordinal: usize, label: String },
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
    Like,
}

impl BinaryOp {
    /// Returns the string representation of this operator.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "=",
            BinaryOp::Neq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Like => "LIKE",
        }
    }

    /// Returns true for `=`, `<>`, `<`, `<=`, `>`, `>=`.
    #[must_use]
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::Neq
                | BinaryOp::Lt
                | BinaryOp::Lte
                | BinaryOp::Gt
                | BinaryOp::Gte
        )
    }

    /// Returns true for `+`, `-`, `*`, `/`, `%`.
    #[must_use]
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod
        )
    }

    /// Returns true for `AND`, `OR`.
    #[must_use]
    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    /// Returns the string representation of this operator.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "NOT ",
        }
    }
}

impl Expr {
    /// Creates an untyped expression.
    #[must_use]
    pub fn new(kind: ExprKind) -> Self {
        Expr { kind, ty: None }
    }

    /// Returns a copy of this expression carrying the given type.
    #[must_use]
    pub fn typed(mut self, ty: DataType) -> Self {
        self.ty = Some(ty);
        self
    }

    /// Returns the inferred type, or `Any` before binding.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        self.ty.clone().unwrap_or(DataType::Any)
    }

    /// Returns the content-derived identity key.
    #[must_use]
    pub fn key(&self) -> NodeKey {
        NodeKey::of(self)
    }

    /// Returns the node kind.
    #[must_use]
    pub fn node_kind(&self) -> NodeKind {
        match &self.kind {
            ExprKind::Literal(_) => NodeKind::Literal,
            ExprKind::Null => NodeKind::Null,
            ExprKind::Identifier(_) => NodeKind::Identifier,
            ExprKind::Column { .. } => NodeKind::Column,
            ExprKind::Member { .. } => NodeKind::Member,
            ExprKind::Index { .. } => NodeKind::Index,
            ExprKind::Binary { .. } => NodeKind::Binary,
            ExprKind::Unary { .. } => NodeKind::Unary,
            ExprKind::Call { .. } => NodeKind::Call,
            ExprKind::Star => NodeKind::Star,
            ExprKind::Case { .. } => NodeKind::Case,
            ExprKind::InList { .. } => NodeKind::InList,
            ExprKind::Between { .. } => NodeKind::Between,
            ExprKind::IsNull { .. } => NodeKind::IsNull,
            ExprKind::GroupRef { .. } => NodeKind::GroupRef,
        }
    }

    /// Returns the direct children in visiting order.
    #[must_use]
    pub fn children(&self) -> Vec<&Expr> {
        match &self.kind {
            ExprKind::Literal(_)
            | ExprKind::Null
            | ExprKind::Identifier(_)
            | ExprKind::Column { .. }
            | ExprKind::Star
            | ExprKind::GroupRef { .. } => Vec::new(),
            ExprKind::Member { target, .. } => vec![target.as_ref()],
            ExprKind::Index { target, index } => vec![target.as_ref(), index.as_ref()],
            ExprKind::Binary { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            ExprKind::Unary { operand, .. } | ExprKind::IsNull { operand, .. } => {
                vec![operand.as_ref()]
            }
            ExprKind::Call { args, .. } => args.iter().collect(),
            ExprKind::Case { whens, otherwise } => {
                let mut out: Vec<&Expr> = whens.iter().flat_map(|(c, r)| [c, r]).collect();
                if let Some(e) = otherwise {
                    out.push(e.as_ref());
                }
                out
            }
            ExprKind::InList { expr, list, .. } => {
                let mut out = vec![expr.as_ref()];
                out.extend(list.iter());
                out
            }
            ExprKind::Between {
                expr, low, high, ..
            } => vec![expr.as_ref(), low.as_ref(), high.as_ref()],
        }
    }

    // ==================== Constructors ====================

    /// Creates a literal expression.
    #[must_use]
    pub fn literal(value: Value) -> Self {
        if value.is_null() {
            return Expr::null();
        }
        Expr::new(ExprKind::Literal(value))
    }

    /// Creates an integer literal.
    #[must_use]
    pub fn int(value: i64) -> Self {
        Expr::literal(Value::Int64(value))
    }

    /// Creates a float literal.
    #[must_use]
    pub fn float(value: f64) -> Self {
        Expr::literal(Value::Float64(value))
    }

    /// Creates a string literal.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Expr::literal(Value::String(value.into()))
    }

    /// Creates a boolean literal.
    #[must_use]
    pub fn bool(value: bool) -> Self {
        Expr::literal(Value::Bool(value))
    }

    /// Creates an untyped null literal.
    #[must_use]
    pub fn null() -> Self {
        Expr::new(ExprKind::Null)
    }

    /// Creates an unqualified identifier.
    #[must_use]
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::new(ExprKind::Identifier(name.into()))
    }

    /// Creates a dotted access path, e.g. `"a.address.city"`.
    ///
    /// The first segment becomes an identifier and every further segment a
    /// member access, which is how the parser represents qualified names.
    #[must_use]
    pub fn path(dotted: &str) -> Self {
        let mut segments = dotted.split('.');
        let root = Expr::ident(segments.next().unwrap_or_default());
        segments.fold(root, Expr::member)
    }

    /// Creates an unresolved column access for an alias.
    #[must_use]
    pub fn column(alias: impl Into<String>, name: impl Into<String>) -> Self {
        Expr::new(ExprKind::Column {
            alias: alias.into(),
            name: name.into(),
            ordinal: None,
        })
    }

    /// Creates a member access.
    #[must_use]
    pub fn member(target: Expr, member: &str) -> Self {
        Expr::new(ExprKind::Member {
            target: Box::new(target),
            member: member.to_string(),
        })
    }

    /// Creates an indexer access.
    #[must_use]
    pub fn index(target: Expr, index: Expr) -> Self {
        Expr::new(ExprKind::Index {
            target: Box::new(target),
            index: Box::new(index),
        })
    }

    /// Creates a binary expression.
    #[must_use]
    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        Expr::new(ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// Creates `left = right`.
    #[must_use]
    pub fn eq(left: Expr, right: Expr) -> Self {
        Expr::binary(left, BinaryOp::Eq, right)
    }

    /// Creates `left + right`.
    #[must_use]
    pub fn add(left: Expr, right: Expr) -> Self {
        Expr::binary(left, BinaryOp::Add, right)
    }

    /// Creates `left AND right`.
    #[must_use]
    pub fn and(left: Expr, right: Expr) -> Self {
        Expr::binary(left, BinaryOp::And, right)
    }

    /// Creates `left OR right`.
    #[must_use]
    pub fn or(left: Expr, right: Expr) -> Self {
        Expr::binary(left, BinaryOp::Or, right)
    }

    /// Creates a unary expression.
    #[must_use]
    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::new(ExprKind::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    /// Creates a function call.
    #[must_use]
    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::new(ExprKind::Call {
            name: name.into(),
            args,
            distinct: false,
        })
    }

    /// Creates a `DISTINCT` aggregate call.
    #[must_use]
    pub fn call_distinct(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::new(ExprKind::Call {
            name: name.into(),
            args,
            distinct: true,
        })
    }

    /// Creates `COUNT(*)`.
    #[must_use]
    pub fn count_star() -> Self {
        Expr::call("COUNT", vec![Expr::new(ExprKind::Star)])
    }

    /// Creates a searched CASE expression.
    #[must_use]
    pub fn case(whens: Vec<(Expr, Expr)>, otherwise: Option<Expr>) -> Self {
        Expr::new(ExprKind::Case {
            whens,
            otherwise: otherwise.map(Box::new),
        })
    }

    /// Creates `expr [NOT] IN (list)`.
    #[must_use]
    pub fn in_list(expr: Expr, list: Vec<Expr>, negated: bool) -> Self {
        Expr::new(ExprKind::InList {
            expr: Box::new(expr),
            list,
            negated,
        })
    }

    /// Creates `expr [NOT] BETWEEN low AND high`.
    #[must_use]
    pub fn between(expr: Expr, low: Expr, high: Expr, negated: bool) -> Self {
        Expr::new(ExprKind::Between {
            expr: Box::new(expr),
            low: Box::new(low),
            high: Box::new(high),
            negated,
        })
    }

    /// Creates `operand IS [NOT] NULL`.
    #[must_use]
    pub fn is_null(operand: Expr, negated: bool) -> Self {
        Expr::new(ExprKind::IsNull {
            operand: Box::new(operand),
            negated,
        })
    }

    /// Creates a group-row access.
    #[must_use]
    pub fn group_ref(ordinal: usize, label: impl Into<String>) -> Self {
        Expr::new(ExprKind::GroupRef {
            ordinal,
            label: label.into(),
        })
    }
}
