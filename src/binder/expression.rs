//! Expression binding and bottom-up type inference.

use crate::ast::{BinaryOp, Expr, ExprKind, NodeKind, UnaryOp};
use crate::error::{BindError, QuarryError, Result, StructuralError};
use crate::functions::FunctionRegistry;
use crate::types::{DataType, Value};
use crate::visit::QueryPart;

use super::Scope;

const PASS: &str = "binder";

/// Binds expressions against one scope.
pub(crate) struct ExprBinder<'a> {
    scope: &'a Scope,
    functions: &'a FunctionRegistry,
}

impl<'a> ExprBinder<'a> {
    pub(crate) fn new(scope: &'a Scope, functions: &'a FunctionRegistry) -> Self {
        ExprBinder { scope, functions }
    }

    /// Resolves names and infers types for an expression in a clause.
    pub(crate) fn bind(&self, expr: &Expr, part: QueryPart) -> Result<Expr> {
        self.bind_expr(expr, part, false)
    }

    fn bind_expr(&self, expr: &Expr, part: QueryPart, in_aggregate: bool) -> Result<Expr> {
        let bind = |e: &Expr| self.bind_expr(e, part, in_aggregate);
        match &expr.kind {
            ExprKind::Literal(value) => {
                let ty = value.data_type().unwrap_or(DataType::Null);
                Ok(expr.clone().typed(ty))
            }
            ExprKind::Null => Ok(Expr::null().typed(expr.ty.clone().unwrap_or(DataType::Null))),
            ExprKind::Identifier(name) => self.resolve_identifier(name),
            ExprKind::Column { alias, name, .. } => self.resolve_column(alias, name),
            ExprKind::Member { .. } | ExprKind::Index { .. } => {
                self.bind_access_chain(expr, part, in_aggregate)
            }
            ExprKind::Binary { op, left, right } => {
                let left = bind(left)?;
                let right = bind(right)?;
                let ty = binary_type(*op, &left.data_type(), &right.data_type())?;
                Ok(Expr::binary(left, *op, right).typed(ty))
            }
            ExprKind::Unary { op, operand } => {
                let operand = bind(operand)?;
                let ty = unary_type(*op, &operand.data_type())?;
                Ok(Expr::unary(*op, operand).typed(ty))
            }
            ExprKind::Call {
                name,
                args,
                distinct,
            } => self.bind_call(name, args, *distinct, part, in_aggregate),
            ExprKind::Star => Err(QuarryError::unsupported(PASS, NodeKind::Star)),
            ExprKind::Case { whens, otherwise } => {
                let mut bound = Vec::with_capacity(whens.len());
                for (condition, result) in whens {
                    let condition = bind(condition)?;
                    expect_bool("CASE WHEN", &condition.data_type())?;
                    bound.push((condition, bind(result)?));
                }
                let otherwise = otherwise.as_deref().map(bind).transpose()?;
                let branches: Vec<DataType> = bound
                    .iter()
                    .map(|(_, r)| r)
                    .chain(otherwise.iter())
                    .map(Expr::data_type)
                    .collect();
                let ty = DataType::common_of(&branches);
                Ok(Expr::case(bound, otherwise).typed(ty))
            }
            ExprKind::InList {
                expr: inner,
                list,
                negated,
            } => {
                let inner = bind(inner)?;
                let list = list.iter().map(bind).collect::<Result<Vec<_>>>()?;
                for item in &list {
                    binary_type(BinaryOp::Eq, &inner.data_type(), &item.data_type())?;
                }
                Ok(Expr::in_list(inner, list, *negated).typed(DataType::Bool))
            }
            ExprKind::Between {
                expr: inner,
                low,
                high,
                negated,
            } => {
                let inner = bind(inner)?;
                let low = bind(low)?;
                let high = bind(high)?;
                binary_type(BinaryOp::Gte, &inner.data_type(), &low.data_type())?;
                binary_type(BinaryOp::Lte, &inner.data_type(), &high.data_type())?;
                Ok(Expr::between(inner, low, high, *negated).typed(DataType::Bool))
            }
            ExprKind::IsNull { operand, negated } => {
                Ok(Expr::is_null(bind(operand)?, *negated).typed(DataType::Bool))
            }
            ExprKind::GroupRef { .. } => Err(QuarryError::unsupported(PASS, NodeKind::GroupRef)),
        }
    }

    fn resolve_identifier(&self, name: &str) -> Result<Expr> {
        let mut candidates = Vec::new();
        for (alias, entry) in self.scope.sources() {
            if let Some(column) = entry.symbol().column(name) {
                candidates.push((alias, column));
            }
        }
        match candidates.as_slice() {
            [] => Err(BindError::UnknownIdentifier(name.to_string()).into()),
            [(alias, column)] => Ok(column_expr(alias, &column.name, column.ordinal)
                .typed(column.data_type.clone())),
            _ => Err(BindError::AmbiguousColumn {
                column: name.to_string(),
                candidates: candidates.iter().map(|(a, _)| (*a).to_string()).collect(),
            }
            .into()),
        }
    }

    fn resolve_column(&self, alias: &str, name: &str) -> Result<Expr> {
        let symbol = self
            .scope
            .symbol(alias)
            .ok_or_else(|| BindError::UnknownAlias(alias.to_string()))?;
        let column = symbol.column(name).ok_or_else(|| BindError::UnknownColumn {
            alias: alias.to_string(),
            column: name.to_string(),
        })?;
        let name = if symbol.is_merged() {
            column.qualified_name()
        } else {
            column.name.clone()
        };
        Ok(column_expr(alias, &name, column.ordinal).typed(column.data_type.clone()))
    }

    /// Binds a member/indexer chain root first. A root naming an alias turns
    /// the first hop into a column access; every later hop is resolved
    /// against the type of the hop before it.
    fn bind_access_chain(&self, expr: &Expr, part: QueryPart, in_aggregate: bool) -> Result<Expr> {
        let mut hops = Vec::new();
        let mut root = expr;
        loop {
            match &root.kind {
                ExprKind::Member { target, .. } | ExprKind::Index { target, .. } => {
                    hops.push(root);
                    root = target;
                }
                _ => break,
            }
        }
        hops.reverse();

        let (mut current, start) = match (&root.kind, hops.first().map(|h| &h.kind)) {
            (ExprKind::Identifier(alias), Some(ExprKind::Member { member, .. }))
                if self.scope.lookup(alias).is_some() =>
            {
                (self.resolve_column(alias, member)?, 1)
            }
            _ => (self.bind_expr(root, part, in_aggregate)?, 0),
        };

        for hop in &hops[start..] {
            let target_ty = current.data_type();
            current = match &hop.kind {
                ExprKind::Member { member, .. } => {
                    let ty = target_ty.member(member).ok_or_else(|| BindError::UnknownMember {
                        type_name: target_ty.name(),
                        member: member.clone(),
                    })?;
                    Expr::member(current, member).typed(ty)
                }
                ExprKind::Index { index, .. } => {
                    let index = self.bind_expr(index, part, in_aggregate)?;
                    let ty = target_ty.indexer(&index.data_type()).ok_or_else(|| {
                        BindError::NotIndexable {
                            type_name: target_ty.name(),
                            index_type: index.data_type().name(),
                        }
                    })?;
                    Expr::index(current, index).typed(ty)
                }
                _ => return Err(QuarryError::unsupported(PASS, hop.node_kind())),
            };
        }
        Ok(current)
    }

    fn bind_call(
        &self,
        name: &str,
        args: &[Expr],
        distinct: bool,
        part: QueryPart,
        in_aggregate: bool,
    ) -> Result<Expr> {
        let upper = name.to_uppercase();
        if let Some(aggregate) = self.functions.aggregate(&upper) {
            if in_aggregate {
                return Err(StructuralError::NestedAggregate(upper).into());
            }
            if matches!(
                part,
                QueryPart::Where | QueryPart::Join | QueryPart::GroupBy | QueryPart::From
            ) {
                return Err(StructuralError::AggregateNotAllowed {
                    function: upper,
                    clause: part.as_str(),
                }
                .into());
            }
            let bound: Vec<Expr> = match args {
                [arg] if matches!(arg.kind, ExprKind::Star) => vec![arg.clone()],
                _ => args
                    .iter()
                    .map(|a| self.bind_expr(a, part, true))
                    .collect::<Result<_>>()?,
            };
            let arg_type = match bound.as_slice() {
                [arg] if matches!(arg.kind, ExprKind::Star) => None,
                [arg] => Some(arg.data_type()),
                _ => return Err(unknown_function(&upper, &bound)),
            };
            let ty = aggregate
                .return_type(arg_type.as_ref())
                .ok_or_else(|| unknown_function(&upper, &bound))?;
            return Ok(call_expr(upper, bound, distinct).typed(ty));
        }

        let function = self
            .functions
            .scalar(&upper)
            .ok_or_else(|| unknown_function_named(&upper, args))?;
        let bound = args
            .iter()
            .map(|a| self.bind_expr(a, part, in_aggregate))
            .collect::<Result<Vec<_>>>()?;
        let types: Vec<DataType> = bound.iter().map(Expr::data_type).collect();
        let ty = function
            .return_type(&types)
            .ok_or_else(|| unknown_function(&upper, &bound))?;
        Ok(call_expr(upper, bound, false).typed(ty))
    }
}

fn column_expr(alias: &str, name: &str, ordinal: usize) -> Expr {
    Expr::new(ExprKind::Column {
        alias: alias.to_string(),
        name: name.to_string(),
        ordinal: Some(ordinal),
    })
}

fn call_expr(name: String, args: Vec<Expr>, distinct: bool) -> Expr {
    Expr::new(ExprKind::Call {
        name,
        args,
        distinct,
    })
}

fn unknown_function(name: &str, args: &[Expr]) -> QuarryError {
    let types: Vec<String> = args
        .iter()
        .map(|a| match a.kind {
            ExprKind::Star => "*".to_string(),
            _ => a.data_type().name(),
        })
        .collect();
    BindError::UnknownFunction {
        name: name.to_string(),
        args: types.join(", "),
    }
    .into()
}

fn unknown_function_named(name: &str, args: &[Expr]) -> QuarryError {
    BindError::UnknownFunction {
        name: name.to_string(),
        args: format!("{} argument(s)", args.len()),
    }
    .into()
}

fn loose(ty: &DataType) -> bool {
    matches!(ty, DataType::Null | DataType::Any)
}

fn expect_bool(op: &str, ty: &DataType) -> Result<()> {
    if *ty == DataType::Bool || loose(ty) {
        Ok(())
    } else {
        Err(BindError::TypeMismatch {
            op: op.to_string(),
            left: ty.name(),
            right: DataType::Bool.name(),
        }
        .into())
    }
}

/// Infers the result type of a binary operator.
pub(crate) fn binary_type(op: BinaryOp, left: &DataType, right: &DataType) -> Result<DataType> {
    let mismatch = || -> QuarryError {
        BindError::TypeMismatch {
            op: op.as_str().to_string(),
            left: left.name(),
            right: right.name(),
        }
        .into()
    };
    let numeric = |t: &DataType| t.is_numeric() || loose(t);
    let string = |t: &DataType| *t == DataType::String || loose(t);

    if op.is_arithmetic() {
        if op == BinaryOp::Add
            && (*left == DataType::String || *right == DataType::String)
            && string(left)
            && string(right)
        {
            return Ok(DataType::String);
        }
        if numeric(left) && numeric(right) {
            if *left == DataType::Any || *right == DataType::Any {
                return Ok(DataType::Any);
            }
            return Ok(left.common_ancestor(right));
        }
        return Err(mismatch());
    }
    if op.is_comparison() {
        let comparable = loose(left)
            || loose(right)
            || left == right
            || (left.is_numeric() && right.is_numeric());
        return if comparable {
            Ok(DataType::Bool)
        } else {
            Err(mismatch())
        };
    }
    if op.is_logical() {
        let boolean = |t: &DataType| *t == DataType::Bool || loose(t);
        return if boolean(left) && boolean(right) {
            Ok(DataType::Bool)
        } else {
            Err(mismatch())
        };
    }
    // LIKE
    if string(left) && string(right) {
        Ok(DataType::Bool)
    } else {
        Err(mismatch())
    }
}

/// Infers the result type of a unary operator.
pub(crate) fn unary_type(op: UnaryOp, operand: &DataType) -> Result<DataType> {
    let ok = match op {
        UnaryOp::Neg => operand.is_numeric() || loose(operand),
        UnaryOp::Not => *operand == DataType::Bool || loose(operand),
    };
    if !ok {
        return Err(BindError::TypeMismatch {
            op: op.as_str().trim().to_string(),
            left: operand.name(),
            right: String::new(),
        }
        .into());
    }
    Ok(match op {
        UnaryOp::Neg => operand.clone(),
        UnaryOp::Not => DataType::Bool,
    })
}

/// Returns the value of a literal source argument.
pub(crate) fn literal_value(expr: &Expr) -> Option<Value> {
    match &expr.kind {
        ExprKind::Literal(value) => Some(value.clone()),
        ExprKind::Null => Some(Value::Null),
        ExprKind::Unary {
            op: UnaryOp::Neg,
            operand,
        } => match literal_value(operand)? {
            Value::Int64(v) => v.checked_neg().map(Value::Int64),
            Value::Float64(v) => Some(Value::Float64(-v)),
            _ => None,
        },
        _ => None,
    }
}
