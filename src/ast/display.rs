//! Canonical text rendering.
//!
//! The expression rendering is the canonical stringification used for
//! identity keys and for field-name lookups in the aggregate rewrite, so it
//! must stay deterministic and must not include inferred types.

use std::fmt;

use super::{
    Expr, ExprKind, FromClause, Query, SelectQuery, Source, SourceKind, Statement,
};

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Literal(value) => write!(f, "{value}"),
            ExprKind::Null => f.write_str("NULL"),
            ExprKind::Identifier(name) => f.write_str(name),
            ExprKind::Column { alias, name, .. } => {
                if name.contains('.') {
                    write!(f, "{alias}.[{name}]")
                } else {
                    write!(f, "{alias}.{name}")
                }
            }
            ExprKind::Member { target, member } => write!(f, "{target}.{member}"),
            ExprKind::Index { target, index } => write!(f, "{target}[{index}]"),
            ExprKind::Binary { op, left, right } => {
                write!(f, "({left} {} {right})", op.as_str())
            }
            ExprKind::Unary { op, operand } => write!(f, "({}{operand})", op.as_str()),
            ExprKind::Call {
                name,
                args,
                distinct,
            } => {
                write!(f, "{}(", name.to_uppercase())?;
                if *distinct {
                    f.write_str("DISTINCT ")?;
                }
                write_list(f, args)?;
                f.write_str(")")
            }
            ExprKind::Star => f.write_str("*"),
            ExprKind::Case { whens, otherwise } => {
                f.write_str("CASE")?;
                for (cond, result) in whens {
                    write!(f, " WHEN {cond} THEN {result}")?;
                }
                if let Some(e) = otherwise {
                    write!(f, " ELSE {e}")?;
                }
                f.write_str(" END")
            }
            ExprKind::InList {
                expr,
                list,
                negated,
            } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "({expr} {not}IN (")?;
                write_list(f, list)?;
                f.write_str("))")
            }
            ExprKind::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "({expr} {not}BETWEEN {low} AND {high})")
            }
            ExprKind::IsNull { operand, negated } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "({operand} IS {not}NULL)")
            }
            ExprKind::GroupRef { ordinal, .. } => write!(f, "group[{ordinal}]"),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            SourceKind::Schema {
                schema,
                method,
                args,
            } => {
                write!(f, "#{schema}.{method}(")?;
                write_list(f, args)?;
                write!(f, ") {}", self.alias)
            }
            SourceKind::Reference { name } => write!(f, "{name} {}", self.alias),
            SourceKind::Subquery(query) => write!(f, "({query}) {}", self.alias),
        }
    }
}

impl fmt::Display for FromClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FromClause::Source(source) => write!(f, "{source}"),
            FromClause::Join(join) => {
                write!(f, "{} {} {}", join.left, join.kind.as_str(), join.right)?;
                if let Some(on) = &join.on {
                    write!(f, " ON {on}")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for SelectQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT ")?;
        if self.distinct {
            f.write_str("DISTINCT ")?;
        }
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", field.expr)?;
            if let Some(alias) = &field.alias {
                write!(f, " AS {alias}")?;
            }
        }
        write!(f, " FROM {}", self.from)?;
        if let Some(predicate) = &self.where_clause {
            write!(f, " WHERE {predicate}")?;
        }
        if let Some(group_by) = &self.group_by {
            if !group_by.keys.is_empty() {
                f.write_str(" GROUP BY ")?;
                write_list(f, &group_by.keys)?;
            }
            if let Some(having) = &group_by.having {
                write!(f, " HAVING {having}")?;
            }
        }
        for (i, item) in self.order_by.iter().enumerate() {
            f.write_str(if i == 0 { " ORDER BY " } else { ", " })?;
            write!(f, "{}", item.expr)?;
            if !item.ascending {
                f.write_str(" DESC")?;
            }
        }
        if let Some(skip) = self.skip {
            write!(f, " SKIP {skip}")?;
        }
        if let Some(take) = self.take {
            write!(f, " TAKE {take}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Select(select) => write!(f, "{select}"),
            Query::SetOperation(set) => {
                write!(f, "{} {}", set.left, set.op.as_str())?;
                if !set.keys.is_empty() {
                    write!(f, " ({})", set.keys.join(", "))?;
                }
                write!(f, " {}", set.right)
            }
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Query(query) => write!(f, "{query}"),
            Statement::With { ctes, body } => {
                f.write_str("WITH ")?;
                for (i, cte) in ctes.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} AS ({})", cte.name, cte.query)?;
                }
                write!(f, " {body}")
            }
        }
    }
}
