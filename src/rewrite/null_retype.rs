//! Null literal retyping.
//!
//! A bare `NULL` is typed `Null` by the binder. Once the surrounding
//! operator fixes the expected type, the literal is replaced by a null of
//! that type so code generation sees concrete operand types.

use crate::ast::{BinaryOp, Expr, ExprKind, Statement};
use crate::binder::{binary_type, ScopeTree};
use crate::error::Result;
use crate::types::DataType;
use crate::visit::{fold_children, Folder, QueryPart};

use super::{Rewriter, Transformed};

/// Retypes untyped null literals from their context.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRetype;

impl Rewriter for NullRetype {
    fn name(&self) -> &'static str {
        "null_retype"
    }

    fn rewrite(&self, statement: &Statement, _scopes: &ScopeTree) -> Result<Transformed<Statement>> {
        let mut folder = NullFolder { changed: 0 };
        let statement = folder.fold_statement(statement)?;
        Ok(Transformed::from_count(statement, folder.changed))
    }
}

struct NullFolder {
    changed: usize,
}

fn is_untyped_null(expr: &Expr) -> bool {
    matches!(expr.kind, ExprKind::Null) && matches!(expr.ty, None | Some(DataType::Null))
}

fn is_concrete(ty: &DataType) -> bool {
    !matches!(ty, DataType::Null | DataType::Any)
}

impl NullFolder {
    fn retype(&mut self, expr: Expr, ty: &DataType) -> Expr {
        if is_untyped_null(&expr) && is_concrete(ty) {
            self.changed += 1;
            Expr::null().typed(ty.clone())
        } else {
            expr
        }
    }

    fn retype_all(&mut self, exprs: Vec<Expr>, ty: &DataType) -> Vec<Expr> {
        exprs.into_iter().map(|e| self.retype(e, ty)).collect()
    }
}

impl Folder for NullFolder {
    fn pass_name(&self) -> &'static str {
        "null_retype"
    }

    fn fold_expr(&mut self, expr: &Expr, part: QueryPart) -> Result<Expr> {
        let folded = fold_children(self, expr, part)?;
        let ty = folded.ty.clone();
        let kind = match folded.kind {
            ExprKind::Binary { op, left, right }
                if op.is_comparison() || op.is_arithmetic() || op == BinaryOp::Like =>
            {
                let left = self.retype(*left, &right.data_type());
                let right = self.retype(*right, &left.data_type());
                // Arithmetic over a retyped null now has a concrete result type.
                let ty = if op.is_arithmetic() {
                    Some(binary_type(op, &left.data_type(), &right.data_type())?)
                } else {
                    ty
                };
                return Ok(Expr {
                    kind: ExprKind::Binary {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                    ty,
                });
            }
            ExprKind::Case { whens, otherwise } => {
                let context = ty.clone().unwrap_or(DataType::Any);
                let whens = whens
                    .into_iter()
                    .map(|(cond, result)| (cond, self.retype(result, &context)))
                    .collect();
                let otherwise = otherwise.map(|e| Box::new(self.retype(*e, &context)));
                ExprKind::Case { whens, otherwise }
            }
            ExprKind::InList {
                expr: target,
                list,
                negated,
            } => {
                let mut types = vec![target.data_type()];
                types.extend(list.iter().map(Expr::data_type));
                let context = DataType::common_of(&types);
                let target = self.retype(*target, &context);
                let list = self.retype_all(list, &context);
                ExprKind::InList {
                    expr: Box::new(target),
                    list,
                    negated,
                }
            }
            ExprKind::Between {
                expr: target,
                low,
                high,
                negated,
            } => {
                let context = target.data_type();
                ExprKind::Between {
                    low: Box::new(self.retype(*low, &context)),
                    high: Box::new(self.retype(*high, &context)),
                    expr: target,
                    negated,
                }
            }
            ExprKind::Call {
                name,
                args,
                distinct,
            } if name.eq_ignore_ascii_case("COALESCE") => {
                let context = ty.clone().unwrap_or(DataType::Any);
                ExprKind::Call {
                    args: self.retype_all(args, &context),
                    name,
                    distinct,
                }
            }
            other => other,
        };
        Ok(Expr { kind, ty })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Field, FromClause, Query, SelectQuery, Source};

    fn col(name: &str, ty: DataType) -> Expr {
        Expr::column("t", name).typed(ty)
    }

    fn null() -> Expr {
        Expr::null().typed(DataType::Null)
    }

    fn fold(expr: Expr) -> (Expr, usize) {
        let mut folder = NullFolder { changed: 0 };
        let out = folder.fold_expr(&expr, QueryPart::Select).unwrap();
        (out, folder.changed)
    }

    fn right(expr: &Expr) -> &Expr {
        match &expr.kind {
            ExprKind::Binary { right, .. } => right,
            _ => panic!("expected binary"),
        }
    }

    #[test]
    fn test_comparison_null_takes_other_side() {
        let (out, changed) = fold(
            Expr::binary(col("age", DataType::Int64), BinaryOp::Eq, null()).typed(DataType::Bool),
        );
        assert_eq!(changed, 1);
        assert_eq!(right(&out).ty, Some(DataType::Int64));
        assert_eq!(out.ty, Some(DataType::Bool));
    }

    #[test]
    fn test_arithmetic_result_type_recomputed() {
        let (out, _) = fold(
            Expr::add(null(), col("price", DataType::Float64)).typed(DataType::Float64),
        );
        match &out.kind {
            ExprKind::Binary { left, .. } => assert_eq!(left.ty, Some(DataType::Float64)),
            _ => panic!("expected binary"),
        }
        assert_eq!(out.ty, Some(DataType::Float64));
    }

    #[test]
    fn test_case_branches_take_case_type() {
        let case = Expr::case(
            vec![(col("flag", DataType::Bool), col("name", DataType::String))],
            Some(null()),
        )
        .typed(DataType::String);
        let (out, changed) = fold(case);
        assert_eq!(changed, 1);
        match &out.kind {
            ExprKind::Case { otherwise, .. } => {
                assert_eq!(otherwise.as_ref().unwrap().ty, Some(DataType::String));
            }
            _ => panic!("expected case"),
        }
    }

    #[test]
    fn test_in_list_and_coalesce() {
        let (_, changed) = fold(
            Expr::in_list(col("age", DataType::Int64), vec![Expr::int(1).typed(DataType::Int64), null()], false)
                .typed(DataType::Bool),
        );
        assert_eq!(changed, 1);
        let (_, changed) = fold(
            Expr::call("COALESCE", vec![null(), col("name", DataType::String)])
                .typed(DataType::String),
        );
        assert_eq!(changed, 1);
    }

    #[test]
    fn test_null_against_null_untouched() {
        let (out, changed) =
            fold(Expr::binary(null(), BinaryOp::Eq, null()).typed(DataType::Bool));
        assert_eq!(changed, 0);
        assert_eq!(right(&out).ty, Some(DataType::Null));
    }

    #[test]
    fn test_rewriter_reports_no_change() {
        let statement = Statement::Query(Query::select(SelectQuery::new(
            vec![Field::new(col("a", DataType::Int64))],
            FromClause::source(Source::schema("s", "t", vec![], "t")),
        )));
        let result = NullRetype.rewrite(&statement, &ScopeTree::new()).unwrap();
        assert!(!result.was_transformed());
    }
}
