//! Contract tests for the binder.
//!
//! These tests verify the binding contracts:
//! - Binding is deterministic for structurally identical trees
//! - Join merges are associative with concatenated ordinals
//! - Unknown schemas, methods and columns fail fast with the offending name
//! - Types are inferred bottom-up with closest-common-ancestor widening

use quarry::ast::{BinaryOp, Expr, ExprKind, FromClause, JoinKind, Query, SelectQuery, Source};
use quarry::binder::{Binder, BoundStatement, ScopeId, TableSymbol};
use quarry::catalog::ColumnDef;
use quarry::error::{BindError, QuarryError, StructuralError};
use quarry::functions::FunctionRegistry;
use quarry::types::DataType;

use super::{body_select, catalog, departments, employees, fields, from_employees, statement};

fn bind(select: SelectQuery) -> quarry::Result<BoundStatement> {
    let catalog = catalog();
    Binder::new(&catalog, FunctionRegistry::builtin()).bind(&statement(select))
}

fn joined() -> SelectQuery {
    SelectQuery::new(
        fields(vec![Expr::path("e.name"), Expr::path("d.floor")]),
        FromClause::source(employees("e")).inner_join(
            departments("d"),
            Expr::eq(Expr::path("e.dept"), Expr::path("d.dept")),
        ),
    )
}

#[test]
fn test_binding_is_idempotent() {
    // Contract: two fresh, identical trees bind to identical symbol tables
    let first = bind(joined()).unwrap();
    let second = bind(joined()).unwrap();

    assert_eq!(first.statement, second.statement);
    assert_eq!(first.output, second.output);
    assert_eq!(first.scopes.len(), second.scopes.len());
    for (a, b) in first.scopes.iter().zip(second.scopes.iter()) {
        let a_entries: Vec<_> = a
            .entries()
            .map(|(alias, e)| (alias.to_string(), e.symbol().columns().to_vec()))
            .collect();
        let b_entries: Vec<_> = b
            .entries()
            .map(|(alias, e)| (alias.to_string(), e.symbol().columns().to_vec()))
            .collect();
        assert_eq!(a_entries, b_entries);
    }
}

#[test]
fn test_join_merge_is_associative() {
    // Contract: (A·B)·C has the same ordinal-ordered columns as A·(B·C)
    let table = |alias: &str, names: &[&str]| {
        let columns: Vec<ColumnDef> = names
            .iter()
            .enumerate()
            .map(|(i, n)| ColumnDef::new(*n, i, DataType::Int64))
            .collect();
        TableSymbol::from_columns(alias, &columns)
    };
    let a = table("a", &["x", "y"]);
    let b = table("b", &["x"]);
    let c = table("c", &["z", "x", "w"]);

    let left = a.merge(&b).merge(&c);
    let right = a.merge(&b.merge(&c));
    assert_eq!(left, right);
    assert_eq!(
        left.column_names(),
        vec!["a.x", "a.y", "b.x", "c.z", "c.x", "c.w"]
    );
    assert_eq!(left.column("c.x").unwrap().ordinal, 4);
}

#[test]
fn test_three_way_join_composite_aliases() {
    // Contract: A,B,C yield "AB" then "ABC", and the row alias is the last merge
    let select = SelectQuery::new(
        fields(vec![Expr::path("x.name")]),
        FromClause::source(employees("x"))
            .join(departments("y"), JoinKind::Cross, None)
            .join(employees("z"), JoinKind::Cross, None),
    );
    let bound = bind(select).unwrap();
    let scope = bound
        .scopes
        .scope(body_select(&bound.statement).scope.unwrap())
        .unwrap();
    assert_eq!(scope.row_alias(), Some("xyz"));
    assert_eq!(scope.symbol("xy").unwrap().len(), 6);
    assert_eq!(scope.symbol("xyz").unwrap().len(), 10);
    assert_eq!(scope.symbol("xyz").unwrap().column("z.name").unwrap().ordinal, 6);
}

#[test]
fn test_unknown_schema_rejected() {
    // Contract: an unresolvable schema fails fast, naming schema and alias
    let select = SelectQuery::new(
        fields(vec![Expr::ident("name")]),
        FromClause::source(Source::schema("payroll", "employees", vec![], "p")),
    );
    match bind(select).unwrap_err() {
        QuarryError::Binding(BindError::UnknownSchema { schema, alias }) => {
            assert_eq!(schema, "payroll");
            assert_eq!(alias, "p");
        }
        other => panic!("expected unknown schema, got {other}"),
    }
}

#[test]
fn test_unknown_column_rejected() {
    // Contract: an alias-qualified column that does not exist names both
    let err = bind(from_employees(vec![Expr::path("e.age")])).unwrap_err();
    assert!(matches!(
        err,
        QuarryError::Binding(BindError::UnknownColumn { ref alias, ref column })
            if alias == "e" && column == "age"
    ));
    assert!(!err.is_defect());
}

#[test]
fn test_unknown_method_rejected() {
    let select = SelectQuery::new(
        fields(vec![Expr::ident("value")]),
        FromClause::source(Source::schema("system", "range", vec![Expr::int(1)], "r")),
    );
    assert!(matches!(
        bind(select).unwrap_err(),
        QuarryError::Binding(BindError::UnknownMethod { .. })
    ));
}

#[test]
fn test_bottom_up_type_inference() {
    // Contract: Int64 + Float64 widens to Float64; comparisons are Bool
    let bound = bind(from_employees(vec![
        Expr::add(Expr::ident("salary"), Expr::ident("bonus")),
        Expr::binary(Expr::ident("salary"), BinaryOp::Gt, Expr::int(10)),
        Expr::case(
            vec![(Expr::bool(true), Expr::ident("salary"))],
            Some(Expr::ident("bonus")),
        ),
    ]))
    .unwrap();
    let types: Vec<_> = body_select(&bound.statement)
        .fields
        .iter()
        .map(|f| f.expr.data_type())
        .collect();
    assert_eq!(
        types,
        vec![DataType::Float64, DataType::Bool, DataType::Float64]
    );
}

#[test]
fn test_type_mismatch_rejected() {
    let err = bind(from_employees(vec![Expr::binary(
        Expr::ident("name"),
        BinaryOp::Mul,
        Expr::ident("salary"),
    )]))
    .unwrap_err();
    assert!(matches!(
        err,
        QuarryError::Binding(BindError::TypeMismatch { .. })
    ));
}

#[test]
fn test_subquery_gets_child_scope() {
    // Contract: a nested query's scope is created inside the enclosing SELECT's scope
    let inner = Query::select(from_employees(vec![Expr::ident("dept")]));
    let select = SelectQuery::new(
        fields(vec![Expr::path("q.dept")]),
        FromClause::source(Source::subquery(inner, "q")),
    );
    let bound = bind(select).unwrap();
    let outer = body_select(&bound.statement).scope.unwrap();
    let children = bound.scopes.scope(outer).unwrap().children().to_vec();
    assert_eq!(children.len(), 1);
    assert_eq!(bound.scopes.scope(children[0]).unwrap().parent(), Some(outer));
    assert_eq!(
        bound.scopes.scope(ScopeId::ROOT).unwrap().children(),
        &[outer]
    );
    match &body_select(&bound.statement).fields[0].expr.kind {
        ExprKind::Column { alias, name, ordinal } => {
            assert_eq!((alias.as_str(), name.as_str(), *ordinal), ("q", "dept", Some(0)));
        }
        other => panic!("expected column, got {other:?}"),
    }
}

#[test]
fn test_distinct_without_fields_is_structural() {
    let err = bind(SelectQuery::new(vec![], FromClause::source(employees("e"))).with_distinct())
        .unwrap_err();
    assert!(matches!(
        err,
        QuarryError::Structural(StructuralError::EmptySelect)
    ));
}
