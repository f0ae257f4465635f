//! Contract tests for the reference runtime.
//!
//! These tests verify the execution contracts over the fixture catalog:
//! - Grouping yields groups in first-seen order
//! - Outer joins pad the missing side with nulls
//! - Comparisons and aggregates follow three-valued null semantics
//! - ORDER BY, skip and take apply after projection

use quarry::ast::{
    BinaryOp, CteDef, Expr, FromClause, JoinKind, OrderItem, Query, SelectQuery, Source, Statement,
};
use quarry::error::QuarryError;
use quarry::{CompilerConfig, QueryResult, Value};

use super::{compiler, departments, employees, fields, from_employees, statement};

fn run(statement: &Statement) -> QueryResult {
    compiler().execute(statement).unwrap()
}

fn rows(result: &QueryResult) -> Vec<Vec<Value>> {
    (0..result.row_count())
        .map(|i| result.get_row(i).unwrap().values().to_vec())
        .collect()
}

fn s(value: &str) -> Value {
    Value::String(value.to_string())
}

fn joined(kind: JoinKind) -> Statement {
    statement(SelectQuery::new(
        fields(vec![Expr::path("e.name"), Expr::path("d.floor")]),
        FromClause::source(employees("e")).join(
            departments("d"),
            kind,
            Some(Expr::eq(Expr::path("e.dept"), Expr::path("d.dept"))),
        ),
    ))
}

#[test]
fn test_sum_by_dept_in_first_seen_order() {
    let result = run(&statement(
        from_employees(vec![
            Expr::ident("dept"),
            Expr::call("SUM", vec![Expr::ident("salary")]),
        ])
        .with_group_by(vec![Expr::ident("dept")]),
    ));
    assert_eq!(
        rows(&result),
        vec![
            vec![s("eng"), Value::Int64(180)],
            vec![s("ops"), Value::Int64(120)],
            vec![s("hr"), Value::Int64(60)],
        ]
    );
}

#[test]
fn test_inner_join_drops_unmatched() {
    let result = run(&joined(JoinKind::Inner));
    assert_eq!(result.row_count(), 4);
    assert_eq!(rows(&result)[2], vec![s("cid"), Value::Int64(1)]);
}

#[test]
fn test_left_outer_join_pads_right() {
    let result = run(&joined(JoinKind::LeftOuter));
    assert_eq!(result.row_count(), 5);
    assert_eq!(rows(&result)[4], vec![s("eve"), Value::Null]);
}

#[test]
fn test_right_outer_join_pads_left() {
    let result = run(&joined(JoinKind::RightOuter));
    assert_eq!(result.row_count(), 5);
    assert_eq!(rows(&result)[4], vec![Value::Null, Value::Int64(2)]);
}

#[test]
fn test_order_skip_take() {
    let result = run(&statement(
        from_employees(vec![Expr::ident("name")])
            .with_order_by(OrderItem::desc(Expr::ident("salary")))
            .with_skip(1)
            .with_take(2),
    ));
    assert_eq!(rows(&result), vec![vec![s("bob")], vec![s("dee")]]);
}

#[test]
fn test_nulls_sort_first_ascending() {
    let result = run(&statement(
        from_employees(vec![Expr::ident("name")])
            .with_order_by(OrderItem::asc(Expr::ident("bonus"))),
    ));
    let names: Vec<Value> = rows(&result).into_iter().map(|r| r[0].clone()).collect();
    assert_eq!(names, vec![s("bob"), s("eve"), s("cid"), s("ann"), s("dee")]);
}

#[test]
fn test_null_comparisons_filter_rows() {
    let result = run(&statement(
        from_employees(vec![Expr::ident("name")]).with_where(Expr::binary(
            Expr::ident("bonus"),
            BinaryOp::Gt,
            Expr::float(1.0),
        )),
    ));
    assert_eq!(rows(&result), vec![vec![s("ann")], vec![s("dee")]]);
}

#[test]
fn test_having_filters_groups() {
    let total = || Expr::call("SUM", vec![Expr::ident("salary")]);
    let result = run(&statement(
        from_employees(vec![Expr::ident("dept"), total()])
            .with_group_by(vec![Expr::ident("dept")])
            .with_having(Expr::binary(total(), BinaryOp::Gt, Expr::int(100)))
            .with_order_by(OrderItem::asc(total())),
    ));
    assert_eq!(
        rows(&result),
        vec![
            vec![s("ops"), Value::Int64(120)],
            vec![s("eng"), Value::Int64(180)],
        ]
    );
}

#[test]
fn test_avg_skips_nulls() {
    let result = run(&statement(
        from_employees(vec![
            Expr::ident("dept"),
            Expr::call("AVG", vec![Expr::ident("bonus")]),
            Expr::call("COUNT", vec![Expr::ident("bonus")]),
            Expr::count_star(),
        ])
        .with_group_by(vec![Expr::ident("dept")]),
    ));
    assert_eq!(
        rows(&result),
        vec![
            vec![s("eng"), Value::Float64(1.5), Value::Int64(1), Value::Int64(2)],
            vec![s("ops"), Value::Float64(1.25), Value::Int64(2), Value::Int64(2)],
            vec![s("hr"), Value::Null, Value::Int64(0), Value::Int64(1)],
        ]
    );
}

#[test]
fn test_count_over_no_rows_yields_one_group() {
    let result = run(&statement(
        from_employees(vec![Expr::count_star()]).with_where(Expr::binary(
            Expr::ident("salary"),
            BinaryOp::Gt,
            Expr::int(1000),
        )),
    ));
    assert_eq!(rows(&result), vec![vec![Value::Int64(0)]]);
}

#[test]
fn test_distinct_with_and_without_desugaring() {
    let query = statement(from_employees(vec![Expr::ident("dept")]).with_distinct());
    let desugared = run(&query);
    let direct = compiler()
        .with_config(CompilerConfig::default().with_distinct_desugaring(false))
        .execute(&query)
        .unwrap();
    let expected = vec![vec![s("eng")], vec![s("ops")], vec![s("hr")]];
    assert_eq!(rows(&desugared), expected);
    assert_eq!(rows(&direct), expected);
}

#[test]
fn test_cte_materialized_once_and_scanned() {
    let cte = Query::select(
        from_employees(vec![Expr::ident("name"), Expr::ident("salary")]).with_where(
            Expr::binary(Expr::ident("salary"), BinaryOp::Gte, Expr::int(70)),
        ),
    );
    let body = Query::select(SelectQuery::new(
        fields(vec![Expr::path("c.name")]),
        FromClause::source(Source::reference("high", "c")),
    ));
    let result = run(&Statement::With {
        ctes: vec![CteDef::new("high", cte)],
        body,
    });
    assert_eq!(
        rows(&result),
        vec![vec![s("ann")], vec![s("bob")], vec![s("dee")]]
    );
}

#[test]
fn test_except_keyed_on_dept() {
    let depts = Query::select(SelectQuery::new(
        fields(vec![Expr::ident("dept")]),
        FromClause::source(departments("d")),
    ));
    let staffed = Query::select(from_employees(vec![Expr::ident("dept")]));
    let result = run(&Statement::Query(Query::except(
        depts,
        staffed,
        vec!["dept".into()],
    )));
    assert_eq!(rows(&result), vec![vec![s("sales")]]);
}

#[test]
fn test_system_range() {
    let result = run(&statement(SelectQuery::new(
        fields(vec![Expr::ident("value")]),
        FromClause::source(Source::schema(
            "system",
            "range",
            vec![Expr::int(1), Expr::int(4)],
            "r",
        )),
    )));
    assert_eq!(result.columns, vec!["value"]);
    assert_eq!(
        rows(&result),
        vec![vec![Value::Int64(1)], vec![Value::Int64(2)], vec![Value::Int64(3)]]
    );
}

#[test]
fn test_like_and_string_functions() {
    let result = run(&statement(
        from_employees(vec![Expr::call("UPPER", vec![Expr::ident("name")])]).with_where(
            Expr::binary(Expr::ident("name"), BinaryOp::Like, Expr::string("%e%")),
        ),
    ));
    assert_eq!(rows(&result), vec![vec![s("DEE")], vec![s("EVE")]]);
}

#[test]
fn test_division_by_zero_fails() {
    let err = compiler()
        .execute(&statement(from_employees(vec![Expr::binary(
            Expr::ident("salary"),
            BinaryOp::Div,
            Expr::int(0),
        )])))
        .unwrap_err();
    assert!(matches!(err, QuarryError::DivisionByZero));
    assert!(!err.is_defect());
}
