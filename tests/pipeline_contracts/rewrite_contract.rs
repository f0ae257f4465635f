//! Contract tests for the structural rewrites.
//!
//! These tests verify the rewrite contracts:
//! - Rewrites run in a fixed order and report only the ones that changed the tree
//! - The bound statement is never modified by a rewrite
//! - DISTINCT and the equivalent GROUP BY produce the same tree shape
//! - Join columns move onto the composite alias before grouping sees them

use quarry::ast::{BinaryOp, Expr, ExprKind, FromClause, OrderItem, SelectQuery};
use quarry::error::{QuarryError, StructuralError};
use quarry::rewrite::RewritePipeline;
use quarry::types::DataType;
use quarry::CompilerConfig;

use super::{
    body_select, compiler, departments, employees, field_texts, fields, from_employees, statement,
};

fn joined(exprs: Vec<Expr>) -> SelectQuery {
    SelectQuery::new(
        fields(exprs),
        FromClause::source(employees("e")).inner_join(
            departments("d"),
            Expr::eq(Expr::path("e.dept"), Expr::path("d.dept")),
        ),
    )
}

#[test]
fn test_standard_pipeline_order() {
    let names = RewritePipeline::standard(&CompilerConfig::default()).rule_names();
    assert_eq!(
        names,
        vec![
            "distinct_to_group_by",
            "null_retype",
            "transition_tables",
            "aggregate_rewrite"
        ]
    );

    let config = CompilerConfig::default()
        .with_distinct_desugaring(false)
        .with_null_retyping(false);
    assert_eq!(
        RewritePipeline::standard(&config).rule_names(),
        vec!["transition_tables", "aggregate_rewrite"]
    );
}

#[test]
fn test_plain_select_is_left_alone() {
    let compiled = compiler()
        .compile(&statement(from_employees(vec![Expr::ident("name")])))
        .unwrap();
    assert!(compiled.applied_rewrites().is_empty());
    assert_eq!(compiled.bound(), compiled.rewritten());
}

#[test]
fn test_distinct_matches_explicit_group_by() {
    // Contract: DISTINCT a, b rewrites to the same tree as GROUP BY a, b
    let distinct = compiler()
        .compile(&statement(
            from_employees(vec![Expr::ident("dept"), Expr::ident("salary")]).with_distinct(),
        ))
        .unwrap();
    let grouped = compiler()
        .compile(&statement(
            from_employees(vec![Expr::ident("dept"), Expr::ident("salary")])
                .with_group_by(vec![Expr::ident("dept"), Expr::ident("salary")]),
        ))
        .unwrap();

    assert_eq!(
        distinct.applied_rewrites(),
        ["distinct_to_group_by", "aggregate_rewrite"]
    );
    assert_eq!(distinct.rewritten(), grouped.rewritten());
    assert!(body_select(distinct.bound()).distinct);
    assert!(!body_select(distinct.rewritten()).distinct);
}

#[test]
fn test_null_retyped_from_comparison() {
    let compiled = compiler()
        .compile(&statement(
            from_employees(vec![Expr::ident("name")])
                .with_where(Expr::eq(Expr::ident("bonus"), Expr::null())),
        ))
        .unwrap();
    assert_eq!(compiled.applied_rewrites(), ["null_retype"]);

    let null_type = |select: &SelectQuery| match &select.where_clause.as_ref().unwrap().kind {
        ExprKind::Binary { right, .. } => right.data_type(),
        other => panic!("expected comparison, got {other:?}"),
    };
    assert_eq!(null_type(body_select(compiled.bound())), DataType::Null);
    assert_eq!(null_type(body_select(compiled.rewritten())), DataType::Float64);
}

#[test]
fn test_join_columns_use_transition_table() {
    // Contract: every access to a joined source is rewritten onto the composite alias
    let compiled = compiler()
        .compile(&statement(joined(vec![
            Expr::path("e.name"),
            Expr::path("d.floor"),
        ])))
        .unwrap();
    assert_eq!(compiled.applied_rewrites(), ["transition_tables"]);
    assert_eq!(field_texts(compiled.bound()), vec!["e.name", "d.floor"]);
    assert_eq!(
        field_texts(compiled.rewritten()),
        vec!["ed.[e.name]", "ed.[d.floor]"]
    );

    let rewritten = body_select(compiled.rewritten());
    assert!(rewritten
        .from
        .to_string()
        .contains("ON (ed.[e.dept] = ed.[d.dept])"));
    match &rewritten.fields[1].expr.kind {
        ExprKind::Column { alias, ordinal, .. } => {
            assert_eq!(alias, "ed");
            assert_eq!(*ordinal, Some(5));
        }
        other => panic!("expected column, got {other:?}"),
    }
}

#[test]
fn test_grouping_sees_transition_columns() {
    let compiled = compiler()
        .compile(&statement(
            joined(vec![
                Expr::path("d.floor"),
                Expr::call("SUM", vec![Expr::path("e.salary")]),
            ])
            .with_group_by(vec![Expr::path("d.floor")]),
        ))
        .unwrap();
    assert_eq!(
        compiled.applied_rewrites(),
        ["transition_tables", "aggregate_rewrite"]
    );

    let rewritten = body_select(compiled.rewritten());
    assert_eq!(field_texts(compiled.rewritten()), vec!["group[0]", "group[1]"]);
    let group_by = rewritten.group_by.as_ref().unwrap();
    assert_eq!(group_by.keys[0].to_string(), "ed.[d.floor]");
    assert_eq!(
        group_by.aggregates[0].arg.as_ref().unwrap().to_string(),
        "ed.[e.salary]"
    );
}

#[test]
fn test_aggregates_shared_across_clauses() {
    // Contract: one aggregate used in fields, HAVING and ORDER BY becomes one group column
    let total = || Expr::call("SUM", vec![Expr::ident("salary")]);
    let compiled = compiler()
        .compile(&statement(
            from_employees(vec![Expr::ident("dept"), total()])
                .with_group_by(vec![Expr::ident("dept")])
                .with_having(Expr::binary(total(), BinaryOp::Gt, Expr::int(100)))
                .with_order_by(OrderItem::desc(total())),
        ))
        .unwrap();
    let rewritten = body_select(compiled.rewritten());
    let group_by = rewritten.group_by.as_ref().unwrap();
    assert_eq!(group_by.aggregates.len(), 1);
    assert_eq!(group_by.aggregates[0].function, "SUM");
    assert_eq!(group_by.having.as_ref().unwrap().to_string(), "(group[1] > 100)");
    assert_eq!(rewritten.order_by[0].expr.to_string(), "group[1]");
}

#[test]
fn test_ungrouped_field_rejected() {
    let err = compiler()
        .compile(&statement(
            from_employees(vec![Expr::ident("name")]).with_group_by(vec![Expr::ident("dept")]),
        ))
        .unwrap_err();
    assert!(matches!(
        err,
        QuarryError::Structural(StructuralError::UngroupedColumn(ref column)) if column == "e.name"
    ));
    assert!(!err.is_defect());
}
