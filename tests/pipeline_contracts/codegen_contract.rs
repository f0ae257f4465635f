//! Contract tests for code generation.
//!
//! These tests verify the code generation contracts:
//! - Column accesses become ordinal slots into the merged row
//! - Expressions with a cache slot are wrapped exactly once
//! - Set operation keys become column positions of the first operand
//! - A statement that disagrees with its scope tree is a compiler defect

use quarry::ast::{
    CteDef, Expr, FromClause, JoinKind, OrderItem, Query, SelectQuery, Source, Statement,
};
use quarry::binder::ScopeTree;
use quarry::codegen::{CodeGenerator, CompiledExpr, PlanNode, SelectPlan, SourcePlan};
use quarry::cse::CacheSlots;
use quarry::error::{QuarryError, StructuralError};
use quarry::functions::FunctionRegistry;
use quarry::types::DataType;
use quarry::CompiledQuery;

use super::{compiler, departments, employees, fields, from_employees, statement};

fn compile(statement: &Statement) -> CompiledQuery {
    compiler().compile(statement).unwrap()
}

fn root_select(compiled: &CompiledQuery) -> &SelectPlan {
    match &compiled.plan().root {
        PlanNode::Select(select) => select,
        PlanNode::SetChain { .. } => panic!("expected a SELECT plan"),
    }
}

fn joined() -> SelectQuery {
    SelectQuery::new(
        fields(vec![Expr::path("e.name"), Expr::path("d.floor")]),
        FromClause::source(employees("e")).join(
            departments("d"),
            JoinKind::LeftOuter,
            Some(Expr::eq(Expr::path("e.dept"), Expr::path("d.dept"))),
        ),
    )
}

#[test]
fn test_join_columns_address_merged_row() {
    // Contract: d.floor is ordinal 4 + 1 of the merged e·d row
    let compiled = compile(&statement(joined()));
    let select = root_select(&compiled);

    let aliases: Vec<&str> = select
        .sources
        .iter()
        .map(|s| match s {
            SourcePlan::Table { alias, .. } => alias.as_str(),
            other => panic!("expected table source, got {other}"),
        })
        .collect();
    assert_eq!(aliases, vec!["e", "d"]);
    assert_eq!(select.joins.len(), 1);
    assert_eq!(select.joins[0].kind, JoinKind::LeftOuter);
    assert!(select.joins[0].condition.is_some());

    match &select.projection[1] {
        CompiledExpr::Slot { ordinal, name } => {
            assert_eq!(*ordinal, 5);
            assert_eq!(name, "ed.d.floor");
        }
        other => panic!("expected slot, got {other}"),
    }
    assert!(compiled.explain().contains("ed.d.floor#5"));
}

#[test]
fn test_output_columns_carry_names_and_types() {
    let compiled = compile(&statement(from_employees(vec![
        Expr::ident("name"),
        Expr::add(Expr::ident("salary"), Expr::ident("bonus")),
    ])));
    let columns = &compiled.plan().columns;
    assert_eq!(columns[0].name, "name");
    assert_eq!(columns[0].data_type, DataType::String);
    assert_eq!(columns[1].data_type, DataType::Float64);
    assert_eq!(compiled.output().len(), 2);
}

#[test]
fn test_cached_expressions_wrapped() {
    let len = || Expr::call("LEN", vec![Expr::ident("name")]);
    let compiled = compile(&statement(
        from_employees(vec![len(), Expr::add(len(), Expr::int(1))])
            .with_order_by(OrderItem::asc(Expr::ident("salary"))),
    ));
    let select = root_select(&compiled);
    assert_eq!(select.row_cache_slots, 2);
    assert!(matches!(select.projection[0], CompiledExpr::Cached { slot: 1, .. }));
    match &select.projection[1] {
        CompiledExpr::Binary { left, .. } => {
            assert!(matches!(**left, CompiledExpr::Cached { slot: 1, .. }));
        }
        other => panic!("expected binary, got {other}"),
    }
    assert!(!select.order_by[0].expr.to_string().contains("cache"));
}

#[test]
fn test_grouped_plan_reads_group_rows() {
    let compiled = compile(&statement(
        from_employees(vec![
            Expr::ident("dept"),
            Expr::call("COUNT", vec![Expr::ident("bonus")]),
        ])
        .with_group_by(vec![Expr::ident("dept")]),
    ));
    let select = root_select(&compiled);
    let grouping = select.grouping.as_ref().unwrap();
    assert_eq!(grouping.keys.len(), 1);
    assert_eq!(grouping.aggregates.len(), 1);
    assert_eq!(grouping.aggregates[0].data_type, DataType::Int64);
    assert!(matches!(
        select.projection[1],
        CompiledExpr::Slot { ordinal: 1, .. }
    ));
}

#[test]
fn test_set_chain_keys_become_positions() {
    // Contract: (A UNION B) UNION C keyed on dept flattens to one chain of two steps
    let operand = || Query::select(from_employees(vec![Expr::ident("name"), Expr::ident("dept")]));
    let query = Query::union(
        Query::union(operand(), operand(), vec!["dept".into()]),
        operand(),
        vec![],
    );
    let compiled = compile(&Statement::Query(query));
    match &compiled.plan().root {
        PlanNode::SetChain { steps, .. } => {
            assert_eq!(steps.len(), 2);
            assert_eq!(steps[0].key_positions, Some(vec![1]));
            assert_eq!(steps[1].key_positions, None);
        }
        PlanNode::Select(_) => panic!("expected a set chain"),
    }
    assert_eq!(compiled.plan().column_names(), vec!["name", "dept"]);
}

#[test]
fn test_cte_generated_before_body() {
    let cte = Query::select(from_employees(vec![Expr::ident("dept")]));
    let body = Query::select(SelectQuery::new(
        fields(vec![Expr::path("c.dept")]),
        FromClause::source(Source::reference("Depts", "c")),
    ));
    let compiled = compile(&Statement::With {
        ctes: vec![CteDef::new("Depts", cte)],
        body,
    });
    assert_eq!(compiled.plan().ctes.len(), 1);
    assert_eq!(compiled.plan().ctes[0].0, "depts");
    assert!(matches!(
        &root_select(&compiled).sources[0],
        SourcePlan::Cte { name, width: 1, .. } if name == "depts"
    ));
}

#[test]
fn test_unrewritten_join_column_is_structural() {
    // Contract: a join column still on its source alias cannot be addressed
    let compiled = compile(&statement(joined()));
    let err = CodeGenerator::new(
        compiled.scopes(),
        &CacheSlots::new(),
        FunctionRegistry::builtin(),
    )
    .generate(compiled.bound())
    .unwrap_err();
    assert!(matches!(
        err,
        QuarryError::Structural(StructuralError::UnresolvedJoinAlias { ref alias, .. }) if alias == "e"
    ));
}

#[test]
fn test_foreign_scope_tree_is_defect() {
    let compiled = compile(&statement(from_employees(vec![Expr::ident("name")])));
    let err = CodeGenerator::new(
        &ScopeTree::new(),
        &CacheSlots::new(),
        FunctionRegistry::builtin(),
    )
    .generate(compiled.rewritten())
    .unwrap_err();
    assert!(err.is_defect());
    assert!(matches!(err, QuarryError::InvariantViolation { .. }));
}
