//! Contract tests for common-subexpression analysis.
//!
//! These tests verify the caching contracts:
//! - An expression computed twice in safe contexts gets exactly one slot
//! - Slots are numbered post-order, first seen, per SELECT and phase
//! - Occurrences in separate execution scopes are never cached
//! - Non-deterministic calls are never cached

use quarry::ast::{BinaryOp, Expr, Field, FromClause, OrderItem, Query, SelectQuery, Source};
use quarry::cse::Phase;
use quarry::CompiledQuery;

use super::{body_select, compiler, fields, from_employees, statement};

fn len_plus_one() -> Expr {
    Expr::add(Expr::call("LEN", vec![Expr::ident("name")]), Expr::int(1))
}

fn compile(select: SelectQuery) -> CompiledQuery {
    compiler().compile(&statement(select)).unwrap()
}

#[test]
fn test_where_and_field_share_slots() {
    // Contract: SELECT LEN(name)+1 ... WHERE LEN(name)+1 > 3 caches the sum once
    let compiled = compile(
        from_employees(vec![len_plus_one()])
            .with_where(Expr::binary(len_plus_one(), BinaryOp::Gt, Expr::int(3))),
    );
    let select = body_select(compiled.rewritten());
    let scope = select.scope.unwrap();
    let slots = compiled.cache_slots();

    let sum = select.fields[0].expr.key();
    assert_eq!(slots.slot(scope, Phase::Row, &sum), Some(2));
    assert_eq!(slots.slot_count(scope, Phase::Row), 3);
    assert_eq!(slots.slot_count(scope, Phase::Group), 0);
    assert_eq!(compiled.plan().root.to_string().matches("cache[2]").count(), 2);
}

#[test]
fn test_single_occurrence_not_cached() {
    let compiled = compile(from_employees(vec![len_plus_one()]));
    assert!(compiled.cache_slots().is_empty());
    assert!(compiled.explain().contains("Cache slots: 0"));
}

#[test]
fn test_order_by_occurrences_never_cached() {
    // Contract: five ORDER BY occurrences of the same expression get no slot
    let mut select = from_employees(vec![Expr::ident("name")]);
    for _ in 0..5 {
        select = select.with_order_by(OrderItem::asc(len_plus_one()));
    }
    assert!(compile(select).cache_slots().is_empty());
}

#[test]
fn test_non_deterministic_calls_never_cached() {
    let newid = || Expr::call("UPPER", vec![Expr::call("NEWID", vec![])]);
    let now = || Expr::call("YEAR", vec![Expr::call("NOW", vec![])]);
    let compiled = compile(from_employees(vec![newid(), newid(), now(), now()]));
    assert!(compiled.cache_slots().is_empty());
}

#[test]
fn test_conditional_first_sighting_not_cached() {
    let guarded = Expr::case(
        vec![(
            Expr::binary(Expr::ident("salary"), BinaryOp::Gt, Expr::int(60)),
            len_plus_one(),
        )],
        None,
    );
    let compiled = compile(from_employees(vec![guarded, len_plus_one()]));
    let select = body_select(compiled.rewritten());
    let key = select.fields[1].expr.key();
    assert_eq!(
        compiled
            .cache_slots()
            .slot(select.scope.unwrap(), Phase::Row, &key),
        None
    );
}

#[test]
fn test_grouped_query_uses_group_phase() {
    let total = || Expr::call("SUM", vec![Expr::ident("salary")]);
    let compiled = compile(
        from_employees(vec![
            Expr::ident("dept"),
            total(),
            Expr::binary(total(), BinaryOp::Mul, Expr::int(2)),
        ])
        .with_group_by(vec![Expr::ident("dept")]),
    );
    let select = body_select(compiled.rewritten());
    let scope = select.scope.unwrap();
    let slots = compiled.cache_slots();

    assert_eq!(slots.slot_count(scope, Phase::Group), 1);
    assert_eq!(
        slots.slot(scope, Phase::Group, &select.fields[1].expr.key()),
        Some(0)
    );
    assert_eq!(slots.slot_count(scope, Phase::Row), 0);
}

#[test]
fn test_nested_select_numbered_separately() {
    let inner = Query::select(SelectQuery::new(
        vec![
            Field::aliased(Expr::call("LEN", vec![Expr::ident("name")]), "a"),
            Field::aliased(Expr::call("LEN", vec![Expr::ident("name")]), "b"),
        ],
        FromClause::source(super::employees("e")),
    ));
    let compiled = compile(SelectQuery::new(
        fields(vec![Expr::path("q.a"), Expr::path("q.b")]),
        FromClause::source(Source::subquery(inner, "q")),
    ));
    let outer = body_select(compiled.rewritten()).scope.unwrap();
    let children = compiled.scopes().scope(outer).unwrap().children().to_vec();
    assert_eq!(children.len(), 1);

    let slots = compiled.cache_slots();
    assert_eq!(slots.slot_count(outer, Phase::Row), 0);
    assert_eq!(slots.slot_count(children[0], Phase::Row), 2);
}
