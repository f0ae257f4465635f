//! Statement binder.
//!
//! One deterministic left-to-right walk: every source is resolved against the
//! schema provider and registered in its scope, every expression is resolved
//! and typed, and each SELECT records the id of the scope created for it.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::ast::{
    CteDef, Expr, ExprKind, Field, GroupByClause, OrderItem, Query, SelectQuery, SetOperator,
    Source, SourceKind, Statement,
};
use crate::catalog::SchemaProvider;
use crate::error::{BindError, QuarryError, Result, StructuralError};
use crate::functions::FunctionRegistry;
use crate::types::DataType;
use crate::visit::{flatten_joins, flatten_set_chain, rebuild_joins, rebuild_set_chain, QueryPart};

use super::expression::{literal_value, ExprBinder};
use super::{ScopeId, ScopeKind, ScopeTree, SourceBinding, SymbolEntry, TableSymbol};

const PASS: &str = "binder";

/// Result of binding a statement.
#[derive(Debug, Clone)]
pub struct BoundStatement {
    /// Type-annotated, symbol-resolved statement.
    pub statement: Statement,
    /// Every scope created while binding, in creation order.
    pub scopes: ScopeTree,
    /// Output columns of the statement.
    pub output: Arc<TableSymbol>,
}

/// Resolves names and infers types for one statement.
pub struct Binder<'a> {
    provider: &'a dyn SchemaProvider,
    functions: &'a FunctionRegistry,
    scopes: ScopeTree,
    ctes: HashMap<String, Arc<TableSymbol>>,
}

impl<'a> Binder<'a> {
    /// Creates a binder.
    #[must_use]
    pub fn new(provider: &'a dyn SchemaProvider, functions: &'a FunctionRegistry) -> Self {
        Binder {
            provider,
            functions,
            scopes: ScopeTree::new(),
            ctes: HashMap::new(),
        }
    }

    /// Binds a statement.
    ///
    /// # Errors
    ///
    /// Fails on the first unresolvable schema, method, alias, column or
    /// function, on a type mismatch, or on a malformed clause.
    #[instrument(level = "trace", skip_all, name = "bind")]
    pub fn bind(mut self, statement: &Statement) -> Result<BoundStatement> {
        let (statement, output) = match statement {
            Statement::Query(query) => {
                let (query, output) = self.bind_query(query, ScopeId::ROOT, ScopeKind::Select)?;
                (Statement::Query(query), output)
            }
            Statement::With { ctes, body } => {
                let mut bound = Vec::with_capacity(ctes.len());
                for cte in ctes {
                    let key = cte.name.to_lowercase();
                    if self.ctes.contains_key(&key) {
                        return Err(BindError::DuplicateAlias(cte.name.clone()).into());
                    }
                    let (query, output) = self.bind_query(
                        &cte.query,
                        ScopeId::ROOT,
                        ScopeKind::Cte(cte.name.clone()),
                    )?;
                    self.ctes.insert(key, output);
                    bound.push(CteDef::new(cte.name.clone(), query));
                }
                let (body, output) = self.bind_query(body, ScopeId::ROOT, ScopeKind::Select)?;
                (Statement::With { ctes: bound, body }, output)
            }
        };
        debug!(scopes = self.scopes.len(), columns = output.len(), "bound statement");
        Ok(BoundStatement {
            statement,
            scopes: self.scopes,
            output,
        })
    }

    fn bind_query(
        &mut self,
        query: &Query,
        parent: ScopeId,
        kind: ScopeKind,
    ) -> Result<(Query, Arc<TableSymbol>)> {
        match query {
            Query::Select(select) => {
                let (select, output) = self.bind_select(select, parent, kind)?;
                Ok((Query::select(select), output))
            }
            Query::SetOperation(set) => {
                let chain = flatten_set_chain(set);
                let mut operands = Vec::with_capacity(chain.operands.len());
                let mut outputs = Vec::with_capacity(chain.operands.len());
                for (i, operand) in chain.operands.iter().enumerate() {
                    let (query, output) =
                        self.bind_query(operand, parent, ScopeKind::SetOperand(i))?;
                    operands.push(query);
                    outputs.push(output);
                }

                let first = outputs
                    .first()
                    .cloned()
                    .ok_or_else(|| QuarryError::underflow(PASS, "bind set operands", 1, 0))?;
                for (i, output) in outputs.iter().enumerate().skip(1) {
                    check_operand_columns(&first, output, i)?;
                }
                for (i, operator) in chain.operators.iter().enumerate() {
                    if operator.op == SetOperator::UnionAll {
                        continue;
                    }
                    for key in &operator.keys {
                        check_set_key(key, &first, &outputs[i + 1], i + 1)?;
                    }
                }

                let operators = chain
                    .operators
                    .iter()
                    .map(|o| (o.op, o.keys.clone()))
                    .collect();
                let query = rebuild_set_chain(PASS, operands, operators)?;
                Ok((query, first))
            }
        }
    }

    fn bind_select(
        &mut self,
        select: &SelectQuery,
        parent: ScopeId,
        kind: ScopeKind,
    ) -> Result<(SelectQuery, Arc<TableSymbol>)> {
        if select.fields.is_empty() {
            return Err(StructuralError::EmptySelect.into());
        }
        let scope = self.scopes.create_child(parent, kind)?;

        // FROM: sources in source order, each merge under its composite alias
        let chain = flatten_joins(&select.from);
        let mut sources = Vec::with_capacity(chain.steps.len() + 1);
        let mut steps = Vec::with_capacity(chain.steps.len());
        let (first, mut current) = self.bind_source(chain.first, scope)?;
        sources.push(first);
        for step in &chain.steps {
            let (source, symbol) = self.bind_source(step.source, scope)?;
            sources.push(source);
            current = Arc::new(current.merge(&symbol));
            self.scopes.register(
                scope,
                &step.composite_alias,
                SymbolEntry::Merged {
                    symbol: Arc::clone(&current),
                },
            )?;
            let on = match step.on {
                Some(on) => Some(self.expr_binder(scope)?.bind(on, QueryPart::Join)?),
                None => None,
            };
            steps.push((step.kind, on));
        }
        self.scopes.set_row_alias(scope, chain.row_alias())?;
        let from = rebuild_joins(PASS, sources, steps)?;

        let binder = self.expr_binder(scope)?;
        let where_clause = select
            .where_clause
            .as_ref()
            .map(|e| binder.bind(e, QueryPart::Where))
            .transpose()?;
        let group_by = match &select.group_by {
            Some(group_by) => Some(GroupByClause {
                keys: group_by
                    .keys
                    .iter()
                    .map(|k| binder.bind(k, QueryPart::GroupBy))
                    .collect::<Result<_>>()?,
                having: group_by
                    .having
                    .as_ref()
                    .map(|h| binder.bind(h, QueryPart::Having))
                    .transpose()?,
                aggregates: Vec::new(),
            }),
            None => None,
        };
        let mut fields = Vec::with_capacity(select.fields.len());
        for field in &select.fields {
            fields.push(Field {
                expr: binder.bind(&field.expr, QueryPart::Select)?,
                alias: Some(field.name()),
            });
        }
        let mut order_by = Vec::with_capacity(select.order_by.len());
        for item in &select.order_by {
            order_by.push(OrderItem {
                expr: bind_order_expr(&binder, &item.expr, &fields)?,
                ascending: item.ascending,
            });
        }

        let output = Arc::new(TableSymbol::from_fields(
            "",
            fields.iter().map(|f| (f.name(), f.expr.data_type())),
        ));
        let bound = SelectQuery {
            fields,
            distinct: select.distinct,
            from,
            where_clause,
            group_by,
            order_by,
            skip: select.skip,
            take: select.take,
            scope: Some(scope),
        };
        Ok((bound, output))
    }

    fn bind_source(&mut self, source: &Source, scope: ScopeId) -> Result<(Source, Arc<TableSymbol>)> {
        let alias = &source.alias;
        let (kind, symbol, binding) = match &source.kind {
            SourceKind::Schema {
                schema,
                method,
                args,
            } => {
                let mut values = Vec::with_capacity(args.len());
                let mut bound_args = Vec::with_capacity(args.len());
                for (position, arg) in args.iter().enumerate() {
                    let value = literal_value(arg).ok_or_else(|| {
                        StructuralError::NonLiteralSourceArgument {
                            alias: alias.clone(),
                            position,
                        }
                    })?;
                    let ty = value.data_type().unwrap_or(DataType::Null);
                    bound_args.push(Expr::literal(value.clone()).typed(ty));
                    values.push(value);
                }
                let handle =
                    self.provider
                        .get_schema(schema)
                        .ok_or_else(|| BindError::UnknownSchema {
                            schema: schema.clone(),
                            alias: alias.clone(),
                        })?;
                let columns = handle.get_table(method, &values).map_err(|e| match e {
                    QuarryError::SchemaError(reason) => BindError::UnknownMethod {
                        schema: schema.clone(),
                        method: method.clone(),
                        alias: alias.clone(),
                        reason,
                    }
                    .into(),
                    other => other,
                })?;
                (
                    SourceKind::Schema {
                        schema: schema.clone(),
                        method: method.clone(),
                        args: bound_args,
                    },
                    TableSymbol::from_columns(alias, &columns),
                    SourceBinding::Schema {
                        schema: handle,
                        method: method.clone(),
                        args: values,
                    },
                )
            }
            SourceKind::Reference { name } => {
                let symbol = self.ctes.get(&name.to_lowercase()).ok_or_else(|| {
                    BindError::UnknownCte {
                        name: name.clone(),
                        alias: alias.clone(),
                    }
                })?;
                (
                    SourceKind::Reference { name: name.clone() },
                    symbol.realias(alias),
                    SourceBinding::Cte(name.to_lowercase()),
                )
            }
            SourceKind::Subquery(query) => {
                let (query, output) =
                    self.bind_query(query, scope, ScopeKind::Subquery(alias.clone()))?;
                (
                    SourceKind::Subquery(Box::new(query)),
                    output.realias(alias),
                    SourceBinding::Subquery,
                )
            }
        };
        let symbol = Arc::new(symbol);
        self.scopes.register(
            scope,
            alias,
            SymbolEntry::Source {
                symbol: Arc::clone(&symbol),
                binding,
            },
        )?;
        Ok((
            Source {
                alias: alias.clone(),
                kind,
            },
            symbol,
        ))
    }

    fn expr_binder(&self, scope: ScopeId) -> Result<ExprBinder<'_>> {
        Ok(ExprBinder::new(self.scopes.scope(scope)?, self.functions))
    }
}

/// ORDER BY may name a selected field by its alias.
fn bind_order_expr(binder: &ExprBinder<'_>, expr: &Expr, fields: &[Field]) -> Result<Expr> {
    match binder.bind(expr, QueryPart::OrderBy) {
        Err(QuarryError::Binding(BindError::UnknownIdentifier(name))) => {
            match &expr.kind {
                ExprKind::Identifier(_) => fields
                    .iter()
                    .find(|f| f.alias.as_deref() == Some(name.as_str()))
                    .map(|f| f.expr.clone())
                    .ok_or_else(|| BindError::UnknownIdentifier(name).into()),
                _ => Err(BindError::UnknownIdentifier(name).into()),
            }
        }
        other => other,
    }
}

/// Operands of a set chain are matched by position: each one must select
/// as many columns as the first, with compatible types.
fn check_operand_columns(
    first: &TableSymbol,
    output: &TableSymbol,
    operand: usize,
) -> Result<()> {
    if output.len() != first.len() {
        return Err(StructuralError::SetOperandArity {
            operand,
            expected: first.len(),
            actual: output.len(),
        }
        .into());
    }
    let columns = first.columns().iter().zip(output.columns());
    for (position, (expected, actual)) in columns.enumerate() {
        let (e, a) = (&expected.data_type, &actual.data_type);
        let open = [e, a]
            .iter()
            .any(|t| matches!(t, DataType::Any | DataType::Null));
        if !open && e.common_ancestor(a) == DataType::Any {
            return Err(StructuralError::SetOperandType {
                operand,
                position,
                expected: e.to_string(),
                actual: a.to_string(),
            }
            .into());
        }
    }
    Ok(())
}

/// A key must name the same column position in both operands.
fn check_set_key(
    key: &str,
    first: &TableSymbol,
    output: &TableSymbol,
    operand: usize,
) -> Result<()> {
    let position = |symbol: &TableSymbol, operand: usize| {
        symbol
            .column(key)
            .map(|c| c.ordinal)
            .ok_or_else(|| StructuralError::UnknownSetKey {
                key: key.to_string(),
                operand,
            })
    };
    let expected = position(first, 0)?;
    let actual = position(output, operand)?;
    if expected != actual {
        return Err(StructuralError::SetKeyPosition {
            key: key.to_string(),
            operand,
            expected,
            actual,
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{FromClause, JoinKind};
    use crate::catalog::{Catalog, MemorySchema, SystemSchema};
    use crate::types::{RecordType, Value};

    fn catalog() -> Catalog {
        let address = DataType::record(RecordType::new(
            "Address",
            vec![("city".into(), DataType::String)],
        ));
        let mem = MemorySchema::new("mem")
            .with_table(
                "people",
                vec![
                    ("name", DataType::String),
                    ("age", DataType::Int64),
                    ("address", address),
                    ("tags", DataType::array(DataType::String)),
                ],
                vec![],
            )
            .unwrap()
            .with_table(
                "orders",
                vec![("name", DataType::String), ("total", DataType::Float64)],
                vec![],
            )
            .unwrap();
        Catalog::new()
            .with_schema(Arc::new(mem))
            .unwrap()
            .with_schema(Arc::new(SystemSchema::new()))
            .unwrap()
    }

    fn people(alias: &str) -> Source {
        Source::schema("mem", "people", vec![], alias)
    }

    fn bind(select: SelectQuery) -> Result<BoundStatement> {
        let catalog = catalog();
        Binder::new(&catalog, FunctionRegistry::builtin())
            .bind(&Statement::Query(Query::select(select)))
    }

    fn bound_select(bound: &BoundStatement) -> &SelectQuery {
        match bound.statement.body() {
            Query::Select(s) => s,
            Query::SetOperation(_) => panic!("expected select"),
        }
    }

    #[test]
    fn test_unqualified_identifier_resolves_to_column() {
        let bound = bind(SelectQuery::new(
            vec![Field::new(Expr::ident("age"))],
            FromClause::source(people("p")),
        ))
        .unwrap();
        let field = &bound_select(&bound).fields[0];
        assert_eq!(field.expr.to_string(), "p.age");
        assert_eq!(field.expr.ty, Some(DataType::Int64));
        assert_eq!(field.alias.as_deref(), Some("age"));
    }

    #[test]
    fn test_alias_member_resolves_to_column_then_hops() {
        let bound = bind(SelectQuery::new(
            vec![Field::new(Expr::path("p.address.city"))],
            FromClause::source(people("p")),
        ))
        .unwrap();
        let expr = &bound_select(&bound).fields[0].expr;
        assert_eq!(expr.to_string(), "p.address.city");
        assert_eq!(expr.ty, Some(DataType::String));
        match &expr.kind {
            ExprKind::Member { target, .. } => {
                assert!(matches!(target.kind, ExprKind::Column { ordinal: Some(2), .. }));
            }
            other => panic!("expected member, got {other:?}"),
        }
    }

    #[test]
    fn test_indexer_hop() {
        let bound = bind(SelectQuery::new(
            vec![Field::new(Expr::index(Expr::ident("tags"), Expr::int(0)))],
            FromClause::source(people("p")),
        ))
        .unwrap();
        assert_eq!(bound_select(&bound).fields[0].expr.ty, Some(DataType::String));
    }

    #[test]
    fn test_unknown_member_names_type() {
        let err = bind(SelectQuery::new(
            vec![Field::new(Expr::path("p.address.zip"))],
            FromClause::source(people("p")),
        ))
        .unwrap_err();
        assert!(matches!(
            err,
            QuarryError::Binding(BindError::UnknownMember { ref member, .. }) if member == "zip"
        ));
    }

    #[test]
    fn test_unknown_schema_names_alias() {
        let err = bind(SelectQuery::new(
            vec![Field::new(Expr::ident("x"))],
            FromClause::source(Source::schema("nope", "t", vec![], "n")),
        ))
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Bind error: Unknown schema 'nope' for alias 'n'"
        );
    }

    #[test]
    fn test_unknown_method_carries_reason() {
        let err = bind(SelectQuery::new(
            vec![Field::new(Expr::ident("x"))],
            FromClause::source(Source::schema("mem", "pets", vec![], "t")),
        ))
        .unwrap_err();
        assert!(matches!(
            err,
            QuarryError::Binding(BindError::UnknownMethod { ref alias, .. }) if alias == "t"
        ));
    }

    #[test]
    fn test_non_literal_source_argument() {
        let err = bind(SelectQuery::new(
            vec![Field::new(Expr::ident("value"))],
            FromClause::source(Source::schema(
                "system",
                "range",
                vec![Expr::int(0), Expr::ident("x")],
                "r",
            )),
        ))
        .unwrap_err();
        assert!(matches!(
            err,
            QuarryError::Structural(StructuralError::NonLiteralSourceArgument { position: 1, .. })
        ));
    }

    #[test]
    fn test_ambiguous_identifier_across_join() {
        let err = bind(SelectQuery::new(
            vec![Field::new(Expr::ident("name"))],
            FromClause::source(people("p")).join(
                Source::schema("mem", "orders", vec![], "o"),
                JoinKind::Cross,
                None,
            ),
        ))
        .unwrap_err();
        match err {
            QuarryError::Binding(BindError::AmbiguousColumn { candidates, .. }) => {
                assert_eq!(candidates, vec!["p".to_string(), "o".to_string()]);
            }
            other => panic!("expected ambiguity, got {other}"),
        }
    }

    #[test]
    fn test_join_registers_composite_alias() {
        let bound = bind(SelectQuery::new(
            vec![Field::new(Expr::path("o.total"))],
            FromClause::source(people("p")).inner_join(
                Source::schema("mem", "orders", vec![], "o"),
                Expr::eq(Expr::path("p.name"), Expr::path("o.name")),
            ),
        ))
        .unwrap();
        let scope = bound
            .scopes
            .scope(bound_select(&bound).scope.unwrap())
            .unwrap();
        assert_eq!(scope.row_alias(), Some("po"));
        let merged = scope.symbol("po").unwrap();
        assert_eq!(merged.len(), 6);
        assert_eq!(merged.column("o.total").unwrap().ordinal, 5);
    }

    #[test]
    fn test_on_condition_sees_only_joined_operands() {
        let err = bind(SelectQuery::new(
            vec![Field::new(Expr::path("p.name"))],
            FromClause::source(people("p"))
                .inner_join(
                    Source::schema("mem", "orders", vec![], "o"),
                    Expr::eq(Expr::path("p.name"), Expr::path("q.name")),
                )
                .inner_join(people("q"), Expr::bool(true)),
        ))
        .unwrap_err();
        assert!(matches!(
            err,
            QuarryError::Binding(BindError::UnknownIdentifier(ref a)) if a == "q"
        ));
    }

    #[test]
    fn test_aggregate_in_where_rejected() {
        let err = bind(
            SelectQuery::new(
                vec![Field::new(Expr::ident("name"))],
                FromClause::source(people("p")),
            )
            .with_where(Expr::binary(
                Expr::call("SUM", vec![Expr::ident("age")]),
                crate::ast::BinaryOp::Gt,
                Expr::int(1),
            )),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            QuarryError::Structural(StructuralError::AggregateNotAllowed { clause: "WHERE", .. })
        ));
    }

    #[test]
    fn test_nested_aggregate_rejected() {
        let err = bind(SelectQuery::new(
            vec![Field::new(Expr::call(
                "SUM",
                vec![Expr::call("MAX", vec![Expr::ident("age")])],
            ))],
            FromClause::source(people("p")),
        ))
        .unwrap_err();
        assert!(matches!(
            err,
            QuarryError::Structural(StructuralError::NestedAggregate(ref f)) if f == "MAX"
        ));
    }

    #[test]
    fn test_unknown_function() {
        let err = bind(SelectQuery::new(
            vec![Field::new(Expr::call("frobnicate", vec![Expr::ident("age")]))],
            FromClause::source(people("p")),
        ))
        .unwrap_err();
        assert!(err.to_string().contains("FROBNICATE"));
    }

    #[test]
    fn test_order_by_field_alias() {
        let bound = bind(
            SelectQuery::new(
                vec![Field::aliased(
                    Expr::add(Expr::ident("age"), Expr::int(1)),
                    "next",
                )],
                FromClause::source(people("p")),
            )
            .with_order_by(OrderItem::desc(Expr::ident("next"))),
        )
        .unwrap();
        assert_eq!(
            bound_select(&bound).order_by[0].expr.to_string(),
            "(p.age + 1)"
        );
    }

    #[test]
    fn test_cte_reference_and_scopes() {
        let catalog = catalog();
        let cte = Query::select(SelectQuery::new(
            vec![Field::new(Expr::ident("name"))],
            FromClause::source(people("p")),
        ));
        let body = Query::select(SelectQuery::new(
            vec![Field::new(Expr::path("c.name"))],
            FromClause::source(Source::reference("named", "c")),
        ));
        let bound = Binder::new(&catalog, FunctionRegistry::builtin())
            .bind(&Statement::With {
                ctes: vec![CteDef::new("named", cte)],
                body,
            })
            .unwrap();
        assert_eq!(bound.scopes.len(), 3);
        assert_eq!(
            bound.scopes.scope(ScopeId::ROOT).unwrap().children().len(),
            2
        );
        assert_eq!(bound.output.column_names(), vec!["c.name".to_string()]);
    }

    #[test]
    fn test_unknown_cte() {
        let err = bind(SelectQuery::new(
            vec![Field::new(Expr::ident("x"))],
            FromClause::source(Source::reference("missing", "m")),
        ))
        .unwrap_err();
        assert!(matches!(err, QuarryError::Binding(BindError::UnknownCte { .. })));
    }

    #[test]
    fn test_set_operand_arity_and_keys() {
        let catalog = catalog();
        let one = |fields: Vec<&str>| {
            Query::select(SelectQuery::new(
                fields.into_iter().map(|f| Field::new(Expr::ident(f))).collect(),
                FromClause::source(people("p")),
            ))
        };
        let arity = Query::union(one(vec!["name"]), one(vec!["name", "age"]), vec!["name".into()]);
        let err = Binder::new(&catalog, FunctionRegistry::builtin())
            .bind(&Statement::Query(arity))
            .unwrap_err();
        assert!(matches!(
            err,
            QuarryError::Structural(StructuralError::SetOperandArity { operand: 1, .. })
        ));

        let keys = Query::except(one(vec!["name"]), one(vec!["name"]), vec!["age".into()]);
        let err = Binder::new(&catalog, FunctionRegistry::builtin())
            .bind(&Statement::Query(keys))
            .unwrap_err();
        assert!(matches!(
            err,
            QuarryError::Structural(StructuralError::UnknownSetKey { operand: 0, .. })
        ));
    }

    #[test]
    fn test_set_key_must_share_position() {
        let catalog = catalog();
        let one = |fields: Vec<&str>| {
            Query::select(SelectQuery::new(
                fields.into_iter().map(|f| Field::new(Expr::ident(f))).collect(),
                FromClause::source(people("p")),
            ))
        };
        let swapped = Query::union(
            one(vec!["name", "age"]),
            one(vec!["age", "name"]),
            vec!["name".into()],
        );
        let err = Binder::new(&catalog, FunctionRegistry::builtin())
            .bind(&Statement::Query(swapped))
            .unwrap_err();
        assert!(matches!(
            err,
            QuarryError::Structural(StructuralError::SetOperandType { operand: 1, position: 0, .. })
        ));

        let renamed = Query::intersect(
            one(vec!["name", "age"]),
            Query::select(SelectQuery::new(
                vec![
                    Field::aliased(Expr::ident("name"), "alias"),
                    Field::aliased(Expr::ident("name"), "name"),
                ],
                FromClause::source(people("p")),
            )),
            vec!["name".into()],
        );
        let err = Binder::new(&catalog, FunctionRegistry::builtin())
            .bind(&Statement::Query(renamed))
            .unwrap_err();
        assert!(matches!(
            err,
            QuarryError::Structural(StructuralError::SetOperandType { position: 1, .. })
        ));
    }

    #[test]
    fn test_set_key_position_mismatch() {
        let catalog = catalog();
        let select = |fields: Vec<Field>| {
            Query::select(SelectQuery::new(fields, FromClause::source(people("p"))))
        };
        let nick = || Field::aliased(Expr::ident("name"), "nick");
        let left = select(vec![Field::new(Expr::ident("name")), nick()]);
        let right = select(vec![nick(), Field::new(Expr::ident("name"))]);
        let err = Binder::new(&catalog, FunctionRegistry::builtin())
            .bind(&Statement::Query(Query::union(left, right, vec!["name".into()])))
            .unwrap_err();
        assert!(matches!(
            err,
            QuarryError::Structural(StructuralError::SetKeyPosition {
                operand: 1,
                expected: 0,
                actual: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_source_alias_clashing_with_join_alias() {
        let err = bind(SelectQuery::new(
            vec![Field::new(Expr::path("a.name"))],
            FromClause::source(people("a"))
                .join(people("b"), JoinKind::Cross, None)
                .join(people("ab"), JoinKind::Cross, None),
        ))
        .unwrap_err();
        assert!(matches!(
            err,
            QuarryError::Binding(BindError::JoinAliasClash(ref a)) if a == "ab"
        ));
    }

    #[test]
    fn test_source_arguments_are_typed() {
        let bound = bind(SelectQuery::new(
            vec![Field::new(Expr::ident("value"))],
            FromClause::source(Source::schema(
                "system",
                "range",
                vec![Expr::int(0), Expr::int(3)],
                "r",
            )),
        ))
        .unwrap();
        let scope = bound
            .scopes
            .scope(bound_select(&bound).scope.unwrap())
            .unwrap();
        match scope.lookup("r") {
            Some(SymbolEntry::Source {
                binding: SourceBinding::Schema { args, .. },
                ..
            }) => assert_eq!(args, &vec![Value::Int64(0), Value::Int64(3)]),
            other => panic!("unexpected entry {other:?}"),
        }
    }

    #[test]
    fn test_empty_select_rejected() {
        let err = bind(SelectQuery::new(vec![], FromClause::source(people("p")))).unwrap_err();
        assert!(matches!(err, QuarryError::Structural(StructuralError::EmptySelect)));
    }
}
