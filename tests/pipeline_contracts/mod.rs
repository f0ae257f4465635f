//! Contract tests for the compilation pipeline, one file per pass.
//!
//! Every file shares the fixture catalog below:
//! - `hr.employees(name, dept, salary, bonus)`: five rows
//! - `hr.departments(dept, floor)`: three rows, one without employees
//! - `system`: `dual()` and `range(min, max)`

mod binder_contract;
mod codegen_contract;
mod cse_contract;
mod executor_contract;
mod rewrite_contract;

use std::sync::Arc;

use quarry::ast::{Expr, Field, FromClause, Query, SelectQuery, Source, Statement};
use quarry::catalog::{Catalog, MemorySchema, SystemSchema};
use quarry::types::{DataType, Value};
use quarry::Compiler;

pub fn catalog() -> Catalog {
    let s = |v: &str| Value::String(v.to_string());
    let hr = MemorySchema::new("hr")
        .with_table(
            "employees",
            vec![
                ("name", DataType::String),
                ("dept", DataType::String),
                ("salary", DataType::Int64),
                ("bonus", DataType::Float64),
            ],
            vec![
                vec![s("ann"), s("eng"), Value::Int64(100), Value::Float64(1.5)],
                vec![s("bob"), s("eng"), Value::Int64(80), Value::Null],
                vec![s("cid"), s("ops"), Value::Int64(50), Value::Float64(0.5)],
                vec![s("dee"), s("ops"), Value::Int64(70), Value::Float64(2.0)],
                vec![s("eve"), s("hr"), Value::Int64(60), Value::Null],
            ],
        )
        .expect("employees table")
        .with_table(
            "departments",
            vec![("dept", DataType::String), ("floor", DataType::Int64)],
            vec![
                vec![s("eng"), Value::Int64(3)],
                vec![s("ops"), Value::Int64(1)],
                vec![s("sales"), Value::Int64(2)],
            ],
        )
        .expect("departments table");
    Catalog::new()
        .with_schema(Arc::new(hr))
        .and_then(|c| c.with_schema(Arc::new(SystemSchema::new())))
        .expect("fixture catalog")
}

pub fn compiler() -> Compiler {
    Compiler::new(Arc::new(catalog()))
}

pub fn employees(alias: &str) -> Source {
    Source::schema("hr", "employees", vec![], alias)
}

pub fn departments(alias: &str) -> Source {
    Source::schema("hr", "departments", vec![], alias)
}

pub fn fields(exprs: Vec<Expr>) -> Vec<Field> {
    exprs.into_iter().map(Field::new).collect()
}

pub fn statement(select: SelectQuery) -> Statement {
    Statement::Query(Query::select(select))
}

/// `SELECT <exprs> FROM hr.employees() e`
pub fn from_employees(exprs: Vec<Expr>) -> SelectQuery {
    SelectQuery::new(fields(exprs), FromClause::source(employees("e")))
}

/// Returns the top-level SELECT of a statement.
pub fn body_select(statement: &Statement) -> &SelectQuery {
    match statement.body() {
        Query::Select(select) => select,
        Query::SetOperation(_) => panic!("expected a SELECT body"),
    }
}

/// Renders the fields of a statement's top-level SELECT.
pub fn field_texts(statement: &Statement) -> Vec<String> {
    body_select(statement)
        .fields
        .iter()
        .map(|f| f.expr.to_string())
        .collect()
}
