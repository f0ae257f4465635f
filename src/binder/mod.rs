//! Binder module for semantic analysis.
//!
//! The binder resolves a parsed statement against the schema provider:
//! - Source aliases against schemas, methods and common table expressions
//! - Identifiers, columns and member/indexer chains against scope symbols
//! - Expression types, including function return types
//!
//! The output is a type-annotated statement plus the scope tree every later
//! pass resolves names against.

mod expression;
mod scope;
mod semantic;
mod symbol;

pub(crate) use expression::binary_type;
pub use scope::{Scope, ScopeCursor, ScopeId, ScopeKind, ScopeTree, SourceBinding, SymbolEntry};
pub use semantic::{Binder, BoundStatement};
pub use symbol::{ColumnSymbol, TableSymbol};
