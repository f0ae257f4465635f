//! Error types for quarry compilation and execution.

use thiserror::Error;

use crate::ast::NodeKind;

/// Result type alias using [`QuarryError`].
pub type Result<T> = std::result::Result<T, QuarryError>;

/// Error types for quarry operations.
#[derive(Debug, Error)]
pub enum QuarryError {
    // ==================== User Query Errors ====================
    /// Unknown schema, method, alias or column, or a type that cannot be resolved.
    #[error("Bind error: {0}")]
    Binding(#[from] BindError),

    /// Malformed clause shape.
    #[error("Structural error: {0}")]
    Structural(#[from] StructuralError),

    // ==================== Compiler Defects ====================
    /// A stack or work-list inside a pass ran dry. Always a compiler defect.
    #[error(
        "Invariant violation in {pass} during {operation}: expected {expected} item(s), {available} available"
    )]
    InvariantViolation {
        pass: &'static str,
        operation: &'static str,
        expected: usize,
        available: usize,
    },

    /// A pass reached a node kind it does not handle.
    #[error("Unsupported node {kind} in {pass}")]
    UnsupportedNode { pass: &'static str, kind: NodeKind },

    // ==================== Collaborator / Runtime Errors ====================
    /// Schema provider failure (bad arguments, unreadable source).
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// General execution errors raised by the reference runtime.
    #[error("Execution error: {0}")]
    ExecutionError(String),

    /// Division by zero in expression evaluation.
    #[error("Division by zero")]
    DivisionByZero,

    /// I/O failure while reading a file-backed source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV decoding failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl QuarryError {
    /// Builds an invariant violation for a stack/work-list underflow.
    #[must_use]
    pub fn underflow(
        pass: &'static str,
        operation: &'static str,
        expected: usize,
        available: usize,
    ) -> Self {
        QuarryError::InvariantViolation {
            pass,
            operation,
            expected,
            available,
        }
    }

    /// Builds an unsupported-node error.
    #[must_use]
    pub fn unsupported(pass: &'static str, kind: NodeKind) -> Self {
        QuarryError::UnsupportedNode { pass, kind }
    }

    /// Returns true if this error reports a compiler defect rather than a bad query.
    #[must_use]
    pub fn is_defect(&self) -> bool {
        matches!(
            self,
            QuarryError::InvariantViolation { .. } | QuarryError::UnsupportedNode { .. }
        )
    }
}

/// Errors raised while resolving names and types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("Unknown schema '{schema}' for alias '{alias}'")]
    UnknownSchema { schema: String, alias: String },

    #[error("Unknown method '{schema}.{method}' for alias '{alias}': {reason}")]
    UnknownMethod {
        schema: String,
        method: String,
        alias: String,
        reason: String,
    },

    #[error("Unknown alias '{0}'")]
    UnknownAlias(String),

    #[error("Unknown column '{column}' in '{alias}'")]
    UnknownColumn { alias: String, column: String },

    #[error("Unknown column '{0}'")]
    UnknownIdentifier(String),

    #[error("Ambiguous column '{column}': found in {candidates:?}")]
    AmbiguousColumn {
        column: String,
        candidates: Vec<String>,
    },

    #[error("Type '{type_name}' has no member '{member}'")]
    UnknownMember { type_name: String, member: String },

    #[error("Type '{type_name}' cannot be indexed by '{index_type}'")]
    NotIndexable {
        type_name: String,
        index_type: String,
    },

    #[error("Unknown function '{name}' for arguments ({args})")]
    UnknownFunction { name: String, args: String },

    #[error("Operator '{op}' is not applicable to '{left}' and '{right}'")]
    TypeMismatch {
        op: String,
        left: String,
        right: String,
    },

    #[error("Duplicate alias '{0}'")]
    DuplicateAlias(String),

    #[error("Alias '{0}' clashes with the alias synthesized for a join")]
    JoinAliasClash(String),

    #[error("Unknown common table expression '{name}' for alias '{alias}'")]
    UnknownCte { name: String, alias: String },
}

/// Errors raised for malformed clause shapes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("DISTINCT query has no selected fields")]
    DistinctWithoutFields,

    #[error("SELECT has no fields")]
    EmptySelect,

    #[error("Argument {position} of source '{alias}' must be a literal")]
    NonLiteralSourceArgument { alias: String, position: usize },

    #[error("Join references unresolved alias '{alias}' (row alias is '{row_alias}')")]
    UnresolvedJoinAlias { alias: String, row_alias: String },

    #[error("Set operand {operand} selects {actual} field(s), expected {expected}")]
    SetOperandArity {
        operand: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Set operator key '{key}' is not selected by operand {operand}")]
    UnknownSetKey { key: String, operand: usize },

    #[error("Set operator key '{key}' is column {actual} of operand {operand}, expected column {expected}")]
    SetKeyPosition {
        key: String,
        operand: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Set operand {operand} column {position} has type '{actual}', incompatible with '{expected}'")]
    SetOperandType {
        operand: usize,
        position: usize,
        expected: String,
        actual: String,
    },

    #[error("Column '{0}' must appear in GROUP BY or inside an aggregate")]
    UngroupedColumn(String),

    #[error("Aggregate '{0}' cannot be nested inside another aggregate")]
    NestedAggregate(String),

    #[error("Aggregate '{function}' is not allowed in {clause}")]
    AggregateNotAllowed {
        function: String,
        clause: &'static str,
    },
}
