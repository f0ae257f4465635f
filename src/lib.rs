//! quarry - a multi-pass query compiler for SQL over pluggable,
//! schema-described data sources.
//!
//! A parsed [`ast::Statement`] flows through binding, structural rewrites,
//! common-subexpression analysis and code generation, and comes out as an
//! [`codegen::ExecutablePlan`] that the reference [`executor`] can run.

pub mod ast;
pub mod binder;
pub mod catalog;
pub mod codegen;
pub mod cse;
pub mod error;
pub mod executor;
pub mod functions;
pub mod rewrite;
pub mod types;
pub mod visit;

use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

pub use error::{QuarryError, Result};
pub use types::{QueryResult, Row, Value};

use ast::Statement;
use binder::{Binder, ScopeTree, TableSymbol};
use catalog::SchemaProvider;
use codegen::{CodeGenerator, ExecutablePlan};
use cse::{CacheSlots, CseAnalyzer};
use functions::FunctionRegistry;
use rewrite::RewritePipeline;

/// Configuration for the compilation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Assign cache slots to repeated subexpressions (default: true).
    pub enable_cse: bool,
    /// Rewrite `SELECT DISTINCT` into a GROUP BY over the fields (default: true).
    pub desugar_distinct: bool,
    /// Give untyped NULL literals the type of their context (default: true).
    pub retype_nulls: bool,
    /// Compile batches on the rayon thread pool (default: true).
    pub parallel_batch: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            enable_cse: true,
            desugar_distinct: true,
            retype_nulls: true,
            parallel_batch: true,
        }
    }
}

impl CompilerConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_cse(mut self, enable: bool) -> Self {
        self.enable_cse = enable;
        self
    }

    #[must_use]
    pub fn with_distinct_desugaring(mut self, enable: bool) -> Self {
        self.desugar_distinct = enable;
        self
    }

    #[must_use]
    pub fn with_null_retyping(mut self, enable: bool) -> Self {
        self.retype_nulls = enable;
        self
    }

    #[must_use]
    pub fn with_parallel_batch(mut self, enable: bool) -> Self {
        self.parallel_batch = enable;
        self
    }
}

/// Compiles statements against a schema provider.
///
/// A compiler holds no per-statement state: every call to
/// [`Compiler::compile`] owns its scope tree, rewrite state and analyzer, so
/// one compiler can be shared across threads.
pub struct Compiler {
    provider: Arc<dyn SchemaProvider>,
    functions: Arc<FunctionRegistry>,
    config: CompilerConfig,
}

impl Compiler {
    /// Creates a compiler with the built-in function library and default configuration.
    #[must_use]
    pub fn new(provider: Arc<dyn SchemaProvider>) -> Self {
        Compiler {
            provider,
            functions: Arc::new(FunctionRegistry::with_builtins()),
            config: CompilerConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: CompilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the function library.
    #[must_use]
    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = Arc::new(functions);
        self
    }

    #[must_use]
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    #[must_use]
    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Compiles one statement.
    ///
    /// # Errors
    ///
    /// Returns a binding or structural error for an invalid query, and an
    /// invariant violation or unsupported-node error for a compiler defect.
    #[instrument(level = "debug", skip_all, name = "compile")]
    pub fn compile(&self, statement: &Statement) -> Result<CompiledQuery> {
        let bound = Binder::new(self.provider.as_ref(), &self.functions).bind(statement)?;
        let (rewritten, applied_rewrites) =
            RewritePipeline::standard(&self.config).run(&bound.statement, &bound.scopes)?;
        let cache_slots = if self.config.enable_cse {
            CseAnalyzer::new(&self.functions).analyze(&rewritten)?
        } else {
            CacheSlots::new()
        };
        let plan =
            CodeGenerator::new(&bound.scopes, &cache_slots, &self.functions).generate(&rewritten)?;
        debug!(
            scopes = bound.scopes.len(),
            rewrites = applied_rewrites.len(),
            slots = cache_slots.total(),
            "compiled statement"
        );
        Ok(CompiledQuery {
            bound: bound.statement,
            output: bound.output,
            rewritten,
            scopes: bound.scopes,
            cache_slots,
            plan,
            applied_rewrites,
        })
    }

    /// Compiles independent statements, in parallel unless disabled.
    ///
    /// Results are returned in input order; one failing statement does not
    /// affect the others.
    #[must_use]
    pub fn compile_batch(&self, statements: &[Statement]) -> Vec<Result<CompiledQuery>> {
        if self.config.parallel_batch {
            statements.par_iter().map(|s| self.compile(s)).collect()
        } else {
            statements.iter().map(|s| self.compile(s)).collect()
        }
    }

    /// Compiles and executes a statement.
    ///
    /// # Errors
    ///
    /// Returns any compilation or execution error.
    pub fn execute(&self, statement: &Statement) -> Result<QueryResult> {
        self.compile(statement)?.execute()
    }
}

/// The products of compiling one statement.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    bound: Statement,
    output: Arc<TableSymbol>,
    rewritten: Statement,
    scopes: ScopeTree,
    cache_slots: CacheSlots,
    plan: ExecutablePlan,
    applied_rewrites: Vec<&'static str>,
}

impl CompiledQuery {
    /// Returns the statement as bound, before any rewrite.
    #[must_use]
    pub fn bound(&self) -> &Statement {
        &self.bound
    }

    /// Returns the output columns of the statement.
    #[must_use]
    pub fn output(&self) -> &TableSymbol {
        &self.output
    }

    /// Returns the statement after every rewrite.
    #[must_use]
    pub fn rewritten(&self) -> &Statement {
        &self.rewritten
    }

    #[must_use]
    pub fn scopes(&self) -> &ScopeTree {
        &self.scopes
    }

    #[must_use]
    pub fn cache_slots(&self) -> &CacheSlots {
        &self.cache_slots
    }

    #[must_use]
    pub fn plan(&self) -> &ExecutablePlan {
        &self.plan
    }

    /// Returns the names of the rewrites that changed the statement.
    #[must_use]
    pub fn applied_rewrites(&self) -> &[&'static str] {
        &self.applied_rewrites
    }

    /// Runs the plan on the reference runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if a source fails or an expression cannot be evaluated.
    pub fn execute(&self) -> Result<QueryResult> {
        executor::execute(&self.plan)
    }

    /// Renders the rewrites, cache slot count and plan tree.
    #[must_use]
    pub fn explain(&self) -> String {
        let rewrites = if self.applied_rewrites.is_empty() {
            "none".to_string()
        } else {
            self.applied_rewrites.join(", ")
        };
        format!(
            "Rewrites: {rewrites}\nCache slots: {}\n{}",
            self.cache_slots.total(),
            self.plan
        )
    }
}
