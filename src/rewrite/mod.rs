//! Structural rewrites applied between binding and code generation.
//!
//! Every rewrite is a [`Folder`](crate::visit::Folder): it reads the bound
//! tree and builds a new one, so the bound statement stays valid for
//! diagnostics. Rewrites are independent and run in a fixed order:
//!
//! 1. DISTINCT to GROUP BY
//! 2. Null literal retyping
//! 3. Join transition tables
//! 4. Aggregate and grouped-field rewriting

mod aggregate;
mod alias_remap;
mod distinct;
mod null_retype;
mod transition;

pub use aggregate::AggregateRewrite;
pub use alias_remap::AliasRemap;
pub use distinct::DistinctToGroupBy;
pub use null_retype::NullRetype;
pub use transition::TransitionTables;

use tracing::{debug, info_span};

use crate::ast::{Expr, ExprKind, SelectQuery, Statement};
use crate::binder::{ScopeId, ScopeTree};
use crate::error::{QuarryError, Result};
use crate::functions::AggregateFunction;
use crate::CompilerConfig;

/// Result of a rewrite.
#[derive(Debug)]
pub enum Transformed<T> {
    /// Tree was modified.
    Yes(T),
    /// Tree unchanged.
    No(T),
}

impl<T> Transformed<T> {
    /// Returns the inner value.
    pub fn into_inner(self) -> T {
        match self {
            Transformed::Yes(v) | Transformed::No(v) => v,
        }
    }

    /// Returns true if the tree was modified.
    #[must_use]
    pub fn was_transformed(&self) -> bool {
        matches!(self, Transformed::Yes(_))
    }

    fn from_count(value: T, changed: usize) -> Self {
        if changed > 0 {
            Transformed::Yes(value)
        } else {
            Transformed::No(value)
        }
    }
}

/// A tree-to-tree rewrite over a bound statement.
pub trait Rewriter: Send + Sync {
    /// Returns the name of this rewrite.
    fn name(&self) -> &'static str;

    /// Produces the rewritten statement.
    ///
    /// # Errors
    ///
    /// Returns a structural error for a malformed clause, or an invariant
    /// violation if the statement does not match its scope tree.
    fn rewrite(&self, statement: &Statement, scopes: &ScopeTree) -> Result<Transformed<Statement>>;
}

/// Ordered list of rewrites.
pub struct RewritePipeline {
    rules: Vec<Box<dyn Rewriter>>,
}

impl RewritePipeline {
    /// Creates an empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        RewritePipeline { rules: Vec::new() }
    }

    /// Creates the standard pipeline for a configuration.
    #[must_use]
    pub fn standard(config: &CompilerConfig) -> Self {
        let mut pipeline = RewritePipeline::new();
        if config.desugar_distinct {
            pipeline = pipeline.with_rule(DistinctToGroupBy);
        }
        if config.retype_nulls {
            pipeline = pipeline.with_rule(NullRetype);
        }
        pipeline
            .with_rule(TransitionTables)
            .with_rule(AggregateRewrite)
    }

    /// Appends a rewrite.
    #[must_use]
    pub fn with_rule(mut self, rule: impl Rewriter + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Returns the rule names in execution order.
    #[must_use]
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Runs every rewrite in order, returning the final statement and the
    /// names of the rewrites that changed it.
    ///
    /// # Errors
    ///
    /// Fails on the first rewrite that fails.
    pub fn run(
        &self,
        statement: &Statement,
        scopes: &ScopeTree,
    ) -> Result<(Statement, Vec<&'static str>)> {
        let mut current = statement.clone();
        let mut applied = Vec::new();
        for rule in &self.rules {
            let _span = info_span!("rewrite", rule = rule.name()).entered();
            let result = rule.rewrite(&current, scopes)?;
            if result.was_transformed() {
                applied.push(rule.name());
            }
            debug!(changed = result.was_transformed(), "rewrite finished");
            current = result.into_inner();
        }
        Ok((current, applied))
    }
}

impl Default for RewritePipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the scope the binder recorded for a SELECT.
pub(crate) fn bound_scope(pass: &'static str, select: &SelectQuery) -> Result<ScopeId> {
    select
        .scope
        .ok_or_else(|| QuarryError::underflow(pass, "resolve select scope", 1, 0))
}

/// Returns true if an expression contains an aggregate call.
pub(crate) fn contains_aggregate(expr: &Expr) -> bool {
    let mut stack = vec![expr];
    while let Some(e) = stack.pop() {
        if let ExprKind::Call { name, .. } = &e.kind {
            if AggregateFunction::parse(name).is_some() {
                return true;
            }
        }
        stack.extend(e.children());
    }
    false
}

/// Returns true if a SELECT must be evaluated over groups.
pub(crate) fn needs_grouping(select: &SelectQuery) -> bool {
    select.group_by.is_some()
        || select.fields.iter().any(|f| contains_aggregate(&f.expr))
        || select.order_by.iter().any(|o| contains_aggregate(&o.expr))
}
