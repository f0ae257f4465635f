//! Scope arena.
//!
//! Scopes are stored in creation order in a flat vector and addressed by
//! [`ScopeId`]. Each bound SELECT records its own id, so later passes resolve
//! names directly; [`ScopeCursor`] replays the creation order for passes that
//! want to cross-check their traversal against the binder's.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::catalog::Schema;
use crate::error::{BindError, QuarryError, Result};
use crate::types::Value;

use super::TableSymbol;

/// Index of a scope in its [`ScopeTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeId(usize);

impl ScopeId {
    /// The statement-level scope.
    pub const ROOT: ScopeId = ScopeId(0);

    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// What introduced a scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeKind {
    Root,
    Select,
    Cte(String),
    Subquery(String),
    SetOperand(usize),
}

/// How the rows behind a source alias are produced.
#[derive(Debug, Clone)]
pub enum SourceBinding {
    Schema {
        schema: Arc<dyn Schema>,
        method: String,
        args: Vec<Value>,
    },
    Cte(String),
    Subquery,
}

/// Symbol table entry.
#[derive(Debug, Clone)]
pub enum SymbolEntry {
    /// A row-producing source.
    Source {
        symbol: Arc<TableSymbol>,
        binding: SourceBinding,
    },
    /// The merge of the sources joined so far, under a composite alias.
    Merged { symbol: Arc<TableSymbol> },
}

impl SymbolEntry {
    #[must_use]
    pub fn symbol(&self) -> &Arc<TableSymbol> {
        match self {
            SymbolEntry::Source { symbol, .. } | SymbolEntry::Merged { symbol } => symbol,
        }
    }

    #[must_use]
    pub fn is_source(&self) -> bool {
        matches!(self, SymbolEntry::Source { .. })
    }
}

/// One lexical scope.
#[derive(Debug, Clone)]
pub struct Scope {
    id: ScopeId,
    parent: Option<ScopeId>,
    children: Vec<ScopeId>,
    kind: ScopeKind,
    symbols: IndexMap<String, SymbolEntry>,
    row_alias: Option<String>,
}

impl Scope {
    #[must_use]
    pub fn id(&self) -> ScopeId {
        self.id
    }

    #[must_use]
    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    #[must_use]
    pub fn children(&self) -> &[ScopeId] {
        &self.children
    }

    #[must_use]
    pub fn kind(&self) -> &ScopeKind {
        &self.kind
    }

    /// Looks up an alias registered in this scope.
    #[must_use]
    pub fn lookup(&self, alias: &str) -> Option<&SymbolEntry> {
        self.symbols.get(alias)
    }

    /// Returns the symbol registered under `alias`.
    #[must_use]
    pub fn symbol(&self, alias: &str) -> Option<&Arc<TableSymbol>> {
        self.lookup(alias).map(SymbolEntry::symbol)
    }

    /// Returns every entry in registration order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &SymbolEntry)> {
        self.symbols.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the source entries in registration order.
    pub fn sources(&self) -> impl Iterator<Item = (&str, &SymbolEntry)> {
        self.entries().filter(|(_, e)| e.is_source())
    }

    /// Returns the alias the rows of this scope are shaped by: the single
    /// source alias, or the final composite alias of a join.
    #[must_use]
    pub fn row_alias(&self) -> Option<&str> {
        self.row_alias.as_deref()
    }

    /// Returns the symbol behind [`Scope::row_alias`].
    #[must_use]
    pub fn row_symbol(&self) -> Option<&Arc<TableSymbol>> {
        self.row_alias().and_then(|a| self.symbol(a))
    }
}

/// Arena of every scope created while binding one statement.
#[derive(Debug, Clone)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTree {
    /// Creates a tree holding only the root scope.
    #[must_use]
    pub fn new() -> Self {
        ScopeTree {
            scopes: vec![Scope {
                id: ScopeId::ROOT,
                parent: None,
                children: Vec::new(),
                kind: ScopeKind::Root,
                symbols: IndexMap::new(),
                row_alias: None,
            }],
        }
    }

    /// Creates a child scope.
    ///
    /// # Errors
    ///
    /// Returns an invariant violation if `parent` is not in this tree.
    pub fn create_child(&mut self, parent: ScopeId, kind: ScopeKind) -> Result<ScopeId> {
        let id = ScopeId(self.scopes.len());
        self.scope_mut(parent)?.children.push(id);
        self.scopes.push(Scope {
            id,
            parent: Some(parent),
            children: Vec::new(),
            kind,
            symbols: IndexMap::new(),
            row_alias: None,
        });
        Ok(id)
    }

    /// Returns a scope by id.
    #[must_use]
    pub fn get(&self, id: ScopeId) -> Option<&Scope> {
        self.scopes.get(id.0)
    }

    /// Returns a scope by id.
    ///
    /// # Errors
    ///
    /// Returns an invariant violation if the id is not in this tree.
    pub fn scope(&self, id: ScopeId) -> Result<&Scope> {
        self.scopes
            .get(id.0)
            .ok_or_else(|| QuarryError::underflow("scope tree", "lookup scope", id.0 + 1, self.len()))
    }

    fn scope_mut(&mut self, id: ScopeId) -> Result<&mut Scope> {
        let len = self.scopes.len();
        self.scopes
            .get_mut(id.0)
            .ok_or_else(|| QuarryError::underflow("scope tree", "lookup scope", id.0 + 1, len))
    }

    /// Registers an alias in a scope.
    ///
    /// # Errors
    ///
    /// Returns a binding error if the alias is already registered there.
    pub fn register(&mut self, id: ScopeId, alias: &str, entry: SymbolEntry) -> Result<()> {
        let scope = self.scope_mut(id)?;
        if let Some(existing) = scope.symbols.get(alias) {
            let synthesized = [existing, &entry]
                .iter()
                .any(|e| matches!(e, SymbolEntry::Merged { .. }));
            return Err(if synthesized {
                BindError::JoinAliasClash(alias.to_string())
            } else {
                BindError::DuplicateAlias(alias.to_string())
            }
            .into());
        }
        scope.symbols.insert(alias.to_string(), entry);
        Ok(())
    }

    /// Records the row alias of a scope.
    ///
    /// # Errors
    ///
    /// Returns an invariant violation if the id is not in this tree.
    pub fn set_row_alias(&mut self, id: ScopeId, alias: &str) -> Result<()> {
        self.scope_mut(id)?.row_alias = Some(alias.to_string());
        Ok(())
    }

    /// Returns the number of scopes, root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Iterates over scopes in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Scope> {
        self.scopes.iter()
    }

    /// Returns a cursor positioned at the root.
    #[must_use]
    pub fn cursor(&self) -> ScopeCursor<'_> {
        ScopeCursor {
            tree: self,
            current: ScopeId::ROOT,
            entered: vec![0; self.scopes.len()],
        }
    }
}

/// Sequential next-child / parent walk over a [`ScopeTree`].
#[derive(Debug)]
pub struct ScopeCursor<'a> {
    tree: &'a ScopeTree,
    current: ScopeId,
    entered: Vec<usize>,
}

impl ScopeCursor<'_> {
    #[must_use]
    pub fn current(&self) -> ScopeId {
        self.current
    }

    /// Descends into the next child of the current scope not yet entered.
    ///
    /// # Errors
    ///
    /// Returns an invariant violation if every child has been entered.
    pub fn next_child(&mut self) -> Result<ScopeId> {
        let scope = self.tree.scope(self.current)?;
        let idx = self.entered[self.current.0];
        let child = *scope.children.get(idx).ok_or_else(|| {
            QuarryError::underflow("scope cursor", "next child", idx + 1, scope.children.len())
        })?;
        self.entered[self.current.0] += 1;
        self.current = child;
        Ok(child)
    }

    /// Returns to the parent of the current scope.
    ///
    /// # Errors
    ///
    /// Returns an invariant violation at the root.
    pub fn parent(&mut self) -> Result<ScopeId> {
        let parent = self
            .tree
            .scope(self.current)?
            .parent
            .ok_or_else(|| QuarryError::underflow("scope cursor", "parent", 1, 0))?;
        self.current = parent;
        Ok(parent)
    }
}
