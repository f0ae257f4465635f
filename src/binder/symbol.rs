//! Table symbols: the resolved column lists behind each alias.

use crate::catalog::ColumnDef;
use crate::types::DataType;

/// One resolved column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSymbol {
    pub name: String,
    pub ordinal: usize,
    pub data_type: DataType,
    /// Alias of the source that produced the column.
    pub origin: String,
}

impl ColumnSymbol {
    /// Returns the synthesized transition-table name, `origin.name`.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.origin, self.name)
    }
}

/// Ordered column list for one alias, or the merge of several.
///
/// Columns of a merged symbol are addressed by their qualified names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSymbol {
    columns: Vec<ColumnSymbol>,
    merged: bool,
}

impl TableSymbol {
    /// Builds the symbol of a schema method result.
    #[must_use]
    pub fn from_columns(alias: &str, columns: &[ColumnDef]) -> Self {
        Self::from_fields(
            alias,
            columns.iter().map(|c| (c.name.clone(), c.data_type.clone())),
        )
    }

    /// Builds a symbol from `(name, type)` pairs, numbering ordinals by position.
    #[must_use]
    pub fn from_fields(alias: &str, fields: impl IntoIterator<Item = (String, DataType)>) -> Self {
        TableSymbol {
            columns: fields
                .into_iter()
                .enumerate()
                .map(|(ordinal, (name, data_type))| ColumnSymbol {
                    name,
                    ordinal,
                    data_type,
                    origin: alias.to_string(),
                })
                .collect(),
            merged: false,
        }
    }

    /// Returns a copy of this symbol seen through another alias.
    #[must_use]
    pub fn realias(&self, alias: &str) -> Self {
        Self::from_fields(
            alias,
            self.columns
                .iter()
                .map(|c| (c.name.clone(), c.data_type.clone())),
        )
    }

    /// Merges two symbols left to right.
    ///
    /// Ordinals are the concatenation of both column lists, so merging is
    /// associative: `(a·b)·c == a·(b·c)`.
    #[must_use]
    pub fn merge(&self, other: &TableSymbol) -> TableSymbol {
        let columns = self
            .columns
            .iter()
            .chain(&other.columns)
            .enumerate()
            .map(|(ordinal, c)| ColumnSymbol {
                ordinal,
                ..c.clone()
            })
            .collect();
        TableSymbol {
            columns,
            merged: true,
        }
    }

    /// Looks up a column. Merged symbols match qualified names.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnSymbol> {
        let exact = self.columns.iter().find(|c| self.column_name(c) == name);
        exact.or_else(|| {
            self.columns
                .iter()
                .find(|c| self.column_name(c).eq_ignore_ascii_case(name))
        })
    }

    fn column_name(&self, column: &ColumnSymbol) -> String {
        if self.merged {
            column.qualified_name()
        } else {
            column.name.clone()
        }
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnSymbol] {
        &self.columns
    }

    /// Returns the addressable column names in ordinal order.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| self.column_name(c)).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Returns true if this symbol is a join merge.
    #[must_use]
    pub fn is_merged(&self) -> bool {
        self.merged
    }
}
