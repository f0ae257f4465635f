//! `DataType` and record type definitions.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Static type of an expression or column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Universal base type; every type's ancestor chain ends here.
    Any,
    /// Type of an untyped null literal before retyping.
    Null,
    /// Boolean.
    Bool,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point.
    Float64,
    /// UTF-8 string.
    String,
    /// Timestamp (microseconds since epoch, UTC).
    Timestamp,
    /// Homogeneous array, indexable by `Int64`.
    Array(Box<DataType>),
    /// Named record with members and an optional parent record type.
    Record(Arc<RecordType>),
}

impl DataType {
    /// Returns the name of the data type as shown in diagnostics.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            DataType::Any => "ANY".to_string(),
            DataType::Null => "NULL".to_string(),
            DataType::Bool => "BOOL".to_string(),
            DataType::Int64 => "INT64".to_string(),
            DataType::Float64 => "FLOAT64".to_string(),
            DataType::String => "STRING".to_string(),
            DataType::Timestamp => "TIMESTAMP".to_string(),
            DataType::Array(inner) => format!("ARRAY<{}>", inner.name()),
            DataType::Record(record) => record.name.clone(),
        }
    }

    /// Creates a record type.
    #[must_use]
    pub fn record(record: RecordType) -> Self {
        DataType::Record(Arc::new(record))
    }

    /// Creates an array type.
    #[must_use]
    pub fn array(element: DataType) -> Self {
        DataType::Array(Box::new(element))
    }

    /// Returns whether this type is numeric.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int64 | DataType::Float64)
    }

    /// Returns whether this is a plain value type or a string.
    ///
    /// Column accesses of such types are worth caching.
    #[must_use]
    pub fn is_value_or_string(&self) -> bool {
        matches!(
            self,
            DataType::Bool
                | DataType::Int64
                | DataType::Float64
                | DataType::String
                | DataType::Timestamp
        )
    }

    /// Returns the ancestor chain, starting with the type itself and ending with `Any`.
    #[must_use]
    pub fn ancestors(&self) -> Vec<DataType> {
        let mut chain = vec![self.clone()];
        match self {
            DataType::Any => return chain,
            DataType::Int64 => chain.push(DataType::Float64),
            DataType::Record(record) => {
                let mut current = record.parent.clone();
                while let Some(parent) = current {
                    current = parent.parent.clone();
                    chain.push(DataType::Record(parent));
                }
            }
            _ => {}
        }
        chain.push(DataType::Any);
        chain
    }

    /// Returns the closest common ancestor of two types.
    ///
    /// `Null` is absorbed by the other side; unrelated types meet at `Any`.
    #[must_use]
    pub fn common_ancestor(&self, other: &DataType) -> DataType {
        match (self, other) {
            (DataType::Null, t) | (t, DataType::Null) => t.clone(),
            (a, b) if a == b => a.clone(),
            _ => {
                let theirs = other.ancestors();
                self.ancestors()
                    .into_iter()
                    .find(|candidate| theirs.contains(candidate))
                    .unwrap_or(DataType::Any)
            }
        }
    }

    /// Folds [`DataType::common_ancestor`] over several types.
    ///
    /// Returns `Null` for an empty input.
    #[must_use]
    pub fn common_of<'a>(types: impl IntoIterator<Item = &'a DataType>) -> DataType {
        types
            .into_iter()
            .fold(DataType::Null, |acc, t| acc.common_ancestor(t))
    }

    /// Returns the type of a member exposed by this type, if any.
    #[must_use]
    pub fn member(&self, name: &str) -> Option<DataType> {
        match self {
            DataType::Record(record) => record.member(name),
            DataType::Any => Some(DataType::Any),
            _ => None,
        }
    }

    /// Returns the element type produced by indexing this type with `index`.
    #[must_use]
    pub fn indexer(&self, index: &DataType) -> Option<DataType> {
        let int_index = matches!(index, DataType::Int64 | DataType::Null | DataType::Any);
        match self {
            DataType::Array(element) if int_index => Some((**element).clone()),
            DataType::String if int_index => Some(DataType::String),
            DataType::Any => Some(DataType::Any),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Named record type exposing members.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordType {
    /// Type name.
    pub name: String,
    /// Parent type whose members are inherited.
    pub parent: Option<Arc<RecordType>>,
    /// Own members, in declaration order.
    pub fields: Vec<(String, DataType)>,
}

impl RecordType {
    /// Creates a record type without a parent.
    #[must_use]
    pub fn new(name: impl Into<String>, fields: Vec<(String, DataType)>) -> Self {
        RecordType {
            name: name.into(),
            parent: None,
            fields,
        }
    }

    /// Sets the parent record type.
    #[must_use]
    pub fn with_parent(mut self, parent: Arc<RecordType>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Looks up a member, own fields first, then inherited ones.
    #[must_use]
    pub fn member(&self, name: &str) -> Option<DataType> {
        if let Some((_, ty)) = self.fields.iter().find(|(n, _)| n == name) {
            return Some(ty.clone());
        }
        self.parent.as_ref().and_then(|p| p.member(name))
    }
}
