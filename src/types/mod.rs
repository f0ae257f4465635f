//! Type system and runtime values.

mod data_type;
mod value;

pub use data_type::{DataType, RecordType};
pub use value::{QueryResult, RecordValue, Row, Value};
