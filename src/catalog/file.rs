//! CSV files exposed as a schema: `#csv.file('path/to/data.csv')`.

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{QuarryError, Result};
use crate::types::{DataType, Value};

use super::{ColumnDef, Schema};

/// CSV parsing options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvOptions {
    /// Field separator (default: ',').
    pub delimiter: char,
    /// Whether the first row is a header (default: true). Without a header
    /// columns are named `column0`, `column1`, ...
    pub has_header: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            has_header: true,
        }
    }
}

impl CsvOptions {
    /// Creates options with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the field delimiter.
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Sets whether the file has a header row.
    #[must_use]
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }
}

/// Schema with a single `file(path)` method.
#[derive(Debug)]
pub struct CsvSchema {
    name: String,
    options: CsvOptions,
}

impl CsvSchema {
    /// Creates a CSV schema registered as `csv`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options("csv", CsvOptions::default())
    }

    /// Creates a CSV schema with a custom name and options.
    #[must_use]
    pub fn with_options(name: impl Into<String>, options: CsvOptions) -> Self {
        CsvSchema {
            name: name.into(),
            options,
        }
    }

    fn path<'a>(method: &str, args: &'a [Value]) -> Result<&'a str> {
        if !method.eq_ignore_ascii_case("file") {
            return Err(QuarryError::SchemaError(format!(
                "No method '{method}' in CSV schema"
            )));
        }
        match args {
            [Value::String(path)] => Ok(path),
            _ => Err(QuarryError::SchemaError(
                "file expects a single string path argument".into(),
            )),
        }
    }

    fn read(&self, path: &Path) -> Result<(Vec<String>, Vec<csv::StringRecord>)> {
        let file = File::open(path)?;
        let delimiter = u8::try_from(self.options.delimiter).map_err(|_| {
            QuarryError::SchemaError(format!(
                "Delimiter '{}' is not a single byte",
                self.options.delimiter
            ))
        })?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(self.options.has_header)
            .from_reader(file);

        let mut records = Vec::new();
        for record in reader.records() {
            records.push(record?);
        }
        let headers = if self.options.has_header {
            reader.headers()?.iter().map(str::to_string).collect()
        } else {
            let width = records.first().map_or(0, csv::StringRecord::len);
            (0..width).map(|i| format!("column{i}")).collect()
        };
        Ok((headers, records))
    }
}

impl Default for CsvSchema {
    fn default() -> Self {
        Self::new()
    }
}

/// Infers the narrowest type that parses every non-empty cell of a column.
fn infer_column(records: &[csv::StringRecord], idx: usize) -> DataType {
    let cells = || {
        records
            .iter()
            .filter_map(move |r| r.get(idx))
            .filter(|c| !c.is_empty())
    };
    if cells().next().is_none() {
        return DataType::String;
    }
    if cells().all(|c| c.parse::<i64>().is_ok()) {
        DataType::Int64
    } else if cells().all(|c| c.parse::<f64>().is_ok()) {
        DataType::Float64
    } else if cells().all(|c| c.eq_ignore_ascii_case("true") || c.eq_ignore_ascii_case("false")) {
        DataType::Bool
    } else {
        DataType::String
    }
}

fn parse_cell(cell: &str, data_type: &DataType) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    match data_type {
        DataType::Int64 => cell.parse().map_or(Value::Null, Value::Int64),
        DataType::Float64 => cell.parse().map_or(Value::Null, Value::Float64),
        DataType::Bool => Value::Bool(cell.eq_ignore_ascii_case("true")),
        _ => Value::String(cell.to_string()),
    }
}

impl Schema for CsvSchema {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_table(&self, method: &str, args: &[Value]) -> Result<Vec<ColumnDef>> {
        let path = Self::path(method, args)?;
        let (headers, records) = self.read(Path::new(path))?;
        Ok(headers
            .into_iter()
            .enumerate()
            .map(|(idx, name)| ColumnDef::new(name, idx, infer_column(&records, idx)))
            .collect())
    }

    fn rows(&self, method: &str, args: &[Value]) -> Result<Vec<Vec<Value>>> {
        let path = Self::path(method, args)?;
        let (headers, records) = self.read(Path::new(path))?;
        let types: Vec<DataType> = (0..headers.len())
            .map(|idx| infer_column(&records, idx))
            .collect();
        Ok(records
            .iter()
            .map(|record| {
                types
                    .iter()
                    .enumerate()
                    .map(|(idx, ty)| parse_cell(record.get(idx).unwrap_or_default(), ty))
                    .collect()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn fixture(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn path_arg(file: &NamedTempFile) -> Vec<Value> {
        vec![Value::String(file.path().to_string_lossy().into_owned())]
    }

    #[test]
    fn test_infers_column_types() {
        let file = fixture("name,age,score,active\nAlice,30,1.5,true\nBob,,2,false\n");
        let columns = CsvSchema::new().get_table("file", &path_arg(&file)).unwrap();
        let types: Vec<DataType> = columns.into_iter().map(|c| c.data_type).collect();
        assert_eq!(
            types,
            vec![DataType::String, DataType::Int64, DataType::Float64, DataType::Bool]
        );
    }

    #[test]
    fn test_rows_parse_with_nulls() {
        let file = fixture("name,age\nAlice,30\nBob,\n");
        let rows = CsvSchema::new().rows("FILE", &path_arg(&file)).unwrap();
        assert_eq!(rows[0], vec![Value::String("Alice".into()), Value::Int64(30)]);
        assert_eq!(rows[1][1], Value::Null);
    }

    #[test]
    fn test_custom_delimiter_without_header() {
        let file = fixture("1;x\n2;y\n");
        let schema =
            CsvSchema::with_options("csv", CsvOptions::new().with_delimiter(';').with_header(false));
        let columns = schema.get_table("file", &path_arg(&file)).unwrap();
        assert_eq!(columns[0].name, "column0");
        assert_eq!(schema.rows("file", &path_arg(&file)).unwrap().len(), 2);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = CsvSchema::new()
            .get_table("file", &[Value::String("/nonexistent/x.csv".into())])
            .unwrap_err();
        assert!(matches!(err, QuarryError::Io(_)));
    }

    #[test]
    fn test_bad_arguments() {
        assert!(CsvSchema::new().get_table("file", &[]).is_err());
        assert!(CsvSchema::new().get_table("open", &[Value::String("x".into())]).is_err());
    }
}
