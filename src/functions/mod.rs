//! Function library: scalar functions, aggregates and the non-deterministic
//! name set that gates caching.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{QuarryError, Result};
use crate::types::{DataType, Value};

/// Return-type rule of a scalar function; `None` rejects the argument types.
pub type ReturnTypeFn = Arc<dyn Fn(&[DataType]) -> Option<DataType> + Send + Sync>;

/// Implementation of a scalar function.
pub type ScalarImpl = Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

/// A registered scalar function.
#[derive(Clone)]
pub struct ScalarFunction {
    name: String,
    deterministic: bool,
    return_type: ReturnTypeFn,
    eval: ScalarImpl,
}

impl ScalarFunction {
    /// Creates a deterministic scalar function.
    pub fn new(
        name: impl Into<String>,
        return_type: impl Fn(&[DataType]) -> Option<DataType> + Send + Sync + 'static,
        eval: impl Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        ScalarFunction {
            name: name.into().to_uppercase(),
            deterministic: true,
            return_type: Arc::new(return_type),
            eval: Arc::new(eval),
        }
    }

    /// Marks the function as non-deterministic.
    #[must_use]
    pub fn non_deterministic(mut self) -> Self {
        self.deterministic = false;
        self
    }

    /// Returns the upper-cased name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.deterministic
    }

    /// Returns the result type for the given argument types.
    #[must_use]
    pub fn return_type(&self, args: &[DataType]) -> Option<DataType> {
        (self.return_type)(args)
    }

    /// Invokes the function.
    ///
    /// # Errors
    ///
    /// Returns an error if the function fails on the given values.
    pub fn invoke(&self, args: &[Value]) -> Result<Value> {
        (self.eval)(args)
    }
}

impl fmt::Debug for ScalarFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalarFunction")
            .field("name", &self.name)
            .field("deterministic", &self.deterministic)
            .finish_non_exhaustive()
    }
}

/// Aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    /// Parses an aggregate function name (case-insensitive).
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_uppercase().as_str() {
            "COUNT" => Some(AggregateFunction::Count),
            "SUM" => Some(AggregateFunction::Sum),
            "AVG" => Some(AggregateFunction::Avg),
            "MIN" => Some(AggregateFunction::Min),
            "MAX" => Some(AggregateFunction::Max),
            _ => None,
        }
    }

    /// Returns the upper-cased name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        }
    }

    /// Returns the result type for an argument type; `None` for `COUNT(*)`'s
    /// missing argument is accepted by `COUNT` only.
    #[must_use]
    pub fn return_type(&self, arg: Option<&DataType>) -> Option<DataType> {
        match (self, arg) {
            (AggregateFunction::Count, _) => Some(DataType::Int64),
            (_, None) => None,
            (AggregateFunction::Sum, Some(t)) => match t {
                DataType::Int64 | DataType::Float64 | DataType::Any => Some(t.clone()),
                DataType::Null => Some(DataType::Int64),
                _ => None,
            },
            (AggregateFunction::Avg, Some(t)) => (t.is_numeric()
                || matches!(t, DataType::Null | DataType::Any))
            .then_some(DataType::Float64),
            (AggregateFunction::Min | AggregateFunction::Max, Some(t)) => {
                (t.is_value_or_string() || matches!(t, DataType::Null | DataType::Any))
                    .then(|| t.clone())
            }
        }
    }
}

/// Case-insensitive function registry.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    scalars: HashMap<String, Arc<ScalarFunction>>,
}

impl FunctionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in library.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for function in builtin_functions() {
            registry.register(function);
        }
        registry
    }

    /// Returns the shared built-in registry.
    #[must_use]
    pub fn builtin() -> &'static FunctionRegistry {
        static BUILTIN: OnceLock<FunctionRegistry> = OnceLock::new();
        BUILTIN.get_or_init(FunctionRegistry::with_builtins)
    }

    /// Registers a scalar function, replacing any function of the same name.
    pub fn register(&mut self, function: ScalarFunction) {
        self.scalars
            .insert(function.name().to_string(), Arc::new(function));
    }

    /// Registers a scalar function, builder style.
    #[must_use]
    pub fn with_function(mut self, function: ScalarFunction) -> Self {
        self.register(function);
        self
    }

    /// Looks up a scalar function.
    #[must_use]
    pub fn scalar(&self, name: &str) -> Option<Arc<ScalarFunction>> {
        self.scalars.get(&name.to_uppercase()).cloned()
    }

    /// Looks up an aggregate function.
    #[must_use]
    pub fn aggregate(&self, name: &str) -> Option<AggregateFunction> {
        AggregateFunction::parse(name)
    }

    /// Returns true if `name` is an aggregate.
    #[must_use]
    pub fn is_aggregate(&self, name: &str) -> bool {
        self.aggregate(name).is_some()
    }

    /// Returns true if calls to `name` must never be cached.
    #[must_use]
    pub fn is_non_deterministic(&self, name: &str) -> bool {
        let upper = name.to_uppercase();
        non_deterministic_builtins().contains(&upper)
            || self
                .scalars
                .get(&upper)
                .is_some_and(|f| !f.is_deterministic())
    }

    /// Returns the number of registered scalar functions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scalars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scalars.is_empty()
    }
}

/// Upper-cased names of the non-deterministic built-ins, computed once per process.
#[must_use]
pub fn non_deterministic_builtins() -> &'static HashSet<String> {
    static NAMES: OnceLock<HashSet<String>> = OnceLock::new();
    NAMES.get_or_init(|| {
        builtin_functions()
            .into_iter()
            .filter(|f| !f.is_deterministic())
            .map(|f| f.name().to_string())
            .collect()
    })
}

// ==================== Built-in Library ====================

fn accepts(actual: &DataType, expected: &DataType) -> bool {
    actual == expected
        || matches!(actual, DataType::Null | DataType::Any)
        || (*expected == DataType::Float64 && *actual == DataType::Int64)
}

fn signature(
    params: Vec<DataType>,
    optional: usize,
    result: DataType,
) -> impl Fn(&[DataType]) -> Option<DataType> + Send + Sync {
    move |args| {
        let arity_ok = args.len() <= params.len() && args.len() + optional >= params.len();
        (arity_ok && args.iter().zip(&params).all(|(a, p)| accepts(a, p))).then(|| result.clone())
    }
}

fn null_in(args: &[Value]) -> bool {
    args.iter().any(Value::is_null)
}

fn type_error(function: &str, args: &[Value]) -> QuarryError {
    let rendered: Vec<String> = args.iter().map(ToString::to_string).collect();
    QuarryError::ExecutionError(format!(
        "{function} cannot be applied to ({})",
        rendered.join(", ")
    ))
}

fn string_fn(
    name: &'static str,
    apply: fn(&str) -> String,
) -> ScalarFunction {
    ScalarFunction::new(name, signature(vec![DataType::String], 0, DataType::String), move |args| {
        match args {
            [Value::Null] => Ok(Value::Null),
            [Value::String(s)] => Ok(Value::String(apply(s))),
            _ => Err(type_error(name, args)),
        }
    })
}

fn length(name: &str, len: usize) -> Result<Value> {
    i64::try_from(len)
        .map(Value::Int64)
        .map_err(|_| QuarryError::ExecutionError(format!("{name} result {len} overflows Int64")))
}

fn builtin_functions() -> Vec<ScalarFunction> {
    vec![
        ScalarFunction::new(
            "LEN",
            |args: &[DataType]| match args {
                [DataType::String | DataType::Array(_) | DataType::Null | DataType::Any] => {
                    Some(DataType::Int64)
                }
                _ => None,
            },
            |args| match args {
                [Value::Null] => Ok(Value::Null),
                [Value::String(s)] => length("LEN", s.chars().count()),
                [Value::Array(items)] => length("LEN", items.len()),
                _ => Err(type_error("LEN", args)),
            },
        ),
        string_fn("UPPER", str::to_uppercase),
        string_fn("LOWER", str::to_lowercase),
        string_fn("TRIM", |s| s.trim().to_string()),
        ScalarFunction::new(
            "ABS",
            |args: &[DataType]| match args {
                [t @ (DataType::Int64 | DataType::Float64 | DataType::Any)] => Some(t.clone()),
                [DataType::Null] => Some(DataType::Null),
                _ => None,
            },
            |args| match args {
                [Value::Null] => Ok(Value::Null),
                [Value::Int64(v)] => v
                    .checked_abs()
                    .map(Value::Int64)
                    .ok_or_else(|| QuarryError::ExecutionError("ABS overflow".into())),
                [Value::Float64(v)] => Ok(Value::Float64(v.abs())),
                _ => Err(type_error("ABS", args)),
            },
        ),
        ScalarFunction::new(
            "ROUND",
            |args: &[DataType]| match args {
                [t] | [t, DataType::Int64 | DataType::Null | DataType::Any]
                    if accepts(t, &DataType::Float64) =>
                {
                    Some(DataType::Float64)
                }
                _ => None,
            },
            |args| {
                if null_in(args) {
                    return Ok(Value::Null);
                }
                let value = args
                    .first()
                    .and_then(Value::as_float64)
                    .ok_or_else(|| type_error("ROUND", args))?;
                let digits = args.get(1).and_then(Value::as_int64).unwrap_or(0);
                let factor = 10f64.powi(digits.clamp(-15, 15) as i32);
                Ok(Value::Float64((value * factor).round() / factor))
            },
        ),
        ScalarFunction::new(
            "CONCAT",
            |_: &[DataType]| Some(DataType::String),
            |args| {
                let mut out = String::new();
                for arg in args {
                    match arg {
                        Value::Null => {}
                        Value::String(s) => out.push_str(s),
                        other => out.push_str(&other.to_string()),
                    }
                }
                Ok(Value::String(out))
            },
        ),
        ScalarFunction::new(
            "COALESCE",
            |args: &[DataType]| (!args.is_empty()).then(|| DataType::common_of(args)),
            |args| Ok(args.iter().find(|v| !v.is_null()).cloned().unwrap_or(Value::Null)),
        ),
        ScalarFunction::new(
            "SUBSTR",
            signature(
                vec![DataType::String, DataType::Int64, DataType::Int64],
                1,
                DataType::String,
            ),
            |args| {
                if null_in(args) {
                    return Ok(Value::Null);
                }
                let (Some(s), Some(start)) = (
                    args.first().and_then(Value::as_string),
                    args.get(1).and_then(Value::as_int64),
                ) else {
                    return Err(type_error("SUBSTR", args));
                };
                let start = usize::try_from(start.max(0)).unwrap_or(0);
                let chars = s.chars().skip(start);
                let out: String = match args.get(2).and_then(Value::as_int64) {
                    Some(len) => chars.take(usize::try_from(len.max(0)).unwrap_or(0)).collect(),
                    None => chars.collect(),
                };
                Ok(Value::String(out))
            },
        ),
        ScalarFunction::new(
            "YEAR",
            signature(vec![DataType::Timestamp], 0, DataType::Int64),
            |args| match args {
                [Value::Null] => Ok(Value::Null),
                [Value::Timestamp(micros)] => DateTime::<Utc>::from_timestamp_micros(*micros)
                    .map(|dt| Value::Int64(i64::from(dt.year())))
                    .ok_or_else(|| type_error("YEAR", args)),
                _ => Err(type_error("YEAR", args)),
            },
        ),
        ScalarFunction::new(
            "TO_STRING",
            |args: &[DataType]| (args.len() == 1).then_some(DataType::String),
            |args| match args {
                [Value::Null] => Ok(Value::Null),
                [Value::String(s)] => Ok(Value::String(s.clone())),
                [other] => Ok(Value::String(other.to_string())),
                _ => Err(type_error("TO_STRING", args)),
            },
        ),
        ScalarFunction::new(
            "NOW",
            signature(Vec::new(), 0, DataType::Timestamp),
            |_| Ok(Value::Timestamp(Utc::now().timestamp_micros())),
        )
        .non_deterministic(),
        ScalarFunction::new(
            "NEWID",
            signature(Vec::new(), 0, DataType::String),
            |_| Ok(Value::String(uuid::Uuid::new_v4().to_string())),
        )
        .non_deterministic(),
    ]
}
