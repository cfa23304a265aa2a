//! Reduction operators.
//!
//! Every operator is a pure function over the non-empty sequence of values a
//! collector observed for one group, paired with the rule that decides its
//! output field type. The sequence may hold nulls: `count`, `first` and
//! `last` see them, the numeric reductions and `join` skip them.

use crate::error::ConfigError;
use crate::value::{FieldType, Value};

/// Separator used by `join`.
pub const JOIN_SEPARATOR: &str = ",";

/// How an operator's output field type is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputType {
    /// Fixed type regardless of input.
    Declared(FieldType),
    /// Same type as the input field.
    InheritInput,
}

/// A named reduction.
#[derive(Debug, Clone, Copy)]
pub struct Operator {
    pub name: &'static str,
    pub reduce: fn(&[Value]) -> Value,
    pub output: OutputType,
    /// Input field must be `int` or `float`.
    pub requires_numeric: bool,
}

/// The operator table.
pub const OPERATORS: &[Operator] = &[
    Operator {
        name: "sum",
        reduce: agg_sum,
        output: OutputType::Declared(FieldType::Float),
        requires_numeric: true,
    },
    Operator {
        name: "min",
        reduce: agg_min,
        output: OutputType::Declared(FieldType::Float),
        requires_numeric: true,
    },
    Operator {
        name: "max",
        reduce: agg_max,
        output: OutputType::Declared(FieldType::Float),
        requires_numeric: true,
    },
    Operator {
        name: "count",
        reduce: agg_count,
        output: OutputType::Declared(FieldType::Integer),
        requires_numeric: false,
    },
    Operator {
        name: "avg",
        reduce: agg_avg,
        output: OutputType::Declared(FieldType::Float),
        requires_numeric: true,
    },
    Operator {
        name: "join",
        reduce: agg_join,
        output: OutputType::Declared(FieldType::String),
        requires_numeric: false,
    },
    Operator {
        name: "first",
        reduce: agg_first,
        output: OutputType::InheritInput,
        requires_numeric: false,
    },
    Operator {
        name: "last",
        reduce: agg_last,
        output: OutputType::InheritInput,
        requires_numeric: false,
    },
];

impl Operator {
    /// Find an operator by name (trimmed, case-insensitive).
    pub fn lookup(name: &str) -> Result<&'static Operator, ConfigError> {
        let wanted = name.trim().to_lowercase();
        OPERATORS
            .iter()
            .find(|op| op.name == wanted)
            .ok_or_else(|| ConfigError::UnknownOperator {
                name: name.trim().to_string(),
                available: Self::names(),
            })
    }

    /// Names of all operators, in table order.
    pub fn names() -> Vec<String> {
        OPERATORS.iter().map(|op| op.name.to_string()).collect()
    }

    /// Output field type for an input field of `input` type.
    pub fn output_type(&self, input: FieldType) -> FieldType {
        match self.output {
            OutputType::Declared(t) => t,
            OutputType::InheritInput => input,
        }
    }

    /// Reduce `values`; an empty sequence reduces to null.
    pub fn apply(&self, values: &[Value]) -> Value {
        if values.is_empty() {
            Value::Null
        } else {
            (self.reduce)(values)
        }
    }
}

/// SUM - arithmetic sum
fn agg_sum(values: &[Value]) -> Value {
    let numbers = extract_numbers(values);
    if numbers.is_empty() {
        return Value::Null;
    }
    Value::Float(numbers.iter().sum())
}

/// MIN - numeric minimum
fn agg_min(values: &[Value]) -> Value {
    extract_numbers(values)
        .into_iter()
        .reduce(f64::min)
        .map(Value::Float)
        .unwrap_or(Value::Null)
}

/// MAX - numeric maximum
fn agg_max(values: &[Value]) -> Value {
    extract_numbers(values)
        .into_iter()
        .reduce(f64::max)
        .map(Value::Float)
        .unwrap_or(Value::Null)
}

/// COUNT - number of observations
fn agg_count(values: &[Value]) -> Value {
    Value::Integer(values.len() as i64)
}

/// AVG - sum / length
fn agg_avg(values: &[Value]) -> Value {
    let numbers = extract_numbers(values);
    if numbers.is_empty() {
        return Value::Null;
    }
    let sum: f64 = numbers.iter().sum();
    Value::Float(sum / numbers.len() as f64)
}

/// JOIN - string-coerced values separated by `,`
fn agg_join(values: &[Value]) -> Value {
    let strings: Vec<String> = values.iter().filter_map(Value::to_display_string).collect();
    if strings.is_empty() {
        return Value::Null;
    }
    Value::String(strings.join(JOIN_SEPARATOR))
}

/// FIRST - first observed
fn agg_first(values: &[Value]) -> Value {
    values.first().cloned().unwrap_or(Value::Null)
}

/// LAST - last observed
fn agg_last(values: &[Value]) -> Value {
    values.last().cloned().unwrap_or(Value::Null)
}

/// Numeric values as f64
fn extract_numbers(values: &[Value]) -> Vec<f64> {
    values.iter().filter_map(Value::as_f64).collect()
}
