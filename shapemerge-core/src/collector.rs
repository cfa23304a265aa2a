//! Collectors: per-group reductions of one input field.
//!
//! A collector binds `(input field, operator, output field)` and records, per
//! group key, the input values of every feature observed for that group.
//! Observations keep insertion order, which is the order the pipeline sees
//! features: stream order when dissolving, match discovery order when
//! matching points. Neither is guaranteed to be a spatial or logical order,
//! so `first`/`last` are only as deterministic as the input stream.

use crate::error::ConfigError;
use crate::feature::Feature;
use crate::operator::Operator;
use crate::schema::{FieldResolver, ResolvedField, Schema};
use crate::value::{FieldType, Value};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

/// Unbound collector configuration in `input:op[:output]` form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CollectorSpec {
    pub input: String,
    pub operator: String,
    /// Defaults to the resolved input field name.
    pub output: Option<String>,
}

impl CollectorSpec {
    pub fn new(input: impl Into<String>, operator: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            operator: operator.into(),
            output: None,
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }
}

impl FromStr for CollectorSpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').map(str::trim).collect();
        let invalid = || ConfigError::InvalidCollectorSpec(s.to_string());
        match parts.as_slice() {
            [input, op] if !input.is_empty() && !op.is_empty() => Ok(Self::new(*input, *op)),
            [input, op, output] if !input.is_empty() && !op.is_empty() && !output.is_empty() => {
                Ok(Self::new(*input, *op).with_output(*output))
            }
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for CollectorSpec {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<CollectorSpec> for String {
    fn from(spec: CollectorSpec) -> Self {
        spec.to_string()
    }
}

impl fmt::Display for CollectorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.input, self.operator)?;
        if let Some(output) = &self.output {
            write!(f, ":{}", output)?;
        }
        Ok(())
    }
}

/// A bound collector with its per-key observations.
#[derive(Debug, Clone)]
pub struct Collector<K> {
    input: ResolvedField,
    operator: &'static Operator,
    output: String,
    matches: FxHashMap<K, Vec<Value>>,
}

impl<K: Eq + Hash + Clone> Collector<K> {
    pub fn input(&self) -> &ResolvedField {
        &self.input
    }

    pub fn operator(&self) -> &'static Operator {
        self.operator
    }

    pub fn output_field(&self) -> &str {
        &self.output
    }

    pub fn output_type(&self) -> FieldType {
        self.operator.output_type(self.input.field_type)
    }

    /// Append `value` to the observations for `key`.
    ///
    /// Nulls are recorded too: `count` sees every match, and the reductions
    /// that need values skip them.
    pub fn record(&mut self, key: &K, value: &Value) {
        match self.matches.get_mut(key) {
            Some(list) => list.push(value.clone()),
            None => {
                self.matches.insert(key.clone(), vec![value.clone()]);
            }
        }
    }

    /// Observations for `key` in insertion order.
    pub fn observations(&self, key: &K) -> &[Value] {
        self.matches.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Reduced value for `key`, null when nothing was observed.
    pub fn output_value(&self, key: &K) -> Value {
        self.operator.apply(self.observations(key))
    }
}

/// The collectors of one run, all keyed by `K`.
#[derive(Debug, Clone)]
pub struct CollectorSet<K> {
    collectors: Vec<Collector<K>>,
}

impl<K: Eq + Hash + Clone> Default for CollectorSet<K> {
    fn default() -> Self {
        Self {
            collectors: Vec::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> CollectorSet<K> {
    /// Validate and bind `specs` against `schema`.
    ///
    /// `reserved` lists output names already taken by the run (group-by or
    /// copied fields); collisions are compared case-insensitively. Nothing is
    /// recorded until every spec has bound successfully.
    pub fn bind(
        specs: &[CollectorSpec],
        schema: &Schema,
        reserved: &[String],
    ) -> Result<Self, ConfigError> {
        let resolver = FieldResolver::new(schema);
        let reserved: FxHashSet<String> = reserved.iter().map(|r| r.to_uppercase()).collect();
        let mut seen_outputs: FxHashSet<String> = FxHashSet::default();
        let mut collectors = Vec::with_capacity(specs.len());

        for spec in specs {
            let operator = Operator::lookup(&spec.operator)?;
            let input = resolver.resolve(&spec.input)?;

            if operator.requires_numeric && !input.field_type.is_numeric() {
                return Err(ConfigError::NonNumericInput {
                    operator: operator.name.to_string(),
                    field: input.name.clone(),
                    field_type: input.field_type.to_string(),
                });
            }

            let output = match &spec.output {
                Some(o) => o.trim().to_string(),
                None => input.name.clone(),
            };
            let folded = output.to_uppercase();
            if reserved.contains(&folded) {
                return Err(ConfigError::OutputCollision(output));
            }
            if !seen_outputs.insert(folded) {
                return Err(ConfigError::DuplicateOutput(output));
            }

            tracing::info!(
                input = %input.name,
                output = %output,
                operator = operator.name,
                "collecting {} into {} with operator {}",
                input.name,
                output,
                operator.name
            );
            collectors.push(Collector {
                input,
                operator,
                output,
                matches: FxHashMap::default(),
            });
        }

        Ok(Self { collectors })
    }

    pub fn collectors(&self) -> &[Collector<K>] {
        &self.collectors
    }

    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    /// Output field names, in configuration order.
    pub fn output_fields(&self) -> impl Iterator<Item = &str> {
        self.collectors.iter().map(|c| c.output_field())
    }

    /// Record `feature`'s input values under `key` for every collector.
    pub fn record_match(&mut self, key: &K, feature: &Feature) {
        for collector in &mut self.collectors {
            let value = feature.get(&collector.input.name);
            collector.record(key, value);
        }
    }

    /// Reduced value of output field `field` for `key`.
    ///
    /// Null when no collector writes `field` or nothing was observed.
    pub fn output_value(&self, key: &K, field: &str) -> Value {
        self.collectors
            .iter()
            .find(|c| c.output == field)
            .map(|c| c.output_value(key))
            .unwrap_or(Value::Null)
    }

    /// Write every collector's output for `key` into `properties`.
    pub fn output_into(&self, key: &K, properties: &mut BTreeMap<String, Value>) {
        for collector in &self.collectors {
            properties.insert(collector.output.clone(), collector.output_value(key));
        }
    }

    /// Append the output fields and their resolved types to `schema`.
    pub fn extend_schema(&self, schema: &mut Schema) {
        for collector in &self.collectors {
            schema.push(collector.output.clone(), collector.output_type());
        }
    }
}
