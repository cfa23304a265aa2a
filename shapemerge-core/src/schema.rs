//! Dataset schemas and case-insensitive field resolution.

use crate::error::ConfigError;
use crate::value::FieldType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered attribute schema plus the geometry type of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub geometry_type: String,
    pub fields: Vec<(String, FieldType)>,
}

impl Schema {
    pub fn new(geometry_type: impl Into<String>) -> Self {
        Self {
            geometry_type: geometry_type.into(),
            fields: Vec::new(),
        }
    }

    /// Builder-style field append.
    pub fn with_field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.push(name, field_type);
        self
    }

    pub fn with_geometry_type(mut self, geometry_type: impl Into<String>) -> Self {
        self.geometry_type = geometry_type.into();
        self
    }

    /// Append a field, replacing the type if the exact name already exists.
    pub fn push(&mut self, name: impl Into<String>, field_type: FieldType) {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = field_type,
            None => self.fields.push((name, field_type)),
        }
    }

    /// Type of an exactly-named field.
    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| *t)
    }

    pub fn names(&self) -> Vec<String> {
        self.fields.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{", self.geometry_type)?;
        for (i, (name, ty)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", name, ty)?;
        }
        f.write_str("}")
    }
}

/// A field name fixed to its canonical spelling in a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedField {
    pub name: String,
    pub field_type: FieldType,
}

/// Resolves user-supplied field names against a schema.
///
/// Matching ignores case and surrounding whitespace. Exactly one schema field
/// must match.
#[derive(Debug, Clone, Copy)]
pub struct FieldResolver<'a> {
    schema: &'a Schema,
}

impl<'a> FieldResolver<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    pub fn resolve(&self, name: &str) -> Result<ResolvedField, ConfigError> {
        let wanted = name.trim().to_uppercase();
        let matches: Vec<&(String, FieldType)> = self
            .schema
            .fields
            .iter()
            .filter(|(n, _)| n.to_uppercase() == wanted)
            .collect();

        match matches.as_slice() {
            [] => Err(ConfigError::UnknownField {
                name: name.trim().to_string(),
                available: self.schema.names(),
            }),
            [(n, t)] => Ok(ResolvedField {
                name: n.clone(),
                field_type: *t,
            }),
            many => Err(ConfigError::AmbiguousField {
                name: name.trim().to_string(),
                matches: many.iter().map(|(n, _)| n.clone()).collect(),
            }),
        }
    }

    pub fn resolve_all<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<ResolvedField>, ConfigError> {
        names.iter().map(|n| self.resolve(n.as_ref())).collect()
    }
}
