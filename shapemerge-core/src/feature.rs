//! The feature record every source is normalised into.

use crate::value::Value;
use geo_types::Geometry;
use shapemerge_spatial::GeometryType;
use std::collections::BTreeMap;

static NULL: Value = Value::Null;

/// A geometry plus its named attributes.
///
/// `id` is the position of the feature in its source stream. The geometry is
/// only ever read; geometric operations return new geometries.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: u64,
    pub geometry: Geometry<f64>,
    pub properties: BTreeMap<String, Value>,
}

impl Feature {
    pub fn new(id: u64, geometry: Geometry<f64>) -> Self {
        Self {
            id,
            geometry,
            properties: BTreeMap::new(),
        }
    }

    /// Builder-style property setter.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Value of `field`, [`Value::Null`] when absent.
    ///
    /// Lookups are exact; resolve names against the schema first.
    pub fn get(&self, field: &str) -> &Value {
        self.properties.get(field).unwrap_or(&NULL)
    }

    pub fn geometry_type(&self) -> GeometryType {
        GeometryType::from_geometry(&self.geometry)
    }
}
