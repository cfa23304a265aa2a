//! GeoJSON source and sink.
//!
//! A dataset's attribute schema travels with the file as a `"schema"` foreign
//! member of the FeatureCollection:
//!
//! ```json
//! { "type": "FeatureCollection",
//!   "schema": { "geometry": "Polygon", "properties": { "REGION": "str", "POP": "int" } },
//!   "features": [ ... ] }
//! ```
//!
//! Field types may carry a width suffix (`"str:80"`, `"float:24.15"`), which is
//! ignored. Files without the member get a schema inferred from the
//! properties actually present.

use crate::error::{Error, Result};
use crate::feature::Feature;
use crate::schema::Schema;
use crate::source::{FeatureSink, FeatureSource};
use crate::value::{FieldType, Value};
use ::geojson::{FeatureCollection, GeoJson, JsonObject};
use shapemerge_spatial::GeometryType;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

/// Name of the foreign member holding the schema.
pub const SCHEMA_MEMBER: &str = "schema";

/// Features read from a GeoJSON document.
///
/// Features with a null geometry are dropped while reading. Feature ids are
/// positions in the file's feature array.
#[derive(Debug)]
pub struct GeoJsonSource {
    schema: Schema,
    features: VecDeque<Feature>,
    dropped: usize,
}

impl GeoJsonSource {
    /// Read the file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "opening GeoJSON source");
        Self::from_reader(File::open(path)?)
    }

    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Self::parse(&text)
    }

    /// Parse a FeatureCollection or a single Feature.
    pub fn parse(text: &str) -> Result<Self> {
        let (features, foreign_members) = match text.parse::<GeoJson>()? {
            GeoJson::FeatureCollection(fc) => (fc.features, fc.foreign_members),
            GeoJson::Feature(f) => (vec![f], None),
            GeoJson::Geometry(_) => {
                return Err(Error::GeoJson(
                    "expected a Feature or FeatureCollection, found a bare geometry".to_string(),
                ))
            }
        };

        let declared = foreign_members
            .as_ref()
            .and_then(|members| members.get(SCHEMA_MEMBER))
            .map(schema_from_json)
            .transpose()?;

        let mut rows = Vec::with_capacity(features.len());
        let mut dropped = 0;
        for (position, feature) in features.into_iter().enumerate() {
            let Some(geometry) = feature.geometry else {
                dropped += 1;
                tracing::debug!(feature = position, "dropping feature with null geometry");
                continue;
            };
            let geometry = geo_types::Geometry::<f64>::try_from(geometry)?;
            rows.push((position as u64, geometry, feature.properties.unwrap_or_default()));
        }

        let schema = match declared {
            Some(schema) => schema,
            None => infer_schema(&rows),
        };

        let features: VecDeque<Feature> = rows
            .into_iter()
            .map(|(id, geometry, properties)| {
                let mut feature = Feature::new(id, geometry);
                for (name, json) in &properties {
                    let value = Value::from(json);
                    let value = match schema.field_type(name) {
                        Some(field_type) => value.coerce_to(field_type),
                        None => value,
                    };
                    feature.properties.insert(name.clone(), value);
                }
                feature
            })
            .collect();

        tracing::info!(
            features = features.len(),
            dropped,
            declared_schema = declared_flag(&foreign_members),
            "original schema: {}",
            schema
        );

        Ok(Self {
            schema,
            features,
            dropped,
        })
    }

    /// Features dropped for having no geometry.
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

fn declared_flag(members: &Option<JsonObject>) -> bool {
    members
        .as_ref()
        .is_some_and(|m| m.contains_key(SCHEMA_MEMBER))
}

impl FeatureSource for GeoJsonSource {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn next_feature(&mut self) -> Result<Option<Feature>> {
        Ok(self.features.pop_front())
    }

    fn len_hint(&self) -> Option<usize> {
        Some(self.features.len())
    }
}

/// Parse a field type name, ignoring any `:width` suffix.
fn parse_field_type(name: &str) -> Option<FieldType> {
    let base = name.split(':').next().unwrap_or(name).trim();
    match base.to_lowercase().as_str() {
        "int" | "integer" | "long" => Some(FieldType::Integer),
        "float" | "double" | "real" => Some(FieldType::Float),
        "str" | "string" | "text" => Some(FieldType::String),
        "bool" | "boolean" => Some(FieldType::Boolean),
        _ => None,
    }
}

fn schema_from_json(json: &serde_json::Value) -> Result<Schema> {
    let invalid = |msg: String| Error::GeoJson(format!("invalid \"{}\" member: {}", SCHEMA_MEMBER, msg));

    let object = json
        .as_object()
        .ok_or_else(|| invalid("expected an object".to_string()))?;
    let geometry = object
        .get("geometry")
        .and_then(|g| g.as_str())
        .ok_or_else(|| invalid("missing \"geometry\"".to_string()))?;
    let mut schema = Schema::new(geometry);

    if let Some(properties) = object.get("properties") {
        let properties = properties
            .as_object()
            .ok_or_else(|| invalid("\"properties\" must be an object".to_string()))?;
        for (name, type_name) in properties {
            let field_type = type_name
                .as_str()
                .and_then(parse_field_type)
                .ok_or_else(|| invalid(format!("unknown type {} for field {}", type_name, name)))?;
            schema.push(name.clone(), field_type);
        }
    }
    Ok(schema)
}

fn schema_to_json(schema: &Schema) -> serde_json::Value {
    let properties: JsonObject = schema
        .fields
        .iter()
        .map(|(name, ty)| (name.clone(), serde_json::Value::from(ty.as_str())))
        .collect();
    serde_json::json!({
        "geometry": schema.geometry_type,
        "properties": properties,
    })
}

/// Schema from the properties present, in first-appearance order.
///
/// Integer and float observations widen to float; any other mix, and fields
/// that are only ever null, become strings.
fn infer_schema(rows: &[(u64, geo_types::Geometry<f64>, JsonObject)]) -> Schema {
    let geometry_type = rows
        .first()
        .map(|(_, g, _)| GeometryType::from_geometry(g).as_str())
        .unwrap_or("Unknown");

    let mut observed: Vec<(String, Option<FieldType>)> = Vec::new();
    for (_, _, properties) in rows {
        for (name, json) in properties {
            let seen = Value::from(json).field_type();
            match observed.iter_mut().find(|(n, _)| n == name) {
                Some((_, current)) => *current = widen(*current, seen),
                None => observed.push((name.clone(), seen)),
            }
        }
    }

    let mut schema = Schema::new(geometry_type);
    for (name, field_type) in observed {
        schema.push(name, field_type.unwrap_or(FieldType::String));
    }
    schema
}

fn widen(current: Option<FieldType>, seen: Option<FieldType>) -> Option<FieldType> {
    match (current, seen) {
        (None, t) | (t, None) => t,
        (Some(a), Some(b)) if a == b => Some(a),
        (Some(a), Some(b)) if a.is_numeric() && b.is_numeric() => Some(FieldType::Float),
        _ => Some(FieldType::String),
    }
}

/// Writes output records as one FeatureCollection.
///
/// Records are buffered and written by [`FeatureSink::finish`], with the
/// declared output schema as the `"schema"` foreign member.
pub struct GeoJsonSink<W: Write> {
    writer: W,
    schema: Option<Schema>,
    features: Vec<::geojson::Feature>,
}

impl GeoJsonSink<BufWriter<File>> {
    /// Create (or truncate) the file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> GeoJsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            schema: None,
            features: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> FeatureSink for GeoJsonSink<W> {
    fn begin(&mut self, schema: &Schema) -> Result<()> {
        self.schema = Some(schema.clone());
        Ok(())
    }

    fn write(&mut self, feature: Feature) -> Result<()> {
        let mut properties = JsonObject::new();
        let mut rest = feature.properties;
        // Schema fields first, in schema order.
        if let Some(schema) = &self.schema {
            for (name, _) in &schema.fields {
                if let Some(value) = rest.remove(name) {
                    properties.insert(name.clone(), value.to_json());
                }
            }
        }
        for (name, value) in rest {
            properties.insert(name, value.to_json());
        }

        self.features.push(::geojson::Feature {
            bbox: None,
            geometry: Some(::geojson::Geometry::new(::geojson::Value::from(
                &feature.geometry,
            ))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        });
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let mut foreign_members = JsonObject::new();
        if let Some(schema) = &self.schema {
            foreign_members.insert(SCHEMA_MEMBER.to_string(), schema_to_json(schema));
        }
        let collection = FeatureCollection {
            bbox: None,
            features: std::mem::take(&mut self.features),
            foreign_members: Some(foreign_members),
        };
        serde_json::to_writer(&mut self.writer, &collection).map_err(std::io::Error::from)?;
        self.writer.flush()?;
        Ok(())
    }
}
