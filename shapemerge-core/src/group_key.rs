//! Canonical group keys.
//!
//! A key is the compact JSON text of the sorted `field → value` map of a
//! feature's group-by values. Equal values always serialize to identical
//! bytes, and values of different types never collide (`1`, `1.0` and `"1"`
//! are three distinct keys).

use crate::error::{Error, Result};
use crate::feature::Feature;
use crate::schema::ResolvedField;
use crate::value::Value;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

/// Key text shared by every feature in all-in-one mode.
pub const ALL_IN_ONE_KEY: &str = "{}";

/// Canonical identity of a group bucket.
///
/// Equality and hashing use the serialized text only.
#[derive(Debug, Clone)]
pub struct GroupKey {
    text: String,
    values: BTreeMap<String, Value>,
}

impl GroupKey {
    fn from_values(values: BTreeMap<String, Value>) -> Self {
        let object: serde_json::Map<String, serde_json::Value> =
            values.iter().map(|(k, v)| (k.clone(), key_json(v))).collect();
        Self {
            text: serde_json::Value::Object(object).to_string(),
            values,
        }
    }

    /// Serialized key text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Group-by values, used to seed the output record.
    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }
}

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for GroupKey {}

impl Hash for GroupKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

/// JSON for one key value.
///
/// Non-finite floats have no JSON number form; they are tagged as
/// `{"float":"NaN"}`, `{"float":"inf"}` or `{"float":"-inf"}` so they stay
/// distinct from each other and from every scalar.
fn key_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Float(n) if !n.is_finite() => {
            let mut tagged = serde_json::Map::new();
            tagged.insert("float".to_string(), serde_json::Value::String(n.to_string()));
            serde_json::Value::Object(tagged)
        }
        other => other.to_json(),
    }
}

/// Builds [`GroupKey`]s from resolved group-by fields.
#[derive(Debug, Clone)]
pub struct GroupKeyBuilder {
    fields: Vec<ResolvedField>,
}

impl GroupKeyBuilder {
    pub fn new(fields: Vec<ResolvedField>) -> Self {
        Self { fields }
    }

    /// Builder that puts every feature into one group.
    pub fn all_in_one() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn fields(&self) -> &[ResolvedField] {
        &self.fields
    }

    pub fn is_all_in_one(&self) -> bool {
        self.fields.is_empty()
    }

    /// Key for `feature`.
    ///
    /// Fails with [`Error::MissingGroupField`] when any group-by value is null
    /// or an empty string.
    pub fn build(&self, feature: &Feature) -> Result<GroupKey> {
        let mut values = BTreeMap::new();
        for field in &self.fields {
            let value = feature.get(&field.name);
            if value.is_missing() {
                return Err(Error::MissingGroupField {
                    feature: feature.id,
                    field: field.name.clone(),
                });
            }
            values.insert(field.name.clone(), value.clone());
        }
        Ok(GroupKey::from_values(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::FieldType;
    use geo_types::{Geometry, Point};

    fn field(name: &str, field_type: FieldType) -> ResolvedField {
        ResolvedField {
            name: name.to_string(),
            field_type,
        }
    }

    fn feature(id: u64) -> Feature {
        Feature::new(id, Geometry::Point(Point::new(0.0, 0.0)))
    }

    #[test]
    fn test_equal_values_give_identical_keys() {
        let builder = GroupKeyBuilder::new(vec![
            field("REGION", FieldType::String),
            field("CODE", FieldType::Integer),
        ]);
        let a = feature(0)
            .with_property("REGION", "A")
            .with_property("CODE", 7i64)
            .with_property("POP", 10i64);
        let b = feature(1)
            .with_property("CODE", 7i64)
            .with_property("REGION", "A")
            .with_property("POP", 99i64);

        let ka = builder.build(&a).unwrap();
        let kb = builder.build(&b).unwrap();
        assert_eq!(ka.as_str().as_bytes(), kb.as_str().as_bytes());
        assert_eq!(ka.as_str(), r#"{"CODE":7,"REGION":"A"}"#);
        assert_eq!(ka.values().get("REGION"), Some(&Value::from("A")));
    }

    #[test]
    fn test_types_do_not_collide() {
        let builder = GroupKeyBuilder::new(vec![field("K", FieldType::String)]);
        let keys: Vec<String> = [Value::Integer(1), Value::Float(1.5), Value::from("1")]
            .into_iter()
            .map(|v| {
                builder
                    .build(&feature(0).with_property("K", v))
                    .unwrap()
                    .as_str()
                    .to_string()
            })
            .collect();
        assert_ne!(keys[0], keys[1]);
        assert_ne!(keys[0], keys[2]);
        assert_ne!(keys[1], keys[2]);
    }

    #[test]
    fn test_non_finite_floats_stay_distinct() {
        let builder = GroupKeyBuilder::new(vec![field("K", FieldType::Float)]);
        let key = |v: f64| {
            builder
                .build(&feature(0).with_property("K", v))
                .unwrap()
                .as_str()
                .to_string()
        };
        assert_eq!(key(f64::NAN), r#"{"K":{"float":"NaN"}}"#);
        assert_eq!(key(f64::INFINITY), r#"{"K":{"float":"inf"}}"#);
        assert_eq!(key(f64::NEG_INFINITY), r#"{"K":{"float":"-inf"}}"#);
        assert_eq!(key(f64::NAN), key(f64::NAN));

        let text = builder
            .build(&feature(1).with_property("K", "NaN"))
            .unwrap();
        assert_ne!(text.as_str(), key(f64::NAN));
    }

    #[test]
    fn test_missing_value_is_fatal() {
        let builder = GroupKeyBuilder::new(vec![field("REGION", FieldType::String)]);
        let err = builder.build(&feature(4)).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingGroupField { feature: 4, ref field } if field == "REGION"
        ));

        let empty = feature(5).with_property("REGION", "");
        assert!(builder.build(&empty).is_err());
    }

    #[test]
    fn test_zero_is_a_value() {
        let builder = GroupKeyBuilder::new(vec![field("CODE", FieldType::Integer)]);
        let key = builder
            .build(&feature(0).with_property("CODE", 0i64))
            .unwrap();
        assert_eq!(key.as_str(), r#"{"CODE":0}"#);
    }

    #[test]
    fn test_all_in_one_sentinel() {
        let builder = GroupKeyBuilder::all_in_one();
        let a = builder.build(&feature(0).with_property("X", 1i64)).unwrap();
        let b = builder.build(&feature(1)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), ALL_IN_ONE_KEY);
        assert!(a.values().is_empty());
    }
}
