//! Feature sources and sinks.
//!
//! Format adapters normalise whatever they read into [`Feature`] values before
//! anything reaches the engine, and receive plain [`Feature`] records back.

use crate::error::Result;
use crate::feature::Feature;
use crate::schema::Schema;
use std::collections::VecDeque;

/// A stream of features with a known schema.
pub trait FeatureSource {
    /// Attribute schema and geometry type of the stream.
    fn schema(&self) -> &Schema;

    /// Next feature, `None` at the end of the stream.
    fn next_feature(&mut self) -> Result<Option<Feature>>;

    /// Number of features left, when known. Used for progress reporting only.
    fn len_hint(&self) -> Option<usize> {
        None
    }
}

/// Receives output records.
pub trait FeatureSink {
    /// Declare the output schema. Called once, before the first write.
    fn begin(&mut self, schema: &Schema) -> Result<()>;

    fn write(&mut self, feature: Feature) -> Result<()>;

    /// Flush everything written. Called once after the last write.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// In-memory source.
#[derive(Debug, Clone)]
pub struct MemorySource {
    schema: Schema,
    features: VecDeque<Feature>,
}

impl MemorySource {
    pub fn new(schema: Schema, features: Vec<Feature>) -> Self {
        Self {
            schema,
            features: features.into(),
        }
    }
}

impl FeatureSource for MemorySource {
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

/// In-memory sink.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub schema: Option<Schema>,
    pub features: Vec<Feature>,
    pub finished: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Output record whose property `field` equals `value`.
    pub fn find(&self, field: &str, value: &crate::value::Value) -> Option<&Feature> {
        self.features.iter().find(|f| f.get(field) == value)
    }
}

impl FeatureSink for MemorySink {
    fn begin(&mut self, schema: &Schema) -> Result<()> {
        self.schema = Some(schema.clone());
        Ok(())
    }

    fn write(&mut self, feature: Feature) -> Result<()> {
        self.features.push(feature);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}
