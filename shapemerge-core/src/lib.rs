//! # shapemerge-core
//!
//! Attribute grouping, aggregation and spatial matching over geographic
//! features.
//!
//! Two modes share one collector framework:
//!
//! - **Dissolve**: bucket polygons by canonical [`GroupKey`], repair invalid
//!   members, union each bucket and reduce collector fields per bucket
//! - **Point match**: index polygon boxes, match every point (optionally
//!   buffered by a radius) with an exact `intersects` refinement and reduce the
//!   matched points' fields onto each polygon
//!
//! Geometric work is delegated to a [`GeometryService`]; reading and writing
//! datasets goes through [`FeatureSource`] and [`FeatureSink`].
//!
//! ```
//! use geo_types::{Geometry, Polygon, LineString};
//! use shapemerge_core::{
//!     DissolveConfig, DissolvePipeline, Feature, FieldType, MemorySink,
//!     MemorySource, Schema,
//! };
//! use shapemerge_spatial::GeoKernel;
//!
//! let square = |x: f64| {
//!     Geometry::Polygon(Polygon::new(
//!         LineString::from(vec![(x, 0.0), (x + 1.0, 0.0), (x + 1.0, 1.0), (x, 1.0), (x, 0.0)]),
//!         vec![],
//!     ))
//! };
//! let schema = Schema::new("Polygon")
//!     .with_field("REGION", FieldType::String)
//!     .with_field("POP", FieldType::Integer);
//! let mut source = MemorySource::new(
//!     schema,
//!     vec![
//!         Feature::new(0, square(0.0)).with_property("REGION", "A").with_property("POP", 5i64),
//!         Feature::new(1, square(1.0)).with_property("REGION", "A").with_property("POP", 7i64),
//!     ],
//! );
//! let config = DissolveConfig::default()
//!     .with_group_by(["region"])
//!     .with_collector("pop:sum:total".parse().unwrap());
//! let kernel = GeoKernel::new();
//! let mut sink = MemorySink::new();
//! let report = DissolvePipeline::new(config, &kernel).run(&mut source, &mut sink).unwrap();
//! assert_eq!(report.emitted, 1);
//! assert_eq!(sink.features[0].get("total").as_f64(), Some(12.0));
//! ```

pub mod collector;
pub mod dissolve;
pub mod error;
pub mod feature;
pub mod geojson;
pub mod group_key;
pub mod operator;
pub mod pipeline;
pub mod schema;
pub mod source;
pub mod value;

pub use collector::{Collector, CollectorSet, CollectorSpec};
pub use dissolve::{DissolveStats, Dissolver};
pub use error::{ConfigError, Error, Result};
pub use feature::Feature;
pub use crate::geojson::{GeoJsonSink, GeoJsonSource};
pub use group_key::{GroupKey, GroupKeyBuilder};
pub use operator::{Operator, OutputType};
pub use pipeline::{
    DissolveConfig, DissolvePipeline, DissolveReport, PointMatchConfig, PointMatchPipeline,
    PointMatchReport, PointMatcher,
};
pub use schema::{FieldResolver, ResolvedField, Schema};
pub use source::{FeatureSink, FeatureSource, MemorySink, MemorySource};
pub use value::{FieldType, Value};

pub use shapemerge_spatial::GeometryService;
