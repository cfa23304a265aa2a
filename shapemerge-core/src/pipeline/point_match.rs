//! Point-match mode: aggregate point attributes onto the polygons they fall
//! in (or near).
//!
//! State machine:
//!
//! ```text
//! PointMatchConfig ──build()──► PointMatcher ──record(point)*──► finish(sink)
//!                  (index built)           (queried)          (finalized)
//! ```
//!
//! The polygon index is immutable once built. Every polygon a point
//! intersects receives the point's observation; there is no first-match-wins.

use crate::collector::{CollectorSet, CollectorSpec};
use crate::error::{ConfigError, Result};
use crate::feature::Feature;
use crate::operator::Operator;
use crate::schema::{FieldResolver, ResolvedField, Schema};
use crate::source::{FeatureSink, FeatureSource};
use crate::value::Value;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use shapemerge_spatial::{
    meters_to_degrees, GeoKernel, GeometryService, IndexConfig, SpatialIndex,
    SpatialIndexBuilder, DEFAULT_QUADRANT_SEGMENTS,
};
use std::collections::BTreeMap;
use std::fmt;

const POLYGON_PROGRESS_INTERVAL: usize = 1000;
const POINT_PROGRESS_INTERVAL: usize = 100;

/// Point-match configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointMatchConfig {
    /// Collectors over point fields.
    pub collectors: Vec<CollectorSpec>,

    /// Match radius in metres. `None` tests the bare point.
    ///
    /// Converted to coordinate degrees with a fixed factor, see
    /// [`shapemerge_spatial::METERS_PER_DEGREE`].
    pub match_radius: Option<f64>,

    /// Polygon fields copied to the output.
    pub copied_polygon_fields: Vec<String>,

    /// Segments per quarter circle when buffering points into discs.
    pub disc_segments: usize,

    pub index: IndexConfig,

    /// Run point queries on the rayon pool.
    pub parallel: bool,
}

impl Default for PointMatchConfig {
    fn default() -> Self {
        Self {
            collectors: Vec::new(),
            match_radius: None,
            copied_polygon_fields: Vec::new(),
            disc_segments: DEFAULT_QUADRANT_SEGMENTS,
            index: IndexConfig::default(),
            parallel: false,
        }
    }
}

impl PointMatchConfig {
    pub fn with_collector(mut self, spec: CollectorSpec) -> Self {
        self.collectors.push(spec);
        self
    }

    pub fn with_match_radius(mut self, meters: f64) -> Self {
        self.match_radius = Some(meters);
        self
    }

    pub fn with_copied_polygon_fields<S: Into<String>>(
        mut self,
        fields: impl IntoIterator<Item = S>,
    ) -> Self {
        self.copied_polygon_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_disc_segments(mut self, segments: usize) -> Self {
        self.disc_segments = segments;
        self
    }

    pub fn with_index(mut self, index: IndexConfig) -> Self {
        self.index = index;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if let Some(radius) = self.match_radius {
            if !radius.is_finite() || radius <= 0.0 {
                return Err(ConfigError::InvalidOption {
                    name: "match_radius".to_string(),
                    reason: format!("must be a positive distance, got {}", radius),
                });
            }
        }
        for spec in &self.collectors {
            Operator::lookup(&spec.operator)?;
        }
        if self.disc_segments == 0 {
            return Err(ConfigError::InvalidOption {
                name: "disc_segments".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        self.index
            .validate()
            .map_err(|e| ConfigError::InvalidOption {
                name: "index".to_string(),
                reason: e.to_string(),
            })
    }

    /// Geometry kernel with this configuration's disc resolution.
    pub fn kernel(&self) -> GeoKernel {
        GeoKernel::new().with_quadrant_segments(self.disc_segments)
    }
}

/// Counters from a point-match run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PointMatchReport {
    pub polygons: usize,
    /// Polygons with no bounding box (never matchable).
    pub unindexed_polygons: usize,
    pub points_seen: usize,
    /// Total `(point, polygon)` matches recorded.
    pub matches: usize,
    pub points_without_match: usize,
    pub emitted: usize,
    /// Polygons skipped for an incomplete output record.
    pub skipped_no_match: usize,
}

impl fmt::Display for PointMatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "checked {} points against {} polygons, wrote {} polygons ({} without matches)",
            self.points_seen, self.polygons, self.emitted, self.skipped_no_match
        )
    }
}

/// Polygon index plus per-polygon collectors.
///
/// Polygon ids are positions in the polygon stream; the matcher owns the
/// id → feature table.
pub struct PointMatcher<'a> {
    kernel: &'a dyn GeometryService,
    /// Buffers points at the configured disc resolution.
    discs: GeoKernel,
    index: SpatialIndex,
    polygons: Vec<Feature>,
    copied: Vec<ResolvedField>,
    collectors: CollectorSet<u64>,
    output_schema: Schema,
    radius_degrees: Option<f64>,
    report: PointMatchReport,
}

impl<'a> PointMatcher<'a> {
    /// Bind the configuration, then load and index every polygon.
    ///
    /// Collectors are bound against `point_schema`; copied fields against the
    /// polygon schema. Configuration errors are raised before any polygon is
    /// read.
    ///
    /// `kernel` answers bounding boxes and intersects. Points are always
    /// buffered with [`PointMatchConfig::kernel`], so `disc_segments` holds
    /// whatever kernel is passed in.
    pub fn build(
        config: &PointMatchConfig,
        kernel: &'a dyn GeometryService,
        polygons: &mut dyn FeatureSource,
        point_schema: &Schema,
    ) -> Result<Self> {
        config.validate()?;

        let polygon_schema = polygons.schema().clone();
        tracing::info!("original schema: {}", polygon_schema);

        let copied = FieldResolver::new(&polygon_schema).resolve_all(&config.copied_polygon_fields)?;
        let reserved: Vec<String> = copied.iter().map(|f| f.name.clone()).collect();
        let collectors = CollectorSet::bind(&config.collectors, point_schema, &reserved)?;

        let mut output_schema = Schema::new(polygon_schema.geometry_type.clone());
        for field in &copied {
            output_schema.push(field.name.clone(), field.field_type);
        }
        collectors.extend_schema(&mut output_schema);
        tracing::info!("new schema: {}", output_schema);

        let total = polygons.len_hint();
        tracing::info!(polygons = ?total, "loading polygons into index");

        let mut builder = SpatialIndexBuilder::new(config.index.clone());
        let mut table = Vec::new();
        let mut report = PointMatchReport::default();
        while let Some(feature) = polygons.next_feature()? {
            let id = table.len() as u64;
            if table.len() % POLYGON_PROGRESS_INTERVAL == 0 {
                tracing::debug!(done = table.len(), total = ?total, "polygon load progress");
            }
            if !builder.add_geometry(id, &feature.geometry, kernel)? {
                report.unindexed_polygons += 1;
                tracing::debug!(polygon = id, "polygon has no bounding box, not indexed");
            }
            table.push(feature);
        }
        report.polygons = table.len();

        Ok(Self {
            kernel,
            discs: config.kernel(),
            index: builder.finish(),
            polygons: table,
            copied,
            collectors,
            output_schema,
            radius_degrees: config.match_radius.map(meters_to_degrees),
            report,
        })
    }

    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    pub fn output_schema(&self) -> &Schema {
        &self.output_schema
    }

    /// Polygon `id` from the id → feature table.
    pub fn polygon(&self, id: u64) -> Option<&Feature> {
        self.polygons.get(id as usize)
    }

    /// Ids of every polygon `point` matches, ascending.
    ///
    /// With a radius the point is buffered into a disc first. Boundary
    /// contact counts as a match.
    pub fn query(&self, point: &Feature) -> Result<Vec<u64>> {
        let buffered;
        let query_geom = match self.radius_degrees {
            Some(distance) => {
                buffered = self.discs.buffer(&point.geometry, distance)?;
                &buffered
            }
            None => &point.geometry,
        };
        Ok(self
            .index
            .query_intersects(query_geom, self.kernel, |id| {
                self.polygon(id).map(|f| &f.geometry)
            }))
    }

    /// Query `point` and record it against every match.
    pub fn record(&mut self, point: &Feature) -> Result<usize> {
        let matches = self.query(point)?;
        self.record_matches(point, &matches);
        Ok(matches.len())
    }

    /// Record `point` against already-computed matches.
    pub fn record_matches(&mut self, point: &Feature, matches: &[u64]) {
        self.report.points_seen += 1;
        if self.report.points_seen % POINT_PROGRESS_INTERVAL == 0 {
            tracing::debug!(done = self.report.points_seen, "point progress");
        }
        if matches.is_empty() {
            self.report.points_without_match += 1;
            return;
        }
        self.report.matches += matches.len();
        for id in matches {
            self.collectors.record_match(id, point);
        }
    }

    /// Emit every polygon whose output record is complete.
    ///
    /// A polygon with any null output value (no matched points, or a null
    /// copied field) is skipped with a diagnostic.
    pub fn finish(self, sink: &mut dyn FeatureSink) -> Result<PointMatchReport> {
        let PointMatcher {
            polygons,
            copied,
            collectors,
            output_schema,
            mut report,
            ..
        } = self;

        sink.begin(&output_schema)?;
        for (position, polygon) in polygons.into_iter().enumerate() {
            let id = position as u64;
            let mut properties: BTreeMap<String, Value> = copied
                .iter()
                .map(|f| (f.name.clone(), polygon.get(&f.name).clone()))
                .collect();
            collectors.output_into(&id, &mut properties);

            if properties.values().any(Value::is_null) {
                report.skipped_no_match += 1;
                tracing::debug!(polygon = id, "no matches for polygon");
                continue;
            }
            sink.write(Feature {
                id,
                geometry: polygon.geometry,
                properties,
            })?;
            report.emitted += 1;
        }
        sink.finish()?;

        tracing::info!(
            points = report.points_seen,
            matches = report.matches,
            emitted = report.emitted,
            skipped = report.skipped_no_match,
            "point match finished"
        );
        Ok(report)
    }
}

/// A bound point-match run.
///
/// The kernel serves the index and the intersects test; point discs follow
/// the configuration's `disc_segments`.
pub struct PointMatchPipeline<'a> {
    config: PointMatchConfig,
    kernel: &'a dyn GeometryService,
}

impl<'a> PointMatchPipeline<'a> {
    pub fn new(config: PointMatchConfig, kernel: &'a dyn GeometryService) -> Self {
        Self { config, kernel }
    }

    pub fn config(&self) -> &PointMatchConfig {
        &self.config
    }

    /// Index `polygons`, match every point, write the polygons to `sink`.
    ///
    /// In parallel mode queries run concurrently but observations are still
    /// recorded in point stream order.
    pub fn run(
        &self,
        polygons: &mut dyn FeatureSource,
        points: &mut dyn FeatureSource,
        sink: &mut dyn FeatureSink,
    ) -> Result<PointMatchReport> {
        let point_schema = points.schema().clone();
        let mut matcher = PointMatcher::build(&self.config, self.kernel, polygons, &point_schema)?;
        tracing::info!(points = ?points.len_hint(), "checking points against index");

        if self.config.parallel {
            let mut batch = Vec::new();
            while let Some(point) = points.next_feature()? {
                batch.push(point);
            }
            let matches: Vec<Vec<u64>> = batch
                .par_iter()
                .map(|point| matcher.query(point))
                .collect::<Result<_>>()?;
            for (point, ids) in batch.iter().zip(&matches) {
                matcher.record_matches(point, ids);
            }
        } else {
            while let Some(point) = points.next_feature()? {
                matcher.record(&point)?;
            }
        }

        matcher.finish(sink)
    }
}
