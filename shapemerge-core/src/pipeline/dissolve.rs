//! Dissolve mode: group polygons by attribute, union each group, reduce
//! collector fields across the group.
//!
//! ```text
//! FeatureSource ──► GroupKeyBuilder ──► bucket (first-encounter order)
//!                                          ├─► Dissolver::prepare ─► members
//!                                          └─► CollectorSet::record_match
//!                  emit: key values + collector outputs + union(members)
//! ```

use crate::collector::{CollectorSet, CollectorSpec};
use crate::dissolve::Dissolver;
use crate::error::{ConfigError, Result};
use crate::feature::Feature;
use crate::group_key::{GroupKey, GroupKeyBuilder};
use crate::operator::Operator;
use crate::schema::{FieldResolver, Schema};
use crate::source::{FeatureSink, FeatureSource};
use geo_types::{Geometry, MultiPolygon};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use shapemerge_spatial::GeometryService;
use std::fmt;

/// Progress is logged every this many features.
const PROGRESS_INTERVAL: usize = 1000;

/// Dissolve configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DissolveConfig {
    /// Fields to group by, resolved case-insensitively.
    pub group_by: Vec<String>,

    /// Put every feature into a single group.
    pub all_in_one_group: bool,

    pub collectors: Vec<CollectorSpec>,

    /// Union groups on the rayon pool.
    pub parallel: bool,
}

impl DissolveConfig {
    pub fn with_group_by<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.group_by = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_all_in_one_group(mut self, all_in_one: bool) -> Self {
        self.all_in_one_group = all_in_one;
        self
    }

    pub fn with_collector(mut self, spec: CollectorSpec) -> Self {
        self.collectors.push(spec);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Check option presence and combinations, and that every collector
    /// names a known operator. Needs no schema.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        match (self.group_by.is_empty(), self.all_in_one_group) {
            (true, false) => return Err(ConfigError::MissingOption("group_by".to_string())),
            (false, true) => {
                return Err(ConfigError::ConflictingOptions(
                    "group_by cannot be combined with all_in_one_group".to_string(),
                ))
            }
            _ => {}
        }
        for spec in &self.collectors {
            Operator::lookup(&spec.operator)?;
        }
        Ok(())
    }
}

/// Counters from a dissolve run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DissolveReport {
    pub features_seen: usize,
    pub groups: usize,
    pub emitted: usize,
    /// Groups left with no valid member geometry.
    pub skipped_empty_groups: usize,
    pub repaired: usize,
    pub dropped: usize,
    pub non_areal: usize,
}

impl fmt::Display for DissolveReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "saw {} features, made {} dissolved features",
            self.features_seen, self.emitted
        )?;
        if self.skipped_empty_groups > 0 || self.dropped > 0 {
            write!(
                f,
                " ({} empty groups skipped, {} invalid geometries dropped)",
                self.skipped_empty_groups, self.dropped
            )?;
        }
        Ok(())
    }
}

/// A bound dissolve run.
pub struct DissolvePipeline<'a> {
    config: DissolveConfig,
    kernel: &'a dyn GeometryService,
}

impl<'a> DissolvePipeline<'a> {
    pub fn new(config: DissolveConfig, kernel: &'a dyn GeometryService) -> Self {
        Self { config, kernel }
    }

    pub fn config(&self) -> &DissolveConfig {
        &self.config
    }

    /// Output schema for an input schema, binding every collector.
    ///
    /// This is where every configuration error surfaces; no feature is read.
    pub fn bind(
        &self,
        input: &Schema,
    ) -> Result<(GroupKeyBuilder, CollectorSet<GroupKey>, Schema)> {
        self.config.validate()?;

        let key_builder = if self.config.all_in_one_group {
            GroupKeyBuilder::all_in_one()
        } else {
            GroupKeyBuilder::new(FieldResolver::new(input).resolve_all(&self.config.group_by)?)
        };
        let reserved: Vec<String> = key_builder.fields().iter().map(|f| f.name.clone()).collect();
        let collectors = CollectorSet::bind(&self.config.collectors, input, &reserved)?;

        let mut output = Schema::new("MultiPolygon");
        for field in key_builder.fields() {
            output.push(field.name.clone(), field.field_type);
        }
        collectors.extend_schema(&mut output);

        tracing::info!(fields = ?reserved, "grouping by: {}", reserved.join(","));
        tracing::info!("modified schema: {}", output);
        Ok((key_builder, collectors, output))
    }

    pub fn run(
        &self,
        source: &mut dyn FeatureSource,
        sink: &mut dyn FeatureSink,
    ) -> Result<DissolveReport> {
        let input = source.schema().clone();
        tracing::info!("original schema: {}", input);
        let (key_builder, mut collectors, output_schema) = self.bind(&input)?;

        let mut dissolver = Dissolver::new(self.kernel);
        let mut report = DissolveReport::default();
        let mut slots: FxHashMap<GroupKey, usize> = FxHashMap::default();
        let mut groups: Vec<(GroupKey, Vec<MultiPolygon<f64>>)> = Vec::new();
        let total = source.len_hint();

        tracing::info!(features = ?total, "examining input");
        while let Some(feature) = source.next_feature()? {
            report.features_seen += 1;
            if report.features_seen % PROGRESS_INTERVAL == 0 {
                tracing::debug!(seen = report.features_seen, total = ?total, "dissolve progress");
            }

            let key = key_builder.build(&feature)?;
            let slot = match slots.get(&key) {
                Some(slot) => *slot,
                None => {
                    groups.push((key.clone(), Vec::new()));
                    slots.insert(key, groups.len() - 1);
                    groups.len() - 1
                }
            };

            if let Some(member) = dissolver.prepare(&feature) {
                collectors.record_match(&groups[slot].0, &feature);
                groups[slot].1.push(member);
            }
        }

        report.groups = groups.len();
        tracing::info!(
            "saw {} features, made {} dissolved features",
            report.features_seen,
            report.groups
        );

        let merged: Vec<Option<MultiPolygon<f64>>> = if self.config.parallel {
            groups
                .par_iter()
                .map(|(_, members)| dissolver.dissolve(members))
                .collect()
        } else {
            groups
                .iter()
                .map(|(_, members)| dissolver.dissolve(members))
                .collect()
        };

        sink.begin(&output_schema)?;
        for ((key, _), geometry) in groups.iter().zip(merged) {
            let Some(geometry) = geometry else {
                report.skipped_empty_groups += 1;
                tracing::info!(group = key.as_str(), "no valid geometry in group, skipping");
                continue;
            };
            let mut properties = key.values().clone();
            collectors.output_into(key, &mut properties);
            sink.write(Feature {
                id: report.emitted as u64,
                geometry: Geometry::MultiPolygon(geometry),
                properties,
            })?;
            report.emitted += 1;
        }
        sink.finish()?;

        let stats = dissolver.stats();
        report.repaired = stats.repaired;
        report.dropped = stats.dropped;
        report.non_areal = stats.non_areal;
        Ok(report)
    }
}
