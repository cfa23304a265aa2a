//! Geometry policy for dissolving a group.
//!
//! Members are validity-checked before they join a group. Invalid members are
//! repaired with a zero-distance buffer; members that stay invalid are dropped
//! with a diagnostic and the run continues.

use crate::feature::Feature;
use geo_types::{Geometry, MultiPolygon};
use shapemerge_spatial::{to_multipolygon, GeometryService};

/// Counters for the member-preparation step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DissolveStats {
    /// Members that were invalid and repaired.
    pub repaired: usize,
    /// Members dropped because repair failed.
    pub dropped: usize,
    /// Members skipped because they enclose no area.
    pub non_areal: usize,
}

/// Prepares group members and unions them.
pub struct Dissolver<'a> {
    kernel: &'a dyn GeometryService,
    stats: DissolveStats,
}

impl<'a> Dissolver<'a> {
    pub fn new(kernel: &'a dyn GeometryService) -> Self {
        Self {
            kernel,
            stats: DissolveStats::default(),
        }
    }

    pub fn stats(&self) -> &DissolveStats {
        &self.stats
    }

    /// Valid areal geometry of `feature`, repairing it if necessary.
    ///
    /// Returns `None` when the feature cannot contribute to its group.
    pub fn prepare(&mut self, feature: &Feature) -> Option<MultiPolygon<f64>> {
        let Some(areal) = to_multipolygon(&feature.geometry) else {
            self.stats.non_areal += 1;
            tracing::debug!(
                feature = feature.id,
                geometry_type = feature.geometry_type().as_str(),
                "skipping non-areal geometry"
            );
            return None;
        };

        if areal.0.is_empty() {
            return self.drop_member(feature);
        }

        let geom = Geometry::MultiPolygon(areal);
        if self.kernel.is_valid(&geom) {
            return to_multipolygon(&geom);
        }

        match self.kernel.repair(&geom).as_ref().and_then(to_multipolygon) {
            Some(repaired) if !repaired.0.is_empty() => {
                self.stats.repaired += 1;
                tracing::debug!(feature = feature.id, "repaired invalid geometry");
                Some(repaired)
            }
            _ => self.drop_member(feature),
        }
    }

    fn drop_member(&mut self, feature: &Feature) -> Option<MultiPolygon<f64>> {
        self.stats.dropped += 1;
        tracing::warn!(
            feature = feature.id,
            "dropping feature: geometry is invalid and could not be repaired"
        );
        None
    }

    /// Union of prepared members; `None` for an empty group.
    pub fn dissolve(&self, members: &[MultiPolygon<f64>]) -> Option<MultiPolygon<f64>> {
        if members.is_empty() {
            return None;
        }
        let merged = self.kernel.union_all(members);
        if merged.0.is_empty() {
            None
        } else {
            Some(merged)
        }
    }
}
