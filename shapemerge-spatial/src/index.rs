//! Immutable, queryable spatial index.
//!
//! Query flow mirrors a two-phase spatial join:
//!
//! ```text
//!   query box ──► grid covering ──► per-row cell range scans
//!                                         │
//!                                         ▼
//!                               dedup by id (+ wide list)
//!                                         │
//!                                         ▼
//!                                  bbox prefilter      ── broad phase
//!                                         │
//!                                         ▼
//!                             exact predicate refine   ── narrow phase
//! ```
//!
//! The index owns no geometry, only boxes and opaque ids. Narrow-phase
//! refinement asks the caller for the geometry behind each candidate id.
//! Once built the index is never mutated, so it can be shared across threads
//! for concurrent queries.

use crate::builder::BuildStats;
use crate::cell_index::{CellIndex, Grid};
use crate::config::IndexConfig;
use crate::dedup::dedup_keep_first;
use crate::geometry::{BBox, GeometryService};
use geo_types::Geometry;
use rustc_hash::FxHashMap;

/// Statistics from a candidate query.
///
/// Use these to understand query selectivity and tune the grid resolution.
#[derive(Debug, Clone, Default)]
pub struct QueryStats {
    /// Number of grid cells in the query covering.
    pub covering_cells: usize,

    /// Number of contiguous cell ranges scanned.
    pub ranges_scanned: usize,

    /// Number of cell entries returned by the range scans.
    pub cell_entries: usize,

    /// Number of wide entries considered.
    pub wide_entries: usize,

    /// Number of distinct ids after dedup.
    pub after_dedup: usize,

    /// Number of ids that passed the bbox prefilter.
    pub passed_bbox: usize,

    /// Number of exact predicate checks performed.
    pub exact_checks: usize,

    /// Number of results returned.
    pub result_count: usize,
}

impl QueryStats {
    /// Compute the bbox prefilter efficiency: passed_bbox / after_dedup.
    ///
    /// Lower is better (bbox rejected more candidates).
    pub fn bbox_efficiency(&self) -> f64 {
        if self.after_dedup == 0 {
            0.0
        } else {
            self.passed_bbox as f64 / self.after_dedup as f64
        }
    }

    /// Compute the exact check efficiency: result_count / exact_checks.
    ///
    /// Higher is better (more exact checks resulted in matches).
    pub fn exact_check_efficiency(&self) -> f64 {
        if self.exact_checks == 0 {
            0.0
        } else {
            self.result_count as f64 / self.exact_checks as f64
        }
    }
}

/// A built spatial index (the `IndexBuilt` state).
pub struct SpatialIndex {
    /// Configuration used at build time.
    config: IndexConfig,

    /// Grid over the extent; `None` when nothing was indexed.
    grid: Option<Grid>,

    /// Sorted cell entries.
    cells: CellIndex,

    /// Box per id, for the prefilter.
    boxes: FxHashMap<u64, BBox>,

    /// Ids whose covering exceeded `max_cells_per_entry` (sorted).
    wide: Vec<u64>,

    /// Statistics from the build.
    stats: BuildStats,
}

impl SpatialIndex {
    pub(crate) fn new(
        config: IndexConfig,
        grid: Grid,
        cells: CellIndex,
        boxes: FxHashMap<u64, BBox>,
        wide: Vec<u64>,
        stats: BuildStats,
    ) -> Self {
        Self {
            config,
            grid: Some(grid),
            cells,
            boxes,
            wide,
            stats,
        }
    }

    pub(crate) fn empty(config: IndexConfig, stats: BuildStats) -> Self {
        Self {
            config,
            grid: None,
            cells: CellIndex::default(),
            boxes: FxHashMap::default(),
            wide: Vec::new(),
            stats,
        }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn stats(&self) -> &BuildStats {
        &self.stats
    }

    /// Number of indexed ids.
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Extent of everything indexed.
    pub fn extent(&self) -> Option<BBox> {
        self.grid.as_ref().map(|g| *g.extent())
    }

    /// Box stored for `id`.
    pub fn bbox(&self, id: u64) -> Option<&BBox> {
        self.boxes.get(&id)
    }

    /// Ids whose box intersects `query` (broad phase), in ascending order.
    pub fn candidates(&self, query: &BBox) -> Vec<u64> {
        self.candidates_with_stats(query).0
    }

    /// Broad phase with detailed statistics for benchmarking.
    pub fn candidates_with_stats(&self, query: &BBox) -> (Vec<u64>, QueryStats) {
        let mut stats = QueryStats::default();
        let Some(grid) = &self.grid else {
            return (Vec::new(), stats);
        };

        let mut all_entries = Vec::new();
        // A query outside the extent can only hit nothing; skip the clamped scan.
        if query.intersects(grid.extent()) {
            let range = grid.covering(query);
            stats.covering_cells = range.cell_count();
            for (min_cell, max_cell) in grid.ranges(&range) {
                stats.ranges_scanned += 1;
                let scanned = self.cells.scan_range(min_cell, max_cell);
                stats.cell_entries += scanned.len();
                all_entries.extend_from_slice(scanned);
            }
        }

        let mut ids: Vec<u64> = dedup_keep_first(all_entries)
            .into_iter()
            .map(|e| e.id)
            .collect();
        stats.wide_entries = self.wide.len();
        ids.extend_from_slice(&self.wide);
        stats.after_dedup = ids.len();

        ids.retain(|id| self.boxes.get(id).is_some_and(|b| b.intersects(query)));
        ids.sort_unstable();
        stats.passed_bbox = ids.len();
        stats.result_count = ids.len();

        (ids, stats)
    }

    /// Ids whose geometry intersects `query_geom` (broad + narrow phase).
    ///
    /// `geometry_for` resolves a candidate id to the caller-held geometry;
    /// ids it cannot resolve are skipped. Results are in ascending id order
    /// and every intersecting id is returned.
    pub fn query_intersects<'g, F>(
        &self,
        query_geom: &Geometry<f64>,
        kernel: &dyn GeometryService,
        geometry_for: F,
    ) -> Vec<u64>
    where
        F: Fn(u64) -> Option<&'g Geometry<f64>>,
    {
        self.query_intersects_with_stats(query_geom, kernel, geometry_for)
            .0
    }

    /// Query intersects with detailed statistics for benchmarking.
    pub fn query_intersects_with_stats<'g, F>(
        &self,
        query_geom: &Geometry<f64>,
        kernel: &dyn GeometryService,
        geometry_for: F,
    ) -> (Vec<u64>, QueryStats)
    where
        F: Fn(u64) -> Option<&'g Geometry<f64>>,
    {
        let Some(query_bbox) = kernel.bounding_box(query_geom) else {
            return (Vec::new(), QueryStats::default());
        };

        let (candidates, mut stats) = self.candidates_with_stats(&query_bbox);
        let mut results = Vec::new();

        for id in candidates {
            if let Some(entry_geom) = geometry_for(id) {
                stats.exact_checks += 1;
                if kernel.intersects(entry_geom, query_geom) {
                    results.push(id);
                }
            }
        }

        stats.result_count = results.len();
        (results, stats)
    }
}
