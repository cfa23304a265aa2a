//! Spatial index builder.
//!
//! Builds a spatial index from a fixed set of features. The builder:
//! 1. Accepts `(id, bbox)` records, or `(id, geometry)` and computes the box
//! 2. Lays a uniform grid over the extent of all boxes
//! 3. Covers every box with grid cells
//! 4. Produces `CellEntry` records sorted by `(cell_id, id)`
//!
//! # Usage
//!
//! ```ignore
//! let mut builder = SpatialIndexBuilder::new(IndexConfig::default());
//! builder.add_geometry(0, &polygon, &kernel)?;
//! let index = builder.finish();
//! let candidates = index.candidates(&query_box);
//! ```

use crate::cell_index::{CellEntry, CellIndex, Grid};
use crate::config::IndexConfig;
use crate::error::{Result, SpatialError};
use crate::geometry::{BBox, GeometryService, GeometryType};
use crate::index::SpatialIndex;
use geo_types::Geometry;
use rustc_hash::FxHashMap;

/// Statistics collected during index building.
#[derive(Debug, Clone, Default)]
pub struct BuildStats {
    /// Number of records offered to the builder.
    pub records_processed: u64,

    /// Number of boxes indexed.
    pub entries_added: u64,

    /// Number of records skipped (empty geometry, non-finite box).
    pub records_skipped: u64,

    /// Total cell entries generated.
    pub cell_entries: u64,

    /// Entries too wide for a covering, kept in the wide list.
    pub wide_entries: u64,

    /// Number of polygons.
    pub polygon_count: u64,

    /// Number of points.
    pub point_count: u64,

    /// Number of other geometry types.
    pub other_count: u64,
}

/// Builder for spatial indexes (the `Empty` state).
///
/// Accumulates boxes; [`finish`](Self::finish) freezes them into an
/// immutable [`SpatialIndex`].
pub struct SpatialIndexBuilder {
    /// Configuration used for building.
    config: IndexConfig,

    /// Boxes in insertion order.
    boxes: Vec<(u64, BBox)>,

    /// Ids seen so far.
    seen: FxHashMap<u64, usize>,

    /// Build statistics.
    stats: BuildStats,
}

impl SpatialIndexBuilder {
    /// Create a new builder with the given configuration.
    pub fn new(config: IndexConfig) -> Self {
        Self {
            config,
            boxes: Vec::new(),
            seen: FxHashMap::default(),
            stats: BuildStats::default(),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Get current build statistics.
    pub fn stats(&self) -> &BuildStats {
        &self.stats
    }

    /// Number of boxes accepted so far.
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Add a bounding box under `id`.
    ///
    /// # Returns
    ///
    /// - `Ok(true)` if the box was added
    /// - `Ok(false)` if skipped (non-finite bounds)
    /// - `Err` if `id` was already added
    pub fn add(&mut self, id: u64, bbox: BBox) -> Result<bool> {
        self.stats.records_processed += 1;

        if self.seen.contains_key(&id) {
            return Err(SpatialError::Config(format!("duplicate index id {}", id)));
        }

        if !bbox.is_finite() {
            self.stats.records_skipped += 1;
            tracing::debug!(id = id, "Skipping entry with non-finite bounding box");
            return Ok(false);
        }

        self.seen.insert(id, self.boxes.len());
        self.boxes.push((id, bbox));
        self.stats.entries_added += 1;
        Ok(true)
    }

    /// Add a geometry under `id`, computing its box with `kernel`.
    ///
    /// Empty geometries have no box; they are logged and counted in
    /// `stats.records_skipped`, not propagated as errors.
    pub fn add_geometry(
        &mut self,
        id: u64,
        geom: &Geometry<f64>,
        kernel: &dyn GeometryService,
    ) -> Result<bool> {
        let Some(bbox) = kernel.bounding_box(geom) else {
            self.stats.records_processed += 1;
            self.stats.records_skipped += 1;
            tracing::debug!(id = id, "Skipping empty geometry");
            return Ok(false);
        };

        let added = self.add(id, bbox)?;
        if added {
            match GeometryType::from_geometry(geom) {
                GeometryType::Point | GeometryType::MultiPoint => self.stats.point_count += 1,
                GeometryType::Polygon | GeometryType::MultiPolygon => {
                    self.stats.polygon_count += 1
                }
                _ => self.stats.other_count += 1,
            }
        }
        Ok(added)
    }

    /// Freeze the accumulated boxes into an immutable index.
    pub fn finish(mut self) -> SpatialIndex {
        let Some(extent) = self
            .boxes
            .iter()
            .map(|(_, b)| *b)
            .reduce(|acc, b| acc.union(&b))
        else {
            return SpatialIndex::empty(self.config, self.stats);
        };

        let grid = Grid::new(extent, self.config.cells_per_axis_for(self.boxes.len()));
        let mut entries = Vec::new();
        let mut wide = Vec::new();

        for (id, bbox) in &self.boxes {
            let range = grid.covering(bbox);
            if range.cell_count() > self.config.max_cells_per_entry {
                wide.push(*id);
                continue;
            }
            for (min_cell, max_cell) in grid.ranges(&range) {
                entries.extend((min_cell..=max_cell).map(|cell_id| CellEntry::new(cell_id, *id)));
            }
        }

        self.stats.cell_entries = entries.len() as u64;
        self.stats.wide_entries = wide.len() as u64;
        wide.sort_unstable();

        let (nx, ny) = grid.dimensions();
        tracing::debug!(
            entries = self.boxes.len(),
            cell_entries = entries.len(),
            wide = wide.len(),
            grid_nx = nx,
            grid_ny = ny,
            "spatial index built"
        );

        let boxes: FxHashMap<u64, BBox> = self.boxes.into_iter().collect();
        SpatialIndex::new(
            self.config,
            grid,
            CellIndex::from_entries(entries),
            boxes,
            wide,
            self.stats,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{parse_wkt, GeoKernel};

    #[test]
    fn test_add_and_skip() {
        let kernel = GeoKernel::new();
        let mut builder = SpatialIndexBuilder::new(IndexConfig::default());

        let poly = parse_wkt("POLYGON((0 0, 1 0, 1 1, 0 1, 0 0))").unwrap();
        let empty = Geometry::MultiPolygon(geo_types::MultiPolygon::new(Vec::new()));

        assert!(builder.add_geometry(1, &poly, &kernel).unwrap());
        assert!(!builder.add_geometry(2, &empty, &kernel).unwrap());
        assert!(!builder
            .add(3, BBox::new(f64::NAN, 0.0, 1.0, 1.0))
            .unwrap());

        let stats = builder.stats();
        assert_eq!(stats.records_processed, 3);
        assert_eq!(stats.entries_added, 1);
        assert_eq!(stats.records_skipped, 2);
        assert_eq!(stats.polygon_count, 1);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut builder = SpatialIndexBuilder::new(IndexConfig::default());
        builder.add(7, BBox::new(0.0, 0.0, 1.0, 1.0)).unwrap();
        assert!(matches!(
            builder.add(7, BBox::new(2.0, 2.0, 3.0, 3.0)),
            Err(SpatialError::Config(_))
        ));
    }

    #[test]
    fn test_wide_entries_bypass_covering() {
        let config = IndexConfig::default()
            .with_grid_cells_per_axis(8)
            .with_max_cells_per_entry(4);
        let mut builder = SpatialIndexBuilder::new(config);
        builder.add(0, BBox::new(0.0, 0.0, 8.0, 8.0)).unwrap(); // 64 cells
        builder.add(1, BBox::new(0.1, 0.1, 0.9, 0.9)).unwrap(); // 1 cell

        let index = builder.finish();
        assert_eq!(index.stats().wide_entries, 1);
        assert_eq!(index.stats().cell_entries, 1);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_empty_builder_finishes() {
        let index = SpatialIndexBuilder::new(IndexConfig::default()).finish();
        assert!(index.is_empty());
        assert!(index.candidates(&BBox::new(0.0, 0.0, 1.0, 1.0)).is_empty());
    }
}
