//! Spatial index configuration types.

use crate::error::{Result, SpatialError};
use serde::{Deserialize, Serialize};

/// Default number of disc segments per quadrant when buffering points.
pub const DEFAULT_QUADRANT_SEGMENTS: usize = 30;

/// Configuration for the grid cell index.
///
/// Controls the granularity of the uniform grid laid over the extent of all
/// indexed boxes and how many cells a single entry may occupy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Grid cells per axis. `None` picks ~sqrt(n) at build time,
    /// clamped to `1..=MAX_GRID_CELLS_PER_AXIS`.
    pub grid_cells_per_axis: Option<u32>,

    /// Maximum number of cells in an entry's covering.
    /// Entries whose box spans more cells are kept in a wide list and
    /// tested by box only.
    /// Default: 64
    pub max_cells_per_entry: usize,
}

impl IndexConfig {
    /// Upper bound on cells per axis (keeps cell ids well inside u64).
    pub const MAX_GRID_CELLS_PER_AXIS: u32 = 1024;

    /// Fix the grid resolution instead of deriving it from the entry count.
    pub fn with_grid_cells_per_axis(mut self, cells: u32) -> Self {
        self.grid_cells_per_axis = Some(cells);
        self
    }

    /// Set the covering size limit.
    pub fn with_max_cells_per_entry(mut self, max_cells: usize) -> Self {
        self.max_cells_per_entry = max_cells;
        self
    }

    /// Reject configurations the index cannot honour.
    pub fn validate(&self) -> Result<()> {
        if let Some(cells) = self.grid_cells_per_axis {
            if cells == 0 || cells > Self::MAX_GRID_CELLS_PER_AXIS {
                return Err(SpatialError::Config(format!(
                    "grid_cells_per_axis must be in 1..={}, got {}",
                    Self::MAX_GRID_CELLS_PER_AXIS,
                    cells
                )));
            }
        }
        if self.max_cells_per_entry == 0 {
            return Err(SpatialError::Config(
                "max_cells_per_entry must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Resolve the grid resolution for `entry_count` entries.
    pub(crate) fn cells_per_axis_for(&self, entry_count: usize) -> u32 {
        match self.grid_cells_per_axis {
            Some(cells) => cells.clamp(1, Self::MAX_GRID_CELLS_PER_AXIS),
            None => ((entry_count as f64).sqrt().ceil() as u32)
                .clamp(1, Self::MAX_GRID_CELLS_PER_AXIS),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            grid_cells_per_axis: None,
            max_cells_per_entry: 64,
        }
    }
}
