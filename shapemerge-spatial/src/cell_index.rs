//! Sorted cell index storage.
//!
//! The cell index maps grid cell ids to entry ids, enabling range scans for
//! box queries. Entries are sorted by `(cell_id, id)`, which allows:
//! - Binary-searched scans of a single cell
//! - Global dedup across cells (by id)
//!
//! # Grid
//!
//! A uniform `nx * ny` grid is laid over the extent of everything indexed.
//! Cell ids are row-major: `cell_id = row * nx + col`. Coordinates outside the
//! extent clamp to the border cells, so every box maps to a non-empty cell
//! range.

use crate::geometry::BBox;
use std::cmp::Ordering;

/// A single entry in the cell index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellEntry {
    /// Row-major grid cell id.
    pub cell_id: u64,

    /// Caller-supplied entry id.
    pub id: u64,
}

impl CellEntry {
    /// Create a new cell entry.
    pub fn new(cell_id: u64, id: u64) -> Self {
        Self { cell_id, id }
    }

    /// Compare for index ordering: `(cell_id, id)`.
    pub fn cmp_index(&self, other: &Self) -> Ordering {
        match self.cell_id.cmp(&other.cell_id) {
            Ordering::Equal => self.id.cmp(&other.id),
            ord => ord,
        }
    }
}

/// Inclusive column/row range of cells covered by a box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub col_min: u32,
    pub col_max: u32,
    pub row_min: u32,
    pub row_max: u32,
}

impl CellRange {
    /// Number of cells in the range.
    pub fn cell_count(&self) -> usize {
        (self.col_max - self.col_min + 1) as usize * (self.row_max - self.row_min + 1) as usize
    }
}

/// Uniform grid over a fixed extent.
#[derive(Debug, Clone, Copy)]
pub struct Grid {
    extent: BBox,
    nx: u32,
    ny: u32,
    cell_w: f64,
    cell_h: f64,
}

impl Grid {
    /// Lay an `n * n` grid over `extent`.
    ///
    /// Degenerate extents (zero width or height) collapse that axis to a
    /// single cell.
    pub fn new(extent: BBox, cells_per_axis: u32) -> Self {
        let n = cells_per_axis.max(1);
        let nx = if extent.width() > 0.0 { n } else { 1 };
        let ny = if extent.height() > 0.0 { n } else { 1 };
        Self {
            extent,
            nx,
            ny,
            cell_w: extent.width() / nx as f64,
            cell_h: extent.height() / ny as f64,
        }
    }

    pub fn extent(&self) -> &BBox {
        &self.extent
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.nx, self.ny)
    }

    fn col(&self, x: f64) -> u32 {
        if self.cell_w <= 0.0 {
            return 0;
        }
        let c = ((x - self.extent.min_x) / self.cell_w).floor();
        if c <= 0.0 {
            0
        } else {
            (c as u32).min(self.nx - 1)
        }
    }

    fn row(&self, y: f64) -> u32 {
        if self.cell_h <= 0.0 {
            return 0;
        }
        let r = ((y - self.extent.min_y) / self.cell_h).floor();
        if r <= 0.0 {
            0
        } else {
            (r as u32).min(self.ny - 1)
        }
    }

    /// Cells touched by `bbox`, clamped to the grid.
    pub fn covering(&self, bbox: &BBox) -> CellRange {
        CellRange {
            col_min: self.col(bbox.min_x),
            col_max: self.col(bbox.max_x),
            row_min: self.row(bbox.min_y),
            row_max: self.row(bbox.max_y),
        }
    }

    /// Row-major cell id.
    pub fn cell_id(&self, col: u32, row: u32) -> u64 {
        row as u64 * self.nx as u64 + col as u64
    }

    /// Cell ids in a range, grouped as contiguous `(min, max)` runs (one per row).
    pub fn ranges(&self, range: &CellRange) -> Vec<(u64, u64)> {
        (range.row_min..=range.row_max)
            .map(|row| {
                (
                    self.cell_id(range.col_min, row),
                    self.cell_id(range.col_max, row),
                )
            })
            .collect()
    }
}

/// In-memory sorted cell entries.
#[derive(Debug, Clone, Default)]
pub struct CellIndex {
    entries: Vec<CellEntry>,
}

impl CellIndex {
    /// Sort entries into index order.
    pub fn from_entries(mut entries: Vec<CellEntry>) -> Self {
        entries.sort_by(|a, b| a.cmp_index(b));
        entries.dedup();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries with `min_cell <= cell_id <= max_cell`, in index order.
    pub fn scan_range(&self, min_cell: u64, max_cell: u64) -> &[CellEntry] {
        let start = self.entries.partition_point(|e| e.cell_id < min_cell);
        let end = self.entries.partition_point(|e| e.cell_id <= max_cell);
        if start >= end {
            &[]
        } else {
            &self.entries[start..end]
        }
    }
}
