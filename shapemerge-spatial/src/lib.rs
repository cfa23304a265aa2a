//! Geometry kernel and bounding-box spatial index for shapemerge.
//!
//! This crate holds everything geometric the grouping engine delegates:
//!
//! - **Exact operations** (union, buffer, intersects, validity) behind the
//!   [`GeometryService`] trait, with [`GeoKernel`] as the `geo`-backed default
//! - **A fixed-set spatial index** keyed by opaque integer ids, built once per
//!   run and discarded afterwards
//!
//! # Architecture
//!
//! The index maps bounding boxes to cells of a uniform grid, storing entries
//! sorted by `(cell_id, id)`. Queries run a broad phase over the grid and hand
//! the surviving ids to an exact narrow-phase predicate.
//!
//! ```text
//! ┌──────────────────────┐   finish()   ┌──────────────────────┐
//! │ SpatialIndexBuilder  │ ───────────► │ SpatialIndex         │
//! │ (id, bbox) records   │              │ grid + sorted cells  │
//! └──────────────────────┘              └──────────┬───────────┘
//!                                                  │ candidates(bbox)
//!                                                  ▼
//!                                        dedup ─► bbox prefilter
//!                                                  │
//!                                                  ▼
//!                                    GeometryService::intersects
//! ```
//!
//! # Modules
//!
//! - [`config`]: Index configuration types
//! - [`geometry`]: Bounding boxes, the geometry service and WKT parsing
//! - [`cell_index`]: Grid and sorted cell storage
//! - [`index`]: Immutable index and query statistics
//! - [`error`]: Error types

pub mod config;
pub mod error;

mod builder;
pub mod cell_index;
pub(crate) mod dedup;
pub mod geometry;
mod index;

// Re-export key types
pub use builder::{BuildStats, SpatialIndexBuilder};
pub use config::{IndexConfig, DEFAULT_QUADRANT_SEGMENTS};
pub use error::{Result, SpatialError};
pub use geometry::{
    meters_to_degrees, parse_wkt, to_multipolygon, BBox, GeoKernel, GeometryService,
    GeometryType, METERS_PER_DEGREE,
};
pub use index::{QueryStats, SpatialIndex};
