//! Geometry kernel and bounding boxes.
//!
//! This module provides:
//! - Axis-aligned bounding boxes used by the cell index broad phase
//! - The [`GeometryService`] seam the grouping engine talks to
//! - [`GeoKernel`], the default implementation on top of the `geo` crate
//! - WKT parsing (tests, benches and diagnostics)
//!
//! # Design
//!
//! The engine never performs geometric computation itself. Union, buffering,
//! the `intersects` predicate and validity checks all go through
//! [`GeometryService`], which returns new geometries and never mutates its
//! inputs.

use crate::config::DEFAULT_QUADRANT_SEGMENTS;
use crate::error::{Result, SpatialError};
use geo::{BooleanOps, BoundingRect, Intersects, Validation};
use geo_types::{Coord, Geometry, LineString, MultiPolygon, Point, Polygon};
use serde::{Deserialize, Serialize};

/// Metres per degree used to convert a match radius into coordinate units.
///
/// This is the length of one degree of latitude near the equator. It is an
/// approximation for small radii in geographic coordinates, not a geodesic
/// computation: east-west distances shrink with `cos(latitude)` and are not
/// corrected for.
pub const METERS_PER_DEGREE: f64 = 111_131.745;

/// Convert a distance in metres to degrees using [`METERS_PER_DEGREE`].
pub fn meters_to_degrees(meters: f64) -> f64 {
    meters / METERS_PER_DEGREE
}

/// Geometry type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum GeometryType {
    Point = 0,
    LineString = 1,
    Polygon = 2,
    MultiPoint = 3,
    MultiLineString = 4,
    MultiPolygon = 5,
    GeometryCollection = 6,
}

impl GeometryType {
    /// Classify a geo-types Geometry.
    pub fn from_geometry(geom: &Geometry<f64>) -> Self {
        match geom {
            Geometry::Point(_) => GeometryType::Point,
            Geometry::Line(_) | Geometry::LineString(_) => GeometryType::LineString,
            Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => {
                GeometryType::Polygon
            }
            Geometry::MultiPoint(_) => GeometryType::MultiPoint,
            Geometry::MultiLineString(_) => GeometryType::MultiLineString,
            Geometry::MultiPolygon(_) => GeometryType::MultiPolygon,
            Geometry::GeometryCollection(_) => GeometryType::GeometryCollection,
        }
    }

    /// Check if this is a point type.
    pub fn is_point(&self) -> bool {
        matches!(self, GeometryType::Point | GeometryType::MultiPoint)
    }

    /// Check if this type encloses area.
    pub fn is_areal(&self) -> bool {
        matches!(self, GeometryType::Polygon | GeometryType::MultiPolygon)
    }

    /// Name as written in dataset schemas.
    pub fn as_str(&self) -> &'static str {
        match self {
            GeometryType::Point => "Point",
            GeometryType::LineString => "LineString",
            GeometryType::Polygon => "Polygon",
            GeometryType::MultiPoint => "MultiPoint",
            GeometryType::MultiLineString => "MultiLineString",
            GeometryType::MultiPolygon => "MultiPolygon",
            GeometryType::GeometryCollection => "GeometryCollection",
        }
    }
}

/// Axis-aligned bounding box in coordinate units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BBox {
    /// Create a new bounding box.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Degenerate box around a single coordinate.
    pub fn from_point(x: f64, y: f64) -> Self {
        Self::new(x, y, x, y)
    }

    /// Check if this bbox intersects another (touching edges count).
    pub fn intersects(&self, other: &BBox) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Check if this bbox contains a point.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Check if this bbox fully contains another bbox.
    pub fn contains_bbox(&self, other: &BBox) -> bool {
        self.min_x <= other.min_x
            && self.max_x >= other.max_x
            && self.min_y <= other.min_y
            && self.max_y >= other.max_y
    }

    /// Smallest box covering both.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Grow the box by `distance` on every side.
    pub fn expand_by(&self, distance: f64) -> BBox {
        BBox {
            min_x: self.min_x - distance,
            min_y: self.min_y - distance,
            max_x: self.max_x + distance,
            max_y: self.max_y + distance,
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// All four bounds are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.min_x.is_finite()
            && self.min_y.is_finite()
            && self.max_x.is_finite()
            && self.max_y.is_finite()
    }

    /// Compute from a geo-types Geometry. Empty geometries have no box.
    pub fn from_geometry(geom: &Geometry<f64>) -> Option<Self> {
        let rect = geom.bounding_rect()?;
        Some(Self {
            min_x: rect.min().x,
            min_y: rect.min().y,
            max_x: rect.max().x,
            max_y: rect.max().y,
        })
    }
}

/// Exact geometric operations the grouping and matching engines delegate.
///
/// Implementations must be pure: inputs are only read and every result is a
/// new geometry. The trait is object safe and `Sync` so one kernel can serve
/// parallel group unions and point queries.
pub trait GeometryService: Send + Sync {
    /// Union of a set of areal geometries.
    ///
    /// The result covers exactly the union of the inputs regardless of their
    /// order. An empty input yields an empty multipolygon.
    fn union_all(&self, parts: &[MultiPolygon<f64>]) -> MultiPolygon<f64>;

    /// Buffer a geometry by `distance` coordinate units.
    fn buffer(&self, geom: &Geometry<f64>, distance: f64) -> Result<Geometry<f64>>;

    /// Exact intersects predicate. Boundary contact counts as intersecting.
    fn intersects(&self, a: &Geometry<f64>, b: &Geometry<f64>) -> bool;

    /// Axis-aligned bounding box, `None` for empty geometries.
    fn bounding_box(&self, geom: &Geometry<f64>) -> Option<BBox>;

    /// OGC validity check.
    fn is_valid(&self, geom: &Geometry<f64>) -> bool;

    /// Heal an invalid geometry with a zero-distance buffer.
    ///
    /// Returns `None` when the buffered result is still invalid or has
    /// collapsed to nothing.
    fn repair(&self, geom: &Geometry<f64>) -> Option<Geometry<f64>> {
        let repaired = self.buffer(geom, 0.0).ok()?;
        if self.is_valid(&repaired) && !is_empty(&repaired) {
            Some(repaired)
        } else {
            None
        }
    }
}

/// [`GeometryService`] backed by the `geo` crate.
///
/// Boolean operations run on `geo`'s overlay engine, which accepts
/// self-intersecting rings and always produces valid output. That property is
/// what makes the zero-distance buffer a repair.
#[derive(Debug, Clone)]
pub struct GeoKernel {
    quadrant_segments: usize,
}

impl GeoKernel {
    /// Kernel with the default disc resolution.
    pub fn new() -> Self {
        Self {
            quadrant_segments: DEFAULT_QUADRANT_SEGMENTS,
        }
    }

    /// Number of segments used per quarter circle when buffering points.
    pub fn with_quadrant_segments(mut self, segments: usize) -> Self {
        self.quadrant_segments = segments.max(1);
        self
    }

    pub fn quadrant_segments(&self) -> usize {
        self.quadrant_segments
    }

    /// Regular polygon inscribed in the circle of `radius` around `center`.
    pub fn disc(&self, center: Point<f64>, radius: f64) -> Polygon<f64> {
        let n = 4 * self.quadrant_segments;
        let coords: Vec<Coord<f64>> = (0..n)
            .map(|i| {
                let angle = std::f64::consts::TAU * i as f64 / n as f64;
                Coord {
                    x: center.x() + radius * angle.cos(),
                    y: center.y() + radius * angle.sin(),
                }
            })
            .collect();
        // Polygon::new closes the ring.
        Polygon::new(LineString::from(coords), vec![])
    }
}

impl Default for GeoKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl GeometryService for GeoKernel {
    fn union_all(&self, parts: &[MultiPolygon<f64>]) -> MultiPolygon<f64> {
        match parts {
            [] => MultiPolygon::new(Vec::new()),
            // A lone member still goes through the overlay so overlapping
            // parts of one multipolygon are merged.
            [single] => single.union(&MultiPolygon::new(Vec::new())),
            _ => {
                // Cascaded union: pairwise rounds keep intermediate results small.
                let mut layer: Vec<MultiPolygon<f64>> = parts.to_vec();
                while layer.len() > 1 {
                    layer = layer
                        .chunks(2)
                        .map(|pair| match pair {
                            [a, b] => a.union(b),
                            [a] => a.clone(),
                            _ => MultiPolygon::new(Vec::new()),
                        })
                        .collect();
                }
                layer.pop().unwrap_or_else(|| MultiPolygon::new(Vec::new()))
            }
        }
    }

    fn buffer(&self, geom: &Geometry<f64>, distance: f64) -> Result<Geometry<f64>> {
        if !distance.is_finite() || distance < 0.0 {
            return Err(SpatialError::Unsupported(format!(
                "buffer distance must be finite and non-negative, got {distance}"
            )));
        }
        match geom {
            Geometry::Point(p) if distance > 0.0 => {
                Ok(Geometry::Polygon(self.disc(*p, distance)))
            }
            Geometry::MultiPoint(mp) if distance > 0.0 => {
                let discs: Vec<MultiPolygon<f64>> = mp
                    .iter()
                    .map(|p| MultiPolygon::new(vec![self.disc(*p, distance)]))
                    .collect();
                Ok(Geometry::MultiPolygon(self.union_all(&discs)))
            }
            Geometry::Point(_) | Geometry::MultiPoint(_) => Ok(geom.clone()),
            _ if distance == 0.0 => {
                let areal = to_multipolygon(geom).ok_or_else(|| {
                    SpatialError::Unsupported(format!(
                        "zero-distance buffer of {}",
                        GeometryType::from_geometry(geom).as_str()
                    ))
                })?;
                Ok(Geometry::MultiPolygon(
                    areal.union(&MultiPolygon::new(Vec::new())),
                ))
            }
            _ => Err(SpatialError::Unsupported(format!(
                "buffer of {} by a non-zero distance",
                GeometryType::from_geometry(geom).as_str()
            ))),
        }
    }

    fn intersects(&self, a: &Geometry<f64>, b: &Geometry<f64>) -> bool {
        a.intersects(b)
    }

    fn bounding_box(&self, geom: &Geometry<f64>) -> Option<BBox> {
        BBox::from_geometry(geom)
    }

    fn is_valid(&self, geom: &Geometry<f64>) -> bool {
        geom.is_valid()
    }
}

/// Normalise an areal geometry to a multipolygon.
///
/// Returns `None` for points, lines and collections containing them.
pub fn to_multipolygon(geom: &Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geom {
        Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p.clone()])),
        Geometry::MultiPolygon(mp) => Some(mp.clone()),
        Geometry::Rect(r) => Some(MultiPolygon::new(vec![r.to_polygon()])),
        Geometry::Triangle(t) => Some(MultiPolygon::new(vec![t.to_polygon()])),
        Geometry::GeometryCollection(gc) => {
            let mut polygons = Vec::new();
            for member in gc.iter() {
                polygons.extend(to_multipolygon(member)?.0);
            }
            Some(MultiPolygon::new(polygons))
        }
        _ => None,
    }
}

/// True when the geometry has no coordinates at all.
pub fn is_empty(geom: &Geometry<f64>) -> bool {
    match geom {
        Geometry::MultiPolygon(mp) => mp.0.is_empty(),
        Geometry::MultiPoint(mp) => mp.0.is_empty(),
        Geometry::MultiLineString(ml) => ml.0.is_empty(),
        Geometry::LineString(ls) => ls.0.is_empty(),
        Geometry::Polygon(p) => p.exterior().0.is_empty(),
        Geometry::GeometryCollection(gc) => gc.iter().all(is_empty),
        _ => false,
    }
}

/// Parse WKT string to geo-types Geometry.
pub fn parse_wkt(wkt: &str) -> Result<Geometry<f64>> {
    use wkt::TryFromWkt;
    Geometry::<f64>::try_from_wkt_str(wkt).map_err(|e| SpatialError::WktParse(format!("{:?}", e)))
}
