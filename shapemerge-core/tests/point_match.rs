//! End-to-end point-match runs over in-memory sources.

use geo_types::{Geometry, Point};
use shapemerge_core::{
    ConfigError, Error, Feature, FeatureSource, FieldType, MemorySink, MemorySource,
    PointMatchConfig, PointMatchPipeline, PointMatcher, Result, Schema, Value,
};
use shapemerge_spatial::{parse_wkt, BBox, GeoKernel, METERS_PER_DEGREE};
use std::cell::Cell;
use std::rc::Rc;

fn polygon_schema() -> Schema {
    Schema::new("Polygon")
        .with_field("ZONE", FieldType::String)
        .with_field("LABEL", FieldType::String)
}

fn point_schema() -> Schema {
    Schema::new("Point")
        .with_field("NAME", FieldType::String)
        .with_field("VALUE", FieldType::Float)
}

fn square(x: f64, y: f64, size: f64) -> Geometry<f64> {
    parse_wkt(&format!(
        "POLYGON(({x} {y}, {x1} {y}, {x1} {y1}, {x} {y1}, {x} {y}))",
        x = x,
        y = y,
        x1 = x + size,
        y1 = y + size
    ))
    .unwrap()
}

fn zone(id: u64, name: &str, geometry: Geometry<f64>) -> Feature {
    Feature::new(id, geometry)
        .with_property("ZONE", name)
        .with_property("LABEL", format!("zone {}", name))
}

fn point(id: u64, x: f64, y: f64, name: &str, value: f64) -> Feature {
    Feature::new(id, Geometry::Point(Point::new(x, y)))
        .with_property("NAME", name)
        .with_property("VALUE", value)
}

fn run(
    config: PointMatchConfig,
    polygons: Vec<Feature>,
    points: Vec<Feature>,
) -> (shapemerge_core::PointMatchReport, MemorySink) {
    let kernel = config.kernel();
    let mut polys = MemorySource::new(polygon_schema(), polygons);
    let mut pts = MemorySource::new(point_schema(), points);
    let mut sink = MemorySink::new();
    let report = PointMatchPipeline::new(config, &kernel)
        .run(&mut polys, &mut pts, &mut sink)
        .unwrap();
    (report, sink)
}

/// 0.01 degree square, point 500 m east of its east edge.
fn near_miss() -> (Vec<Feature>, Vec<Feature>) {
    let polygons = vec![zone(0, "Z", square(0.0, 0.0, 0.01))];
    let x = 0.01 + 500.0 / METERS_PER_DEGREE;
    let points = vec![point(0, x, 0.005, "p", 1.0)];
    (polygons, points)
}

#[test]
fn radius_reaches_nearby_polygon() {
    let (polygons, points) = near_miss();
    let config = PointMatchConfig::default()
        .with_match_radius(1000.0)
        .with_collector("NAME:count:hits".parse().unwrap());

    let (report, sink) = run(config, polygons, points);
    assert_eq!(report.matches, 1);
    assert_eq!(sink.features.len(), 1);
    assert_eq!(sink.features[0].get("hits"), &Value::Integer(1));
}

#[test]
fn without_radius_nearby_point_does_not_match() {
    let (polygons, points) = near_miss();
    let config = PointMatchConfig::default().with_collector("NAME:count:hits".parse().unwrap());

    let (report, sink) = run(config, polygons, points);
    assert_eq!(report.matches, 0);
    assert_eq!(report.points_without_match, 1);
    assert_eq!(report.skipped_no_match, 1);
    assert!(sink.features.is_empty());
}

#[test]
fn points_with_null_inputs_still_count_as_matches() {
    let polygons = vec![
        zone(0, "Z", square(0.0, 0.0, 1.0)),
        zone(1, "Y", square(5.0, 5.0, 1.0)),
    ];
    let points = vec![
        point(0, 0.5, 0.5, "a", 2.0),
        Feature::new(1, Geometry::Point(Point::new(0.25, 0.25))).with_property("NAME", "b"),
        Feature::new(2, Geometry::Point(Point::new(5.5, 5.5)))
            .with_property("NAME", "c")
            .with_property("VALUE", Value::Null),
    ];
    let config = PointMatchConfig::default()
        .with_copied_polygon_fields(["ZONE"])
        .with_collector("VALUE:count:hits".parse().unwrap());

    let (report, sink) = run(config, polygons, points);
    assert_eq!(report.matches, 3);
    assert_eq!(report.emitted, 2);
    assert_eq!(report.skipped_no_match, 0);

    let z = sink.find("ZONE", &Value::from("Z")).unwrap();
    assert_eq!(z.get("hits"), &Value::Integer(2));
    // Every matched point carries a null VALUE, the polygon is still written.
    let y = sink.find("ZONE", &Value::from("Y")).unwrap();
    assert_eq!(y.get("hits"), &Value::Integer(1));
}

#[test]
fn boundary_point_matches() {
    let polygons = vec![zone(0, "Z", square(0.0, 0.0, 1.0))];
    let points = vec![point(0, 1.0, 0.5, "edge", 3.0), point(1, 0.0, 0.0, "corner", 4.0)];
    let config = PointMatchConfig::default().with_collector("VALUE:sum:total".parse().unwrap());

    let (_, sink) = run(config, polygons, points);
    assert_eq!(sink.features[0].get("total"), &Value::Float(7.0));
}

#[test]
fn point_fans_out_to_every_intersecting_polygon() {
    let polygons = vec![
        zone(0, "west", square(0.0, 0.0, 1.0)),
        zone(1, "east", square(1.0, 0.0, 1.0)),
        zone(2, "far", square(10.0, 10.0, 1.0)),
    ];
    let points = vec![
        point(0, 1.0, 0.5, "shared", 1.0),
        point(1, 0.5, 0.5, "west only", 2.0),
    ];
    let config = PointMatchConfig::default()
        .with_copied_polygon_fields(["zone"])
        .with_collector("NAME:join:names".parse().unwrap())
        .with_collector("VALUE:avg:mean".parse().unwrap());

    let (report, sink) = run(config, polygons, points);
    assert_eq!(report.polygons, 3);
    assert_eq!(report.matches, 3);
    assert_eq!(report.emitted, 2);
    assert_eq!(report.skipped_no_match, 1);

    let west = sink.find("ZONE", &Value::from("west")).unwrap();
    assert_eq!(west.get("names"), &Value::from("shared,west only"));
    assert_eq!(west.get("mean"), &Value::Float(1.5));
    let east = sink.find("ZONE", &Value::from("east")).unwrap();
    assert_eq!(east.get("names"), &Value::from("shared"));
    // Copied fields only; LABEL was not requested.
    assert_eq!(east.get("LABEL"), &Value::Null);

    let schema = sink.schema.unwrap();
    assert_eq!(schema.geometry_type, "Polygon");
    assert_eq!(
        schema.fields,
        vec![
            ("ZONE".to_string(), FieldType::String),
            ("names".to_string(), FieldType::String),
            ("mean".to_string(), FieldType::Float),
        ]
    );
}

#[test]
fn narrow_phase_filters_bbox_candidates() {
    // Triangle whose bounding box holds the point but whose area does not.
    let polygons = vec![zone(0, "tri", parse_wkt("POLYGON((0 0, 1 0, 0 1, 0 0))").unwrap())];
    let kernel = GeoKernel::new();
    let config = PointMatchConfig::default();
    let mut polys = MemorySource::new(polygon_schema(), polygons);
    let matcher = PointMatcher::build(&config, &kernel, &mut polys, &point_schema()).unwrap();

    let query_box = BBox::from_point(0.9, 0.9);
    assert_eq!(matcher.index().candidates(&query_box), vec![0]);
    assert!(matcher.query(&point(0, 0.9, 0.9, "out", 0.0)).unwrap().is_empty());
    assert_eq!(matcher.query(&point(1, 0.1, 0.1, "in", 0.0)).unwrap(), vec![0]);
}

#[test]
fn disc_resolution_comes_from_config() {
    // Small square on the diagonal, 0.89 degrees from the origin: inside a
    // fine disc of radius 1, outside the diamond a one-segment disc makes.
    let polygons = || vec![zone(0, "diag", square(0.63, 0.63, 0.01))];
    let origin = point(0, 0.0, 0.0, "origin", 1.0);
    let kernel = GeoKernel::new();

    let coarse = PointMatchConfig::default()
        .with_match_radius(METERS_PER_DEGREE)
        .with_disc_segments(1);
    let mut polys = MemorySource::new(polygon_schema(), polygons());
    let matcher = PointMatcher::build(&coarse, &kernel, &mut polys, &point_schema()).unwrap();
    assert!(matcher.query(&origin).unwrap().is_empty());

    let fine = coarse.clone().with_disc_segments(30);
    let mut polys = MemorySource::new(polygon_schema(), polygons());
    let matcher = PointMatcher::build(&fine, &kernel, &mut polys, &point_schema()).unwrap();
    assert_eq!(matcher.query(&origin).unwrap(), vec![0]);
}

#[test]
fn parallel_queries_keep_point_order() {
    let polygons = vec![zone(0, "A", square(0.0, 0.0, 10.0))];
    let points: Vec<Feature> = (0..200)
        .map(|i| {
            let (x, y) = ((i % 10) as f64 + 0.5, (i / 20) as f64 + 0.5);
            point(i, x, y, &format!("p{}", i), i as f64)
        })
        .collect();

    let sequential = run(
        PointMatchConfig::default()
            .with_collector("NAME:first:first".parse().unwrap())
            .with_collector("NAME:last:last".parse().unwrap()),
        polygons.clone(),
        points.clone(),
    );
    let parallel = run(
        PointMatchConfig::default()
            .with_collector("NAME:first:first".parse().unwrap())
            .with_collector("NAME:last:last".parse().unwrap())
            .with_parallel(true),
        polygons,
        points,
    );

    assert_eq!(sequential.0, parallel.0);
    let seq = &sequential.1.features[0];
    let par = &parallel.1.features[0];
    assert_eq!(seq.get("first"), &Value::from("p0"));
    assert_eq!(seq.get("last"), &Value::from("p199"));
    assert_eq!(seq.properties, par.properties);
}

/// Source that counts how many features were pulled from it.
struct CountingSource {
    inner: MemorySource,
    reads: Rc<Cell<usize>>,
}

impl FeatureSource for CountingSource {
    fn schema(&self) -> &Schema {
        self.inner.schema()
    }

    fn next_feature(&mut self) -> Result<Option<Feature>> {
        self.reads.set(self.reads.get() + 1);
        self.inner.next_feature()
    }
}

#[test]
fn configuration_errors_abort_before_reading() {
    let kernel = GeoKernel::new();
    let cases = vec![
        PointMatchConfig::default().with_collector("NAME:mode:x".parse().unwrap()),
        PointMatchConfig::default().with_collector("MISSING:count:x".parse().unwrap()),
        PointMatchConfig::default().with_copied_polygon_fields(["nope"]),
        PointMatchConfig::default()
            .with_copied_polygon_fields(["ZONE"])
            .with_collector("NAME:count:zone".parse().unwrap()),
        PointMatchConfig::default().with_match_radius(-1.0),
    ];

    for config in cases {
        let poly_reads = Rc::new(Cell::new(0));
        let point_reads = Rc::new(Cell::new(0));
        let mut polys = CountingSource {
            inner: MemorySource::new(polygon_schema(), vec![zone(0, "Z", square(0.0, 0.0, 1.0))]),
            reads: Rc::clone(&poly_reads),
        };
        let mut points = CountingSource {
            inner: MemorySource::new(point_schema(), vec![point(0, 0.5, 0.5, "p", 1.0)]),
            reads: Rc::clone(&point_reads),
        };
        let mut sink = MemorySink::new();

        let err = PointMatchPipeline::new(config.clone(), &kernel)
            .run(&mut polys, &mut points, &mut sink)
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)), "{:?}: {}", config, err);
        assert_eq!(poly_reads.get(), 0);
        assert_eq!(point_reads.get(), 0);
    }
}

#[test]
fn numeric_operator_on_text_field_is_rejected() {
    let kernel = GeoKernel::new();
    let mut polys = MemorySource::new(polygon_schema(), Vec::new());
    let config = PointMatchConfig::default().with_collector("NAME:sum:total".parse().unwrap());
    let err = PointMatcher::build(&config, &kernel, &mut polys, &point_schema())
        .err()
        .unwrap();
    assert!(matches!(
        err,
        Error::Config(ConfigError::NonNumericInput { ref field, .. }) if field == "NAME"
    ));
}
