//! End-to-end dissolve runs over in-memory sources.

use geo::Area;
use geo_types::{Geometry, MultiPolygon};
use shapemerge_core::{
    ConfigError, DissolveConfig, DissolvePipeline, Error, Feature, FeatureSource, FieldType,
    MemorySink, MemorySource, Result, Schema, Value,
};
use shapemerge_spatial::{parse_wkt, GeoKernel};
use std::cell::Cell;
use std::rc::Rc;

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

fn region_schema() -> Schema {
    Schema::new("Polygon")
        .with_field("REGION", FieldType::String)
        .with_field("POP", FieldType::Integer)
        .with_field("NAME", FieldType::String)
}

fn region_features() -> Vec<Feature> {
    vec![
        Feature::new(0, square(0.0, 0.0, 1.0))
            .with_property("REGION", "A")
            .with_property("POP", 10i64)
            .with_property("NAME", "alpha"),
        Feature::new(1, square(1.0, 0.0, 1.0))
            .with_property("REGION", "A")
            .with_property("POP", 20i64)
            .with_property("NAME", "beta"),
        Feature::new(2, square(5.0, 5.0, 2.0))
            .with_property("REGION", "B")
            .with_property("POP", 5i64)
            .with_property("NAME", "gamma"),
    ]
}

fn area(feature: &Feature) -> f64 {
    match &feature.geometry {
        Geometry::MultiPolygon(mp) => mp.unsigned_area(),
        other => panic!("expected multipolygon output, got {:?}", other),
    }
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
fn count_collector_per_region() {
    let kernel = GeoKernel::new();
    let config = DissolveConfig::default()
        .with_group_by(["REGION"])
        .with_collector("POP:count:count".parse().unwrap());
    let mut source = MemorySource::new(region_schema(), region_features());
    let mut sink = MemorySink::new();

    let report = DissolvePipeline::new(config, &kernel)
        .run(&mut source, &mut sink)
        .unwrap();

    assert_eq!(report.features_seen, 3);
    assert_eq!(report.emitted, 2);
    assert_eq!(sink.features.len(), 2);

    let a = sink.find("REGION", &Value::from("A")).unwrap();
    let b = sink.find("REGION", &Value::from("B")).unwrap();
    assert_eq!(a.get("count"), &Value::Integer(2));
    assert_eq!(b.get("count"), &Value::Integer(1));
    assert!((area(a) - 2.0).abs() < 1e-9);
    assert!((area(b) - 4.0).abs() < 1e-9);
    assert!(sink.finished);
}

#[test]
fn count_includes_null_inputs() {
    let kernel = GeoKernel::new();
    let features = vec![
        Feature::new(0, square(0.0, 0.0, 1.0))
            .with_property("REGION", "A")
            .with_property("POP", 5i64),
        Feature::new(1, square(1.0, 0.0, 1.0))
            .with_property("REGION", "A")
            .with_property("POP", Value::Null),
        // POP absent altogether.
        Feature::new(2, square(5.0, 5.0, 1.0)).with_property("REGION", "B"),
    ];
    let config = DissolveConfig::default()
        .with_group_by(["REGION"])
        .with_collector("POP:count:n".parse().unwrap())
        .with_collector("POP:sum:total".parse().unwrap());
    let mut source = MemorySource::new(region_schema(), features);
    let mut sink = MemorySink::new();

    DissolvePipeline::new(config, &kernel)
        .run(&mut source, &mut sink)
        .unwrap();

    let a = sink.find("REGION", &Value::from("A")).unwrap();
    let b = sink.find("REGION", &Value::from("B")).unwrap();
    assert_eq!(a.get("n"), &Value::Integer(2));
    assert_eq!(a.get("total"), &Value::Float(5.0));
    assert_eq!(b.get("n"), &Value::Integer(1));
    assert_eq!(b.get("total"), &Value::Null);
}

#[test]
fn output_schema_and_first_encounter_order() {
    let kernel = GeoKernel::new();
    let mut features = region_features();
    features.rotate_left(2); // B first
    let config = DissolveConfig::default()
        .with_group_by(["region"])
        .with_collector("pop:sum:total".parse().unwrap())
        .with_collector("name:join:names".parse().unwrap())
        .with_collector("name:last".parse().unwrap());
    let mut source = MemorySource::new(region_schema(), features);
    let mut sink = MemorySink::new();

    DissolvePipeline::new(config, &kernel)
        .run(&mut source, &mut sink)
        .unwrap();

    let schema = sink.schema.clone().unwrap();
    assert_eq!(schema.geometry_type, "MultiPolygon");
    assert_eq!(
        schema.fields,
        vec![
            ("REGION".to_string(), FieldType::String),
            ("total".to_string(), FieldType::Float),
            ("names".to_string(), FieldType::String),
            ("NAME".to_string(), FieldType::String),
        ]
    );

    let regions: Vec<&Value> = sink.features.iter().map(|f| f.get("REGION")).collect();
    assert_eq!(regions, vec![&Value::from("B"), &Value::from("A")]);

    let a = &sink.features[1];
    assert_eq!(a.get("total"), &Value::Float(30.0));
    assert_eq!(a.get("names"), &Value::from("alpha,beta"));
    assert_eq!(a.get("NAME"), &Value::from("beta"));
}

#[test]
fn all_in_one_group() {
    let kernel = GeoKernel::new();
    let config = DissolveConfig::default()
        .with_all_in_one_group(true)
        .with_collector("POP:max:biggest".parse().unwrap());
    let mut source = MemorySource::new(region_schema(), region_features());
    let mut sink = MemorySink::new();

    let report = DissolvePipeline::new(config, &kernel)
        .run(&mut source, &mut sink)
        .unwrap();

    assert_eq!(report.groups, 1);
    assert_eq!(sink.features.len(), 1);
    let only = &sink.features[0];
    assert_eq!(only.get("biggest"), &Value::Float(20.0));
    assert!((area(only) - 6.0).abs() < 1e-9);
    assert_eq!(only.properties.len(), 1);
}

#[test]
fn repairable_bowtie_still_emitted() {
    let kernel = GeoKernel::new();
    let features = vec![Feature::new(0, parse_wkt("POLYGON((0 0, 2 2, 2 0, 0 2, 0 0))").unwrap())
        .with_property("REGION", "X")
        .with_property("POP", 1i64)];
    let config = DissolveConfig::default().with_group_by(["REGION"]);
    let mut source = MemorySource::new(region_schema(), features);
    let mut sink = MemorySink::new();

    let report = DissolvePipeline::new(config, &kernel)
        .run(&mut source, &mut sink)
        .unwrap();

    assert_eq!(report.repaired, 1);
    assert_eq!(report.emitted, 1);
    assert!((area(&sink.features[0]) - 2.0).abs() < 1e-9);
}

#[test]
fn group_with_no_valid_members_is_skipped() {
    let kernel = GeoKernel::new();
    let mut features = region_features();
    features.push(
        Feature::new(3, Geometry::MultiPolygon(MultiPolygon::new(Vec::new())))
            .with_property("REGION", "C")
            .with_property("POP", 1i64),
    );
    let config = DissolveConfig::default()
        .with_group_by(["REGION"])
        .with_collector("POP:count:n".parse().unwrap());
    let mut source = MemorySource::new(region_schema(), features);
    let mut sink = MemorySink::new();

    let report = DissolvePipeline::new(config, &kernel)
        .run(&mut source, &mut sink)
        .unwrap();

    assert_eq!(report.groups, 3);
    assert_eq!(report.emitted, 2);
    assert_eq!(report.skipped_empty_groups, 1);
    assert_eq!(report.dropped, 1);
    assert!(sink.find("REGION", &Value::from("C")).is_none());
}

#[test]
fn missing_group_value_aborts_run() {
    let kernel = GeoKernel::new();
    let mut features = region_features();
    features.insert(1, Feature::new(9, square(9.0, 9.0, 1.0)).with_property("POP", 1i64));
    let config = DissolveConfig::default().with_group_by(["REGION"]);
    let mut source = MemorySource::new(region_schema(), features);
    let mut sink = MemorySink::new();

    let err = DissolvePipeline::new(config, &kernel)
        .run(&mut source, &mut sink)
        .unwrap_err();

    assert!(matches!(
        err,
        Error::MissingGroupField { feature: 9, ref field } if field == "REGION"
    ));
    assert!(sink.features.is_empty());
    assert!(!sink.finished);
}

#[test]
fn unknown_operator_aborts_before_reading() {
    let kernel = GeoKernel::new();
    let reads = Rc::new(Cell::new(0));
    let mut source = CountingSource {
        inner: MemorySource::new(region_schema(), region_features()),
        reads: Rc::clone(&reads),
    };
    let config = DissolveConfig::default()
        .with_group_by(["REGION"])
        .with_collector("POP:median:m".parse().unwrap());
    let mut sink = MemorySink::new();

    let err = DissolvePipeline::new(config, &kernel)
        .run(&mut source, &mut sink)
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Config(ConfigError::UnknownOperator { ref name, .. }) if name == "median"
    ));
    assert_eq!(reads.get(), 0);
    assert!(sink.schema.is_none());
}

#[test]
fn collector_output_cannot_shadow_group_field() {
    let kernel = GeoKernel::new();
    let config = DissolveConfig::default()
        .with_group_by(["REGION"])
        .with_collector("POP:count:region".parse().unwrap());
    let mut source = MemorySource::new(region_schema(), region_features());
    let mut sink = MemorySink::new();

    let err = DissolvePipeline::new(config, &kernel)
        .run(&mut source, &mut sink)
        .unwrap_err();
    assert!(err.is_config());
}

#[test]
fn unknown_group_field_lists_alternatives() {
    let kernel = GeoKernel::new();
    let config = DissolveConfig::default().with_group_by(["COUNTY"]);
    let mut source = MemorySource::new(region_schema(), region_features());
    let mut sink = MemorySink::new();

    let err = DissolvePipeline::new(config, &kernel)
        .run(&mut source, &mut sink)
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("COUNTY"));
    assert!(message.contains("REGION,POP,NAME"));
}

#[test]
fn parallel_union_matches_sequential() {
    let kernel = GeoKernel::new();
    let mut features = Vec::new();
    for i in 0..40u64 {
        features.push(
            Feature::new(i, square((i % 10) as f64, (i / 10) as f64, 1.5))
                .with_property("REGION", format!("R{}", i % 4))
                .with_property("POP", i as i64),
        );
    }

    let run = |parallel: bool| {
        let config = DissolveConfig::default()
            .with_group_by(["REGION"])
            .with_collector("POP:sum:total".parse().unwrap())
            .with_parallel(parallel);
        let mut source = MemorySource::new(region_schema(), features.clone());
        let mut sink = MemorySink::new();
        DissolvePipeline::new(config, &kernel)
            .run(&mut source, &mut sink)
            .unwrap();
        sink.features
    };

    let sequential = run(false);
    let parallel = run(true);
    assert_eq!(sequential.len(), 4);
    for (s, p) in sequential.iter().zip(&parallel) {
        assert_eq!(s.properties, p.properties);
        assert!((area(s) - area(p)).abs() < 1e-9);
    }
}
