use crate::cli::PointMatchArgs;
use crate::commands::{buffered_sink, open_source, write_output};
use crate::config::{clean_fields, parse_collectors};
use crate::error::CliResult;
use colored::Colorize;
use shapemerge_core::{PointMatchConfig, PointMatchPipeline, PointMatchReport};

/// Layer command-line flags over the file defaults.
pub fn resolve_config(
    args: &PointMatchArgs,
    mut config: PointMatchConfig,
) -> CliResult<PointMatchConfig> {
    let fields = clean_fields(&args.poly_fields);
    if !fields.is_empty() {
        config.copied_polygon_fields = fields;
    }
    if !args.collectors.is_empty() {
        config.collectors = parse_collectors(&args.collectors)?;
    }
    if let Some(radius) = args.radius {
        config.match_radius = Some(radius);
    }
    if let Some(segments) = args.segments {
        config.disc_segments = segments;
    }
    config.parallel |= args.parallel;
    config.validate()?;
    Ok(config)
}

pub fn run(
    args: &PointMatchArgs,
    config: PointMatchConfig,
    quiet: bool,
) -> CliResult<PointMatchReport> {
    let config = resolve_config(args, config)?;
    let kernel = config.kernel();
    let pipeline = PointMatchPipeline::new(config, &kernel);

    let mut points = open_source(&args.points)?;
    let mut polys = open_source(&args.polys)?;

    let mut sink = buffered_sink();
    let report = pipeline.run(&mut polys, &mut points, &mut sink)?;
    write_output(&args.output, sink)?;

    if !quiet {
        println!("{} {}", "Matched:".green().bold(), report);
    }
    Ok(report)
}
