use crate::cli::DissolveArgs;
use crate::commands::{buffered_sink, open_source, write_output};
use crate::config::{clean_fields, parse_collectors};
use crate::error::CliResult;
use colored::Colorize;
use shapemerge_core::{DissolveConfig, DissolvePipeline, DissolveReport};
use shapemerge_spatial::GeoKernel;

/// Layer command-line flags over the file defaults.
pub fn resolve_config(args: &DissolveArgs, mut config: DissolveConfig) -> CliResult<DissolveConfig> {
    let fields = clean_fields(&args.fields);
    if !fields.is_empty() {
        config.group_by = fields;
        config.all_in_one_group = false;
    }
    if args.all_in_one {
        config.all_in_one_group = true;
        config.group_by.clear();
    }
    if !args.collectors.is_empty() {
        config.collectors = parse_collectors(&args.collectors)?;
    }
    config.parallel |= args.parallel;
    config.validate()?;
    Ok(config)
}

pub fn run(args: &DissolveArgs, config: DissolveConfig, quiet: bool) -> CliResult<DissolveReport> {
    let config = resolve_config(args, config)?;
    let kernel = GeoKernel::new();
    let pipeline = DissolvePipeline::new(config, &kernel);

    let mut source = open_source(&args.input)?;
    let mut sink = buffered_sink();
    let report = pipeline.run(&mut source, &mut sink)?;
    write_output(&args.output, sink)?;

    if source.dropped() > 0 {
        tracing::warn!(dropped = source.dropped(), "input features without geometry were skipped");
    }
    if !quiet {
        println!("{} {}", "Dissolved:".green().bold(), report);
    }
    Ok(report)
}
