use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "shapemerge",
    about = "Dissolve polygons by attribute and aggregate points onto polygons",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output (also respects NO_COLOR env var)
    #[arg(long, global = true)]
    pub no_color: bool,

    /// TOML file with [dissolve] and [point_match] defaults
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Merge polygons that share attribute values
    Dissolve(DissolveArgs),

    /// Aggregate point attributes onto the polygons they fall in
    PointMatch(PointMatchArgs),
}

#[derive(Args, Debug)]
pub struct DissolveArgs {
    /// GeoJSON file to read
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// GeoJSON file to write
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,

    /// Comma separated fields to group by
    #[arg(
        short = 'f',
        long = "fields",
        value_delimiter = ',',
        value_name = "F1,F2"
    )]
    pub fields: Vec<String>,

    /// Collect a field across each group (repeatable)
    #[arg(short = 'c', long = "collector", value_name = "INPUT:OP[:OUTPUT]")]
    pub collectors: Vec<String>,

    /// Dissolve every feature into a single group
    #[arg(long, conflicts_with = "fields")]
    pub all_in_one: bool,

    /// Union groups in parallel
    #[arg(long)]
    pub parallel: bool,
}

#[derive(Args, Debug)]
pub struct PointMatchArgs {
    /// GeoJSON file with point features
    #[arg(long = "points", alias = "point-input")]
    pub points: PathBuf,

    /// GeoJSON file with polygon features
    #[arg(long = "polys", alias = "poly-input")]
    pub polys: PathBuf,

    /// GeoJSON file to write
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,

    /// Comma separated polygon fields to copy to the output
    #[arg(long = "poly-fields", value_delimiter = ',', value_name = "F1,F2")]
    pub poly_fields: Vec<String>,

    /// Collect a point field onto matching polygons (repeatable)
    #[arg(short = 'c', long = "collector", value_name = "INPUT:OP[:OUTPUT]")]
    pub collectors: Vec<String>,

    /// Match radius around each point, in meters
    #[arg(short = 'r', long = "radius")]
    pub radius: Option<f64>,

    /// Segments per quarter circle when buffering points
    #[arg(long = "segments")]
    pub segments: Option<usize>,

    /// Run point queries in parallel
    #[arg(long)]
    pub parallel: bool,
}
