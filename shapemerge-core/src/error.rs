//! Error types for grouping, aggregation and matching runs

use thiserror::Error;

/// Configuration errors.
///
/// All of these are raised while binding a run against the source schema,
/// before any feature is read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No schema field matches the requested name
    #[error("field '{name}' not found in schema; possible values: {}", .available.join(","))]
    UnknownField { name: String, available: Vec<String> },

    /// More than one schema field matches case-insensitively
    #[error("field '{name}' is ambiguous; matches: {}", .matches.join(","))]
    AmbiguousField { name: String, matches: Vec<String> },

    /// Operator name not in the operator table
    #[error("operator '{name}' not found; available operators: {}", .available.join(","))]
    UnknownOperator { name: String, available: Vec<String> },

    /// Collector output would overwrite a group-by or copied field
    #[error("cannot have field '{0}' in both group by and collect")]
    OutputCollision(String),

    /// Two collectors write the same output field
    #[error("output field '{0}' is produced by more than one collector")]
    DuplicateOutput(String),

    /// Numeric operator bound to a non-numeric field
    #[error("operator '{operator}' requires a numeric field, but '{field}' is {field_type}")]
    NonNumericInput {
        operator: String,
        field: String,
        field_type: String,
    },

    /// Collector spec not in `input:op[:output]` form
    #[error("invalid collector '{0}': expected input:op[:output]")]
    InvalidCollectorSpec(String),

    /// Required option absent
    #[error("missing required option: {0}")]
    MissingOption(String),

    /// Options that cannot be combined
    #[error("conflicting options: {0}")]
    ConflictingOptions(String),

    /// Option present but out of range
    #[error("invalid option {name}: {reason}")]
    InvalidOption { name: String, reason: String },
}

/// Errors from a grouping or matching run
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration rejected before processing
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A feature has no value for a group-by field
    #[error("missing field {field} on feature {feature}")]
    MissingGroupField { feature: u64, field: String },

    /// Error from the geometry kernel or index
    #[error("Spatial error: {0}")]
    Spatial(#[from] shapemerge_spatial::SpatialError),

    /// I/O error from a source or sink
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Malformed GeoJSON input
    #[error("GeoJSON error: {0}")]
    GeoJson(String),
}

impl Error {
    /// True for errors raised before any feature was read.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

impl From<::geojson::Error> for Error {
    fn from(err: ::geojson::Error) -> Self {
        Error::GeoJson(err.to_string())
    }
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, Error>;
