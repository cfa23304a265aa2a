//! Error types for the geometry kernel and spatial index.

use thiserror::Error;

/// Spatial errors.
#[derive(Error, Debug)]
pub enum SpatialError {
    /// WKT parsing error.
    #[error("WKT parse error: {0}")]
    WktParse(String),

    /// Operation the kernel does not implement for this geometry kind.
    #[error("Unsupported geometry operation: {0}")]
    Unsupported(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for spatial operations.
pub type Result<T> = std::result::Result<T, SpatialError>;
