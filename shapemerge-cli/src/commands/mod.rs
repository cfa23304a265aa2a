pub mod dissolve;
pub mod point_match;

use crate::error::{CliError, CliResult};
use shapemerge_core::{GeoJsonSink, GeoJsonSource};
use std::fs;
use std::path::Path;

/// Open a GeoJSON input, naming the file in the error.
pub(crate) fn open_source(path: &Path) -> CliResult<GeoJsonSource> {
    GeoJsonSource::open(path).map_err(|e| match e {
        shapemerge_core::Error::Io(io) => {
            CliError::Input(format!("failed to read {}: {io}", path.display()))
        }
        other => other.into(),
    })
}

/// Sink that buffers the collection in memory until the run succeeds.
pub(crate) fn buffered_sink() -> GeoJsonSink<Vec<u8>> {
    GeoJsonSink::new(Vec::new())
}

/// Write a finished sink to `path`.
pub(crate) fn write_output(path: &Path, sink: GeoJsonSink<Vec<u8>>) -> CliResult<()> {
    fs::write(path, sink.into_inner())
        .map_err(|e| CliError::Input(format!("failed to write {}: {e}", path.display())))
}
