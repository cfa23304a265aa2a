//! Optional TOML config file.
//!
//! ```toml
//! [dissolve]
//! group_by = ["REGION"]
//! collectors = ["POP:sum:TOTAL_POP"]
//!
//! [point_match]
//! match_radius = 1000.0
//! disc_segments = 16
//!
//! [point_match.index]
//! grid_cells_per_axis = 256
//! ```
//!
//! Values from the file are defaults; command-line flags win.

use crate::error::{CliError, CliResult};
use serde::Deserialize;
use shapemerge_core::{CollectorSpec, DissolveConfig, PointMatchConfig};
use std::fs;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub dissolve: DissolveConfig,
    pub point_match: PointMatchConfig,
}

impl FileConfig {
    /// Load `path`, or defaults when no file was given.
    pub fn load(path: Option<&Path>) -> CliResult<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config: FileConfig = toml::from_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }
}

/// Parse repeated `-c input:op[:output]` flags.
pub fn parse_collectors(raw: &[String]) -> CliResult<Vec<CollectorSpec>> {
    raw.iter()
        .map(|s| s.parse::<CollectorSpec>().map_err(CliError::from))
        .collect()
}

/// Trim comma-list entries and drop empty ones (`-f "A, B,"`).
pub fn clean_fields(raw: &[String]) -> Vec<String> {
    raw.iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
