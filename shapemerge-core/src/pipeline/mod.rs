//! End-to-end runs over feature sources.
//!
//! - [`dissolve`]: group, union and reduce polygons
//! - [`point_match`]: index polygons, match points, reduce onto polygons
//!
//! Both bind their full configuration against the source schemas before the
//! first feature is read, so configuration errors never leave partial output.

pub mod dissolve;
pub mod point_match;

pub use dissolve::{DissolveConfig, DissolvePipeline, DissolveReport};
pub use point_match::{PointMatchConfig, PointMatchPipeline, PointMatchReport, PointMatcher};
