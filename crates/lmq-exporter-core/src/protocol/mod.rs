//! Wire-level contracts.
//!
//! - `stats`: the upstream `/stats` JSON document
//! - `exposition`: metric descriptors and the Prometheus text format

pub mod exposition;
pub mod stats;
