// Integrity analysis pipeline: detection, per-frame analysis, aggregation

pub mod aggregator;
pub mod analyzer;
pub mod detection;
pub mod geometry;
pub mod summary;
pub mod types;
