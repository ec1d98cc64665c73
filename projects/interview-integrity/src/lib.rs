//! Integrity analysis for recorded mock interviews.
//!
//! A recording is sampled every half second of presentation time, each sample
//! is checked for a missing or moving face, hidden eyes and extra faces, and
//! the resulting timeline is written to `proctoring_log.json`.

pub mod batch;
pub mod cli;
pub mod config;
pub mod pipeline;
pub mod run_artifacts;
pub mod run_context;
pub mod video;

pub use config::{AnalysisConfig, EngineSettings};
pub use pipeline::aggregator::{analyze_video, AnalysisOutcome};
