// Analysis configuration
//
// Detector parameters and decision thresholds live here as a plain value
// object so tests and config files can override them without touching the
// detection code.

use crate::video::VideoBackend;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const FACE_CASCADE_FILE: &str = "haarcascade_frontalface_default.xml";
pub const EYE_CASCADE_FILE: &str = "haarcascade_eye.xml";
pub const DEFAULT_CASCADE_DIR: &str = "/usr/share/opencv4/haarcascades";

/// Parameters handed to a cascade detector's multi-scale search.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct CascadeParams {
    pub scale_factor: f64,
    pub min_neighbors: i32,
    /// Minimum square region edge, in pixels
    pub min_size: i32,
}

impl CascadeParams {
    pub fn face() -> Self {
        Self {
            scale_factor: 1.15,
            min_neighbors: 4,
            min_size: 60,
        }
    }

    pub fn eye() -> Self {
        Self {
            scale_factor: 1.15,
            min_neighbors: 4,
            min_size: 12,
        }
    }
}

/// Thresholds for sampling and for the per-frame attention decision.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Minimum presentation-time gap between two sampled frames
    pub sampling_interval_ms: f64,
    /// Face center displacement above which the candidate counts as looking away
    pub face_movement_threshold_px: f64,
    /// Fewer eyes than this inside the primary face counts as looking away
    pub min_eye_count: usize,
    pub face_detection: CascadeParams,
    pub eye_detection: CascadeParams,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sampling_interval_ms: 500.0,
            face_movement_threshold_px: 25.0,
            min_eye_count: 2,
            face_detection: CascadeParams::face(),
            eye_detection: CascadeParams::eye(),
        }
    }
}

impl AnalysisConfig {
    /// Load overrides from a JSON file. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read analysis config: {}", path.display()))?;
        let config: AnalysisConfig = serde_json::from_str(&content)
            .with_context(|| format!("Invalid analysis config: {}", path.display()))?;
        Ok(config)
    }
}

/// Everything one `analyze_video` call needs besides the two paths.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub analysis: AnalysisConfig,
    pub cascade_dir: PathBuf,
    pub backend: VideoBackend,
    pub show_progress: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            analysis: AnalysisConfig::default(),
            cascade_dir: PathBuf::from(DEFAULT_CASCADE_DIR),
            backend: VideoBackend::default(),
            show_progress: false,
        }
    }
}

impl EngineSettings {
    pub fn face_cascade_path(&self) -> PathBuf {
        self.cascade_dir.join(FACE_CASCADE_FILE)
    }

    pub fn eye_cascade_path(&self) -> PathBuf {
        self.cascade_dir.join(EYE_CASCADE_FILE)
    }
}
