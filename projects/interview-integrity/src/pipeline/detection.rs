use crate::config::CascadeParams;
use anyhow::{anyhow, bail, Context, Result};
use opencv::core::{Mat, Rect, Size, Vector};
use opencv::objdetect::{CascadeClassifier, CASCADE_SCALE_IMAGE};
use opencv::prelude::*;
use std::path::Path;

/// Finds candidate regions (faces, eyes) in a grayscale image.
pub trait RegionDetector {
    fn detect(&mut self, image: &Mat, params: &CascadeParams) -> Result<Vec<Rect>>;
}

/// A wrapper around an OpenCV Haar cascade.
pub struct CascadeDetector {
    classifier: CascadeClassifier,
    label: String,
}

impl CascadeDetector {
    /// Load a cascade from its XML definition.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!("Cascade file not found: {}", path.display());
        }
        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow!("Cascade path is not valid UTF-8: {}", path.display()))?;

        let classifier = CascadeClassifier::new(path_str)
            .with_context(|| format!("Failed to load cascade: {}", path.display()))?;
        if classifier.empty()? {
            bail!("Cascade is empty or malformed: {}", path.display());
        }

        let label = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("cascade")
            .to_string();
        tracing::debug!("Loaded cascade '{}' from {}", label, path.display());

        Ok(Self { classifier, label })
    }
}

impl RegionDetector for CascadeDetector {
    fn detect(&mut self, image: &Mat, params: &CascadeParams) -> Result<Vec<Rect>> {
        let mut regions = Vector::<Rect>::new();
        self.classifier
            .detect_multi_scale(
                image,
                &mut regions,
                params.scale_factor,
                params.min_neighbors,
                CASCADE_SCALE_IMAGE,
                Size::new(params.min_size, params.min_size),
                Size::default(),
            )
            .with_context(|| format!("Cascade '{}' detection failed", self.label))?;
        Ok(regions.to_vec())
    }
}
