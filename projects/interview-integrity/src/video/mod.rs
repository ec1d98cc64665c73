pub mod ffmpeg_reader;
pub mod opencv_reader;
pub mod sampler;

use anyhow::Result;
use opencv::core::Mat;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A decoded BGR frame and its presentation time relative to stream start.
pub struct DecodedFrame {
    pub mat: Mat,
    pub timestamp_ms: f64,
}

pub trait VideoReader: Send {
    /// Frame count reported by the container (may be an estimate).
    fn frame_count(&self) -> Result<usize>;
    fn source_fps(&self) -> Result<f64>;
    /// Decode the next frame. `Ok(None)` marks end of stream.
    fn next_frame(&mut self) -> Result<Option<DecodedFrame>>;
}

#[derive(clap::ValueEnum, Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VideoBackend {
    #[default]
    Opencv,
    Ffmpeg,
}

pub fn open_reader(path: &Path, backend: VideoBackend) -> Result<Box<dyn VideoReader>> {
    use ffmpeg_reader::FfmpegReader;
    use opencv_reader::OpencvReader;

    let reader: Box<dyn VideoReader> = match backend {
        VideoBackend::Opencv => Box::new(OpencvReader::new(path)?),
        VideoBackend::Ffmpeg => Box::new(FfmpegReader::new(path)?),
    };
    Ok(reader)
}
