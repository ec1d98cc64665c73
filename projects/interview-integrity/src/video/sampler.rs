use crate::video::VideoReader;
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use opencv::core::Mat;

/// Slack on the interval comparison. Backends that derive milliseconds from
/// a floating time base report 15 frames of 1/30 s as 499.99999999999994.
const TIMESTAMP_TOLERANCE_MS: f64 = 1e-3;

/// A frame picked for analysis.
pub struct SampledFrame {
    /// Position among sampled frames, starting at 0
    pub index: usize,
    pub mat: Mat,
    /// Seconds from video start
    pub timestamp: f64,
}

/// Walks a video and yields one frame per sampling interval of presentation time.
///
/// The first decoded frame is always emitted. After that a frame is emitted only
/// when its timestamp is at least `interval_ms` past the last emitted one; all
/// frames in between are decoded and dropped. The sampler consumes its reader and
/// cannot be restarted; the reader is released when the sampler is dropped.
pub struct FrameSampler {
    reader: Box<dyn VideoReader>,
    interval_ms: f64,
    last_processed_ms: Option<f64>,
    decoded_frames: usize,
    sampled_frames: usize,
    finished: bool,
    pb: ProgressBar,
}

impl FrameSampler {
    pub fn new(reader: Box<dyn VideoReader>, interval_ms: f64) -> Self {
        Self {
            reader,
            interval_ms,
            last_processed_ms: None,
            decoded_frames: 0,
            sampled_frames: 0,
            finished: false,
            pb: ProgressBar::hidden(),
        }
    }

    /// Show a progress bar sized from the container's frame count.
    pub fn with_progress(mut self) -> Result<Self> {
        let total_frames = self.reader.frame_count()?;
        let source_fps = self.reader.source_fps()?;
        let duration_ms = if source_fps > 0.0 {
            total_frames as f64 / source_fps * 1000.0
        } else {
            0.0
        };
        let expected = (duration_ms / self.interval_ms).floor() as u64 + 1;

        let pb = ProgressBar::new(expected);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} samples ({per_sec:.1.yellow}, {eta})")?
                .progress_chars("#>-"),
        );
        self.pb = pb;
        Ok(self)
    }

    pub fn decoded_frames(&self) -> usize {
        self.decoded_frames
    }

    pub fn sampled_frames(&self) -> usize {
        self.sampled_frames
    }

    fn is_due(&self, timestamp_ms: f64) -> bool {
        match self.last_processed_ms {
            None => true,
            Some(last) => timestamp_ms - last >= self.interval_ms - TIMESTAMP_TOLERANCE_MS,
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        self.pb.finish_and_clear();
    }
}

impl Iterator for FrameSampler {
    type Item = Result<SampledFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            let frame = match self.reader.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    tracing::debug!(
                        "FrameSampler: end of stream after {} decoded / {} sampled frames",
                        self.decoded_frames,
                        self.sampled_frames
                    );
                    self.finish();
                    return None;
                }
                Err(e) => {
                    self.finish();
                    return Some(Err(e));
                }
            };
            self.decoded_frames += 1;

            if !self.is_due(frame.timestamp_ms) {
                continue;
            }

            self.last_processed_ms = Some(frame.timestamp_ms);
            let sampled = SampledFrame {
                index: self.sampled_frames,
                mat: frame.mat,
                timestamp: frame.timestamp_ms / 1000.0,
            };
            self.sampled_frames += 1;
            self.pb.inc(1);
            return Some(Ok(sampled));
        }
    }
}
