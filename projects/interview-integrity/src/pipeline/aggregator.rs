// Session aggregator: drives sampler and analyzer over one recording
//
// One call analyzes one video end to end and writes proctoring_log.json.
// The run is blocking and single threaded; callers that need it off their
// request path schedule it on a blocking task (see `batch`).

use crate::config::EngineSettings;
use crate::pipeline::analyzer::FrameAnalyzer;
use crate::pipeline::detection::{CascadeDetector, RegionDetector};
use crate::pipeline::types::{FaceHistory, FrameAnalysis};
use crate::run_artifacts::{ProctoringLog, ScorePoint, SuspiciousEvent};
use crate::video::open_reader;
use crate::video::sampler::FrameSampler;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// What a finished run hands back besides the file on disk.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub results: Vec<FrameAnalysis>,
    pub suspicious_events: Vec<SuspiciousEvent>,
    pub log_path: PathBuf,
}

/// Accumulates per-frame records and the events derived from them, in sample order.
#[derive(Debug, Default)]
pub struct SessionAggregator {
    results: Vec<FrameAnalysis>,
    suspicious_events: Vec<SuspiciousEvent>,
}

impl SessionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, analysis: FrameAnalysis) {
        if let Some(event) = SuspiciousEvent::from_analysis(&analysis) {
            self.suspicious_events.push(event);
        }
        self.results.push(analysis);
    }

    pub fn results(&self) -> &[FrameAnalysis] {
        &self.results
    }

    pub fn suspicious_events(&self) -> &[SuspiciousEvent] {
        &self.suspicious_events
    }

    pub fn to_log(&self) -> ProctoringLog {
        ProctoringLog {
            scores_over_time: self
                .results
                .iter()
                .map(|r| ScorePoint {
                    timestamp: r.timestamp,
                    score: r.score(),
                })
                .collect(),
            suspicious_events: self.suspicious_events.clone(),
        }
    }

    fn into_parts(self) -> (Vec<FrameAnalysis>, Vec<SuspiciousEvent>) {
        (self.results, self.suspicious_events)
    }
}

/// Analyze every sampled frame and write the log to `output_dir`.
///
/// The face history lives only inside this call. Nothing is written unless the
/// whole stream was analyzed.
pub fn run_session<F, E>(
    mut sampler: FrameSampler,
    analyzer: &mut FrameAnalyzer<F, E>,
    output_dir: &Path,
) -> Result<AnalysisOutcome>
where
    F: RegionDetector,
    E: RegionDetector,
{
    let start = Instant::now();
    let mut history = FaceHistory::new();
    let mut aggregator = SessionAggregator::new();

    for sampled in sampler.by_ref() {
        let sampled = sampled.context("Failed to decode video")?;
        let analysis = analyzer
            .analyze(&sampled.mat, sampled.timestamp, &mut history)
            .with_context(|| format!("Failed to analyze frame at {:.2}s", sampled.timestamp))?;
        tracing::debug!(
            "sample {} at {:.2}s: faces={} eyes={} looking_away={} multi_face={}",
            sampled.index,
            analysis.timestamp,
            analysis.faces_detected,
            analysis.eyes_detected,
            analysis.looking_away,
            analysis.multi_face
        );
        aggregator.record(analysis);
    }
    let decoded = sampler.decoded_frames();
    // Release the decoder before touching the filesystem.
    drop(sampler);

    let log_path = aggregator.to_log().write_to_dir(output_dir)?;

    tracing::info!(
        "Analysis finished: {} decoded, {} sampled, {} suspicious in {:.2}s -> {}",
        decoded,
        aggregator.results().len(),
        aggregator.suspicious_events().len(),
        start.elapsed().as_secs_f64(),
        log_path.display()
    );

    let (results, suspicious_events) = aggregator.into_parts();
    Ok(AnalysisOutcome {
        results,
        suspicious_events,
        log_path,
    })
}

/// Analyze the recording at `video_path` and write `proctoring_log.json` into
/// `output_dir`, using OpenCV Haar cascades from `settings.cascade_dir`.
pub fn analyze_video(
    video_path: &Path,
    output_dir: &Path,
    settings: &EngineSettings,
) -> Result<AnalysisOutcome> {
    tracing::info!(
        "Starting analysis of {} ({:?} backend)",
        video_path.display(),
        settings.backend
    );

    let reader = open_reader(video_path, settings.backend)
        .with_context(|| format!("Cannot open video file: {}", video_path.display()))?;

    let face_detector = CascadeDetector::from_file(&settings.face_cascade_path())?;
    let eye_detector = CascadeDetector::from_file(&settings.eye_cascade_path())?;
    let mut analyzer = FrameAnalyzer::new(face_detector, eye_detector, settings.analysis.clone());

    let mut sampler = FrameSampler::new(reader, settings.analysis.sampling_interval_ms);
    if settings.show_progress {
        sampler = sampler.with_progress()?;
    }

    run_session(sampler, &mut analyzer, output_dir)
}
