use crate::config::AnalysisConfig;
use crate::pipeline::detection::RegionDetector;
use crate::pipeline::geometry::{clamp_rect, euclidean_distance, largest_rect, rect_center};
use crate::pipeline::types::{FaceHistory, FrameAnalysis};
use anyhow::{Context, Result};
use opencv::core::Mat;
use opencv::imgproc::{cvt_color_def, COLOR_BGR2GRAY};
use opencv::prelude::*;

/// Classifies sampled frames as attentive or suspicious.
///
/// For every frame:
/// 1. Detects faces on the grayscale image; more than one sets `multi_face`.
/// 2. Takes the largest face as primary and measures how far its center moved
///    since the previous frame; moving further than the threshold sets `looking_away`.
/// 3. Counts eyes inside the primary face; fewer than the minimum sets `looking_away`.
/// 4. No face at all sets `looking_away`.
///
/// The face center (or its absence) is appended to the run's history exactly once.
pub struct FrameAnalyzer<F, E> {
    face_detector: F,
    eye_detector: E,
    config: AnalysisConfig,
}

impl<F, E> FrameAnalyzer<F, E>
where
    F: RegionDetector,
    E: RegionDetector,
{
    pub fn new(face_detector: F, eye_detector: E, config: AnalysisConfig) -> Self {
        Self {
            face_detector,
            eye_detector,
            config,
        }
    }

    pub fn analyze(
        &mut self,
        frame: &Mat,
        timestamp: f64,
        history: &mut FaceHistory,
    ) -> Result<FrameAnalysis> {
        let gray = to_grayscale(frame)?;
        let mut analysis = FrameAnalysis::new(timestamp);

        let faces = self
            .face_detector
            .detect(&gray, &self.config.face_detection)
            .context("Face detection failed")?;
        analysis.faces_detected = faces.len();
        analysis.multi_face = faces.len() > 1;

        let Some(primary) = largest_rect(&faces) else {
            analysis.looking_away = true;
            history.record(None);
            return Ok(analysis);
        };

        let center = rect_center(&primary);
        if let Some(previous) = history.previous() {
            analysis.face_movement = euclidean_distance(center, previous);
            if analysis.face_movement > self.config.face_movement_threshold_px {
                analysis.looking_away = true;
            }
        }

        analysis.eyes_detected = match clamp_rect(&primary, gray.cols(), gray.rows()) {
            Some(region) => {
                let face_roi = Mat::roi(&gray, region)?.clone_pointee();
                self.eye_detector
                    .detect(&face_roi, &self.config.eye_detection)
                    .context("Eye detection failed")?
                    .len()
            }
            None => 0,
        };
        if analysis.eyes_detected < self.config.min_eye_count {
            analysis.looking_away = true;
        }

        history.record(Some(center));

        tracing::trace!(
            "t={:.2}s faces={} eyes={} movement={:.1}",
            timestamp,
            analysis.faces_detected,
            analysis.eyes_detected,
            analysis.face_movement
        );

        Ok(analysis)
    }
}

fn to_grayscale(frame: &Mat) -> Result<Mat> {
    if frame.channels() == 1 {
        return Ok(frame.try_clone()?);
    }
    let mut gray = Mat::default();
    cvt_color_def(frame, &mut gray, COLOR_BGR2GRAY).context("Failed to convert to grayscale")?;
    Ok(gray)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CascadeParams;
    use crate::pipeline::detection::testing::LevelDetector;
    use crate::pipeline::types::FaceCenter;
    use opencv::core::{Rect, Scalar, CV_8UC1, CV_8UC3};

    // Gray levels used to encode the scene in synthetic frames.
    const EMPTY: u8 = 0;
    const ONE_FACE: u8 = 10;
    const TWO_FACES: u8 = 20;
    const FACE_EYES_HIDDEN: u8 = 30;
    const FACE_SHIFTED_25: u8 = 40;
    const FACE_SHIFTED_PAST_25: u8 = 50;
    const TIED_FACES: u8 = 60;

    fn faces_for(level: u8, _w: i32, _h: i32) -> Vec<Rect> {
        match level {
            ONE_FACE | FACE_EYES_HIDDEN => vec![Rect::new(100, 60, 80, 80)],
            TWO_FACES => vec![Rect::new(20, 20, 70, 70), Rect::new(200, 60, 90, 90)],
            FACE_SHIFTED_25 => vec![Rect::new(125, 60, 80, 80)],
            FACE_SHIFTED_PAST_25 => vec![Rect::new(125, 61, 80, 80)],
            TIED_FACES => vec![Rect::new(200, 20, 80, 80), Rect::new(10, 10, 80, 80)],
            _ => vec![],
        }
    }

    fn eyes_for(level: u8, _w: i32, _h: i32) -> Vec<Rect> {
        match level {
            FACE_EYES_HIDDEN => vec![Rect::new(10, 10, 14, 14)],
            _ => vec![Rect::new(10, 15, 16, 16), Rect::new(45, 15, 16, 16)],
        }
    }

    fn analyzer() -> FrameAnalyzer<LevelDetector, LevelDetector> {
        FrameAnalyzer::new(
            LevelDetector::new(faces_for),
            LevelDetector::new(eyes_for),
            AnalysisConfig::default(),
        )
    }

    fn frame(level: u8) -> Mat {
        Mat::new_rows_cols_with_default(240, 320, CV_8UC3, Scalar::all(level as f64)).unwrap()
    }

    #[test]
    fn no_face_frame_is_looking_away() {
        let mut analyzer = analyzer();
        let mut history = FaceHistory::new();

        let analysis = analyzer.analyze(&frame(EMPTY), 0.0, &mut history).unwrap();

        assert!(analysis.looking_away);
        assert!(!analysis.multi_face);
        assert_eq!(analysis.faces_detected, 0);
        assert_eq!(analysis.eyes_detected, 0);
        assert_eq!(analysis.face_movement, 0.0);
        assert_eq!(history.len(), 1);
        assert_eq!(history.previous(), None);
        assert_eq!(analyzer.eye_detector.calls, 0);
    }

    #[test]
    fn attentive_face_is_not_suspicious() {
        let mut analyzer = analyzer();
        let mut history = FaceHistory::new();

        let analysis = analyzer.analyze(&frame(ONE_FACE), 0.5, &mut history).unwrap();

        assert!(!analysis.is_suspicious());
        assert_eq!(analysis.faces_detected, 1);
        assert_eq!(analysis.eyes_detected, 2);
        assert_eq!(analysis.timestamp, 0.5);
        assert_eq!(history.previous(), Some(FaceCenter { x: 140, y: 100 }));
    }

    #[test]
    fn two_faces_flag_multi_face() {
        let mut analyzer = analyzer();
        let mut history = FaceHistory::new();

        let analysis = analyzer.analyze(&frame(TWO_FACES), 0.0, &mut history).unwrap();

        assert!(analysis.multi_face);
        assert_eq!(analysis.faces_detected, 2);
        // Primary face is the larger, right-hand one.
        assert_eq!(history.previous(), Some(FaceCenter { x: 245, y: 105 }));
        assert!(!analysis.looking_away);
    }

    #[test]
    fn tied_faces_use_first_detection() {
        let mut analyzer = analyzer();
        let mut history = FaceHistory::new();

        analyzer.analyze(&frame(TIED_FACES), 0.0, &mut history).unwrap();

        assert_eq!(history.previous(), Some(FaceCenter { x: 240, y: 60 }));
    }

    #[test]
    fn hidden_eyes_flag_looking_away() {
        let mut analyzer = analyzer();
        let mut history = FaceHistory::new();

        let analysis = analyzer
            .analyze(&frame(FACE_EYES_HIDDEN), 0.0, &mut history)
            .unwrap();

        assert!(analysis.looking_away);
        assert!(!analysis.multi_face);
        assert_eq!(analysis.eyes_detected, 1);
        assert_eq!(analysis.faces_detected, 1);
    }

    #[test]
    fn movement_of_exactly_threshold_is_tolerated() {
        let mut analyzer = analyzer();
        let mut history = FaceHistory::new();

        analyzer.analyze(&frame(ONE_FACE), 0.0, &mut history).unwrap();
        let analysis = analyzer
            .analyze(&frame(FACE_SHIFTED_25), 0.5, &mut history)
            .unwrap();

        assert_eq!(analysis.face_movement, 25.0);
        assert!(!analysis.looking_away);
    }

    #[test]
    fn movement_past_threshold_flags_looking_away() {
        let mut analyzer = analyzer();
        let mut history = FaceHistory::new();

        analyzer.analyze(&frame(ONE_FACE), 0.0, &mut history).unwrap();
        let analysis = analyzer
            .analyze(&frame(FACE_SHIFTED_PAST_25), 0.5, &mut history)
            .unwrap();

        assert!(analysis.face_movement > 25.0);
        assert!(analysis.face_movement < 25.1);
        assert!(analysis.looking_away);
    }

    #[test]
    fn movement_is_not_measured_across_a_faceless_frame() {
        let mut analyzer = analyzer();
        let mut history = FaceHistory::new();

        analyzer.analyze(&frame(ONE_FACE), 0.0, &mut history).unwrap();
        analyzer.analyze(&frame(EMPTY), 0.5, &mut history).unwrap();
        let analysis = analyzer
            .analyze(&frame(FACE_SHIFTED_PAST_25), 1.0, &mut history)
            .unwrap();

        assert_eq!(analysis.face_movement, 0.0);
        assert!(!analysis.looking_away);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn threshold_comes_from_config() {
        let config = AnalysisConfig {
            face_movement_threshold_px: 10.0,
            ..AnalysisConfig::default()
        };
        let mut analyzer = FrameAnalyzer::new(
            LevelDetector::new(faces_for),
            LevelDetector::new(eyes_for),
            config,
        );
        let mut history = FaceHistory::new();

        analyzer.analyze(&frame(ONE_FACE), 0.0, &mut history).unwrap();
        let analysis = analyzer
            .analyze(&frame(FACE_SHIFTED_25), 0.5, &mut history)
            .unwrap();

        assert!(analysis.looking_away);
    }

    #[test]
    fn detectors_receive_configured_params() {
        let mut analyzer = analyzer();
        let mut history = FaceHistory::new();

        analyzer.analyze(&frame(ONE_FACE), 0.0, &mut history).unwrap();

        assert_eq!(analyzer.face_detector.last_params, Some(CascadeParams::face()));
        assert_eq!(analyzer.eye_detector.last_params, Some(CascadeParams::eye()));
    }

    #[test]
    fn grayscale_frames_are_accepted() {
        let mut analyzer = analyzer();
        let mut history = FaceHistory::new();
        let gray =
            Mat::new_rows_cols_with_default(240, 320, CV_8UC1, Scalar::all(ONE_FACE as f64))
                .unwrap();

        let analysis = analyzer.analyze(&gray, 0.0, &mut history).unwrap();

        assert_eq!(analysis.faces_detected, 1);
        assert_eq!(analysis.eyes_detected, 2);
    }
}
