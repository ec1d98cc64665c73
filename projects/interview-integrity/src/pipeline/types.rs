use serde::{Deserialize, Serialize};

/// Pixel center of the primary face in one sampled frame.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceCenter {
    pub x: i32,
    pub y: i32,
}

/// Face centers observed so far in one analysis run, one entry per analyzed
/// frame (`None` where no face was found). Append-only and owned by the run.
#[derive(Debug, Default)]
pub struct FaceHistory {
    centers: Vec<Option<FaceCenter>>,
}

impl FaceHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The entry recorded for the immediately preceding frame, if that frame had a face.
    pub fn previous(&self) -> Option<FaceCenter> {
        self.centers.last().copied().flatten()
    }

    pub fn record(&mut self, center: Option<FaceCenter>) {
        self.centers.push(center);
    }

    pub fn len(&self) -> usize {
        self.centers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }
}

/// Per-sampled-frame feature record
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FrameAnalysis {
    pub faces_detected: usize,
    /// Distance in pixels between this and the previous face center
    pub face_movement: f64,
    /// Always 0.0: eye regions are counted but their displacement is not scored
    pub eye_movement: f64,
    pub looking_away: bool,
    pub multi_face: bool,
    pub eyes_detected: usize,
    /// Seconds from video start
    pub timestamp: f64,
}

impl FrameAnalysis {
    pub fn new(timestamp: f64) -> Self {
        Self {
            faces_detected: 0,
            face_movement: 0.0,
            eye_movement: 0.0,
            looking_away: false,
            multi_face: false,
            eyes_detected: 0,
            timestamp,
        }
    }

    pub fn score(&self) -> f64 {
        self.face_movement + self.eye_movement
    }

    pub fn is_suspicious(&self) -> bool {
        self.looking_away || self.multi_face
    }
}
