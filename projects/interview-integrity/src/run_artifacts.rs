// Run artifact struct definitions
//
// This module contains the struct definitions for artifacts that are persisted
// as JSON files within a session's output directory.

use crate::pipeline::types::FrameAnalysis;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const PROCTORING_LOG_FILE: &str = "proctoring_log.json";

/// Which integrity rule a suspicious frame broke.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    MultiFace,
    LookingAway,
}

impl EventType {
    /// Label for a frame's flags. A second person in view outranks inattention,
    /// so `MultiFace` wins when both flags are set.
    pub fn resolve(looking_away: bool, multi_face: bool) -> Option<Self> {
        if multi_face {
            Some(EventType::MultiFace)
        } else if looking_away {
            Some(EventType::LookingAway)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::MultiFace => "multi_face",
            EventType::LookingAway => "looking_away",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EventDetails {
    pub face_movement: f64,
    pub eye_movement: f64,
    pub faces_detected: usize,
    pub eyes_detected: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SuspiciousEvent {
    pub timestamp: f64,
    #[serde(rename = "type")]
    pub kind: EventType,
    pub details: EventDetails,
}

impl SuspiciousEvent {
    /// Derive the event for a frame record, or `None` if the frame is clean.
    pub fn from_analysis(analysis: &FrameAnalysis) -> Option<Self> {
        let kind = EventType::resolve(analysis.looking_away, analysis.multi_face)?;
        Some(Self {
            timestamp: analysis.timestamp,
            kind,
            details: EventDetails {
                face_movement: analysis.face_movement,
                eye_movement: analysis.eye_movement,
                faces_detected: analysis.faces_detected,
                eyes_detected: analysis.eyes_detected,
            },
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ScorePoint {
    pub timestamp: f64,
    pub score: f64,
}

/// Contents of proctoring_log.json
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ProctoringLog {
    pub scores_over_time: Vec<ScorePoint>,
    pub suspicious_events: Vec<SuspiciousEvent>,
}

impl ProctoringLog {
    /// Serialize as UTF-8 JSON with 4-space indentation.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)
            .context("Failed to serialize proctoring log")?;
        Ok(buf)
    }

    /// Write `proctoring_log.json` into `output_dir`, replacing any previous log.
    pub fn write_to_dir(&self, output_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(output_dir).with_context(|| {
            format!("Failed to create output directory: {}", output_dir.display())
        })?;

        let path = output_dir.join(PROCTORING_LOG_FILE);
        let content = self.to_json_bytes()?;
        fs::write(&path, content)
            .with_context(|| format!("Failed to write proctoring log: {}", path.display()))?;
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read proctoring log: {}", path.display()))?;
        let log = serde_json::from_str(&content)
            .with_context(|| format!("Invalid proctoring log: {}", path.display()))?;
        Ok(log)
    }
}
