use crate::run_artifacts::{EventType, ProctoringLog, ScorePoint};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// A run of same-type suspicious events close enough in time to read as one.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Incident {
    #[serde(rename = "type")]
    pub kind: EventType,
    pub start: f64,
    pub end: f64,
    pub samples: usize,
}

/// Reviewer-facing digest of a finished proctoring log.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ReportSummary {
    pub sampled_frames: usize,
    /// Timestamp of the last sampled frame, in seconds
    pub covered_secs: f64,
    pub multi_face_events: usize,
    pub looking_away_events: usize,
    /// Share of sampled frames that produced an event
    pub suspicious_ratio: f64,
    pub mean_score: f64,
    pub peak_score: Option<ScorePoint>,
    pub incidents: Vec<Incident>,
}

impl ReportSummary {
    pub fn from_log(log: &ProctoringLog, merge_gap_secs: f64) -> Self {
        let sampled_frames = log.scores_over_time.len();
        let count = |kind: EventType| {
            log.suspicious_events
                .iter()
                .filter(|e| e.kind == kind)
                .count()
        };

        let mean_score = if sampled_frames > 0 {
            log.scores_over_time.iter().map(|p| p.score).sum::<f64>() / sampled_frames as f64
        } else {
            0.0
        };

        let mut peak_score: Option<ScorePoint> = None;
        for point in &log.scores_over_time {
            match peak_score {
                Some(peak) if point.score <= peak.score => {}
                _ => peak_score = Some(*point),
            }
        }

        Self {
            sampled_frames,
            covered_secs: log
                .scores_over_time
                .last()
                .map(|p| p.timestamp)
                .unwrap_or(0.0),
            multi_face_events: count(EventType::MultiFace),
            looking_away_events: count(EventType::LookingAway),
            suspicious_ratio: if sampled_frames > 0 {
                log.suspicious_events.len() as f64 / sampled_frames as f64
            } else {
                0.0
            },
            mean_score,
            peak_score,
            incidents: merge_incidents(log, merge_gap_secs),
        }
    }
}

/// Fold consecutive events of the same type into incidents while the gap
/// between neighbours stays within `merge_gap_secs`.
fn merge_incidents(log: &ProctoringLog, merge_gap_secs: f64) -> Vec<Incident> {
    let mut incidents: Vec<Incident> = Vec::new();
    for event in &log.suspicious_events {
        if let Some(current) = incidents.last_mut() {
            if current.kind == event.kind && event.timestamp - current.end <= merge_gap_secs {
                current.end = event.timestamp;
                current.samples += 1;
                continue;
            }
        }
        incidents.push(Incident {
            kind: event.kind,
            start: event.timestamp,
            end: event.timestamp,
            samples: 1,
        });
    }
    incidents
}

impl fmt::Display for ReportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} sampled frames covering {:.1}s",
            self.sampled_frames, self.covered_secs
        )?;
        writeln!(
            f,
            "suspicious: {:.1}% ({} multi_face, {} looking_away)",
            self.suspicious_ratio * 100.0,
            self.multi_face_events,
            self.looking_away_events
        )?;
        match self.peak_score {
            Some(peak) => writeln!(
                f,
                "movement score: mean {:.2}, peak {:.2} at {:.1}s",
                self.mean_score, peak.score, peak.timestamp
            )?,
            None => writeln!(f, "movement score: n/a")?,
        }
        for incident in &self.incidents {
            writeln!(
                f,
                "  {:>7.1}s - {:>7.1}s  {:<12} ({} samples)",
                incident.start,
                incident.end,
                incident.kind.as_str(),
                incident.samples
            )?;
        }
        Ok(())
    }
}

/// Write `scores_over_time` as `timestamp,score,event` rows.
pub fn export_scores_csv(log: &ProctoringLog, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV: {}", path.display()))?;
    writer.write_record(["timestamp", "score", "event"])?;

    let mut events = log.suspicious_events.iter().peekable();
    for point in &log.scores_over_time {
        let mut label = "";
        while let Some(event) = events.peek() {
            if event.timestamp < point.timestamp {
                events.next();
            } else {
                if event.timestamp == point.timestamp {
                    label = event.kind.as_str();
                }
                break;
            }
        }
        writer.write_record([
            format!("{:.3}", point.timestamp),
            format!("{:.3}", point.score),
            label.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run_artifacts::{EventDetails, SuspiciousEvent};

    fn event(timestamp: f64, kind: EventType) -> SuspiciousEvent {
        SuspiciousEvent {
            timestamp,
            kind,
            details: EventDetails {
                face_movement: 0.0,
                eye_movement: 0.0,
                faces_detected: if kind == EventType::MultiFace { 2 } else { 1 },
                eyes_detected: 0,
            },
        }
    }

    fn sample_log() -> ProctoringLog {
        ProctoringLog {
            scores_over_time: (0..10)
                .map(|i| ScorePoint {
                    timestamp: i as f64 * 0.5,
                    score: if i == 6 { 40.0 } else { 0.0 },
                })
                .collect(),
            suspicious_events: vec![
                event(1.0, EventType::MultiFace),
                event(1.5, EventType::MultiFace),
                event(2.0, EventType::LookingAway),
                event(3.0, EventType::LookingAway),
                event(4.5, EventType::LookingAway),
            ],
        }
    }

    #[test]
    fn summary_counts_and_scores() {
        let summary = ReportSummary::from_log(&sample_log(), 1.0);

        assert_eq!(summary.sampled_frames, 10);
        assert_eq!(summary.covered_secs, 4.5);
        assert_eq!(summary.multi_face_events, 2);
        assert_eq!(summary.looking_away_events, 3);
        assert_eq!(summary.suspicious_ratio, 0.5);
        assert_eq!(summary.mean_score, 4.0);
        assert_eq!(
            summary.peak_score,
            Some(ScorePoint {
                timestamp: 3.0,
                score: 40.0
            })
        );
    }

    #[test]
    fn incidents_merge_nearby_events_of_same_type() {
        let summary = ReportSummary::from_log(&sample_log(), 1.0);

        assert_eq!(
            summary.incidents,
            vec![
                Incident {
                    kind: EventType::MultiFace,
                    start: 1.0,
                    end: 1.5,
                    samples: 2
                },
                Incident {
                    kind: EventType::LookingAway,
                    start: 2.0,
                    end: 3.0,
                    samples: 2
                },
                Incident {
                    kind: EventType::LookingAway,
                    start: 4.5,
                    end: 4.5,
                    samples: 1
                },
            ]
        );
    }

    #[test]
    fn empty_log_summary() {
        let summary = ReportSummary::from_log(&ProctoringLog::default(), 1.0);
        assert_eq!(summary.sampled_frames, 0);
        assert_eq!(summary.suspicious_ratio, 0.0);
        assert_eq!(summary.peak_score, None);
        assert!(summary.incidents.is_empty());
        assert!(summary.to_string().contains("n/a"));
    }

    #[test]
    fn csv_export_labels_event_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.csv");

        export_scores_csv(&sample_log(), &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "timestamp,score,event");
        assert_eq!(lines.len(), 11);
        assert_eq!(lines[1], "0.000,0.000,");
        assert_eq!(lines[3], "1.000,0.000,multi_face");
        assert_eq!(lines[7], "3.000,40.000,looking_away");
    }
}
