// Background batch runner
//
// Picks up session directories that have a recording but no proctoring log
// and analyzes them on tokio's blocking pool. Each session directory gets at
// most one run at a time. Failures are written to the session's
// analysis_error.log instead of aborting the batch.

use crate::config::EngineSettings;
use crate::pipeline::aggregator::analyze_video;
use crate::run_context::{discover_sessions, SessionDir};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub sessions_root: PathBuf,
    pub video_file: String,
    /// Maximum number of concurrent analyses
    pub jobs: usize,
    /// Re-analyze sessions that already have a log
    pub force: bool,
}

#[derive(Serialize, Debug)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub analyzed: Vec<String>,
    pub failed: Vec<String>,
    pub skipped: Vec<String>,
    /// Failed sessions whose error log could not be written
    pub unrecorded: Vec<String>,
}

pub async fn run_batch(options: &BatchOptions, settings: &EngineSettings) -> Result<BatchReport> {
    let mut report = BatchReport {
        started_at: Utc::now(),
        analyzed: Vec::new(),
        failed: Vec::new(),
        skipped: Vec::new(),
        unrecorded: Vec::new(),
    };

    let sessions = discover_sessions(&options.sessions_root, &options.video_file);
    tracing::info!(
        "Batch: found {} sessions under {}",
        sessions.len(),
        options.sessions_root.display()
    );

    // Concurrent runs would fight over one terminal.
    let settings = Arc::new(EngineSettings {
        show_progress: false,
        ..settings.clone()
    });
    let semaphore = Arc::new(Semaphore::new(options.jobs.max(1)));
    let mut tasks: JoinSet<(SessionDir, Result<f64>)> = JoinSet::new();

    for session in sessions {
        if session.has_log() && !options.force {
            tracing::debug!("Batch: skipping {} (log exists)", session.session_id);
            report.skipped.push(session.session_id);
            continue;
        }

        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .context("Batch semaphore closed")?;
        let settings = settings.clone();

        tasks.spawn(async move {
            let _permit = permit;
            let job = session.clone();
            let result = tokio::task::spawn_blocking(move || {
                let start = Instant::now();
                analyze_video(&job.video_path, &job.dir, &settings)
                    .map(|_| start.elapsed().as_secs_f64())
            })
            .await
            .map_err(anyhow::Error::new)
            .and_then(|r| r);
            (session, result)
        });
    }

    // Drain every task; per-session log failures are reported, not propagated.
    while let Some(joined) = tasks.join_next().await {
        let (session, result) = match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Batch: analysis task panicked: {}", e);
                continue;
            }
        };
        match result {
            Ok(secs) => {
                tracing::info!("Batch: analyzed {} in {:.1}s", session.session_id, secs);
                if let Err(e) = session.clear_error_log() {
                    tracing::warn!("Batch: {:#}", e);
                }
                report.analyzed.push(session.session_id);
            }
            Err(e) => {
                tracing::error!("Batch: analysis of {} failed: {:#}", session.session_id, e);
                if let Err(write_err) = session.write_error_log(&e) {
                    tracing::error!("Batch: {:#}", write_err);
                    report.unrecorded.push(session.session_id.clone());
                }
                report.failed.push(session.session_id);
            }
        }
    }

    report.analyzed.sort();
    report.failed.sort();
    report.unrecorded.sort();

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run_context::{ERROR_LOG_FILE, SESSION_VIDEO_FILE};
    use std::fs;

    fn options(root: PathBuf, force: bool) -> BatchOptions {
        BatchOptions {
            sessions_root: root,
            video_file: SESSION_VIDEO_FILE.to_string(),
            jobs: 2,
            force,
        }
    }

    #[tokio::test]
    async fn broken_recordings_get_error_logs() {
        let root = tempfile::tempdir().unwrap();
        for id in ["alice/s1", "bob/s2"] {
            let dir = root.path().join(id);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(SESSION_VIDEO_FILE), b"not a video").unwrap();
        }

        let report = run_batch(
            &options(root.path().to_path_buf(), false),
            &EngineSettings::default(),
        )
        .await
        .unwrap();

        assert!(report.analyzed.is_empty());
        assert_eq!(report.failed, vec!["alice/s1", "bob/s2"]);
        for id in ["alice/s1", "bob/s2"] {
            let dir = root.path().join(id);
            let text = fs::read_to_string(dir.join(ERROR_LOG_FILE)).unwrap();
            assert!(text.contains("Error during video analysis"));
            assert!(!dir.join("proctoring_log.json").exists());
        }
    }

    #[tokio::test]
    async fn finished_sessions_are_skipped_unless_forced() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("alice/s1");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(SESSION_VIDEO_FILE), b"not a video").unwrap();
        fs::write(dir.join("proctoring_log.json"), b"{}").unwrap();

        let report = run_batch(
            &options(root.path().to_path_buf(), false),
            &EngineSettings::default(),
        )
        .await
        .unwrap();
        assert_eq!(report.skipped, vec!["alice/s1"]);
        assert!(report.failed.is_empty());

        let report = run_batch(
            &options(root.path().to_path_buf(), true),
            &EngineSettings::default(),
        )
        .await
        .unwrap();
        assert!(report.skipped.is_empty());
        assert_eq!(report.failed, vec!["alice/s1"]);
    }

    #[tokio::test]
    async fn unwritable_error_log_does_not_hide_other_sessions() {
        let root = tempfile::tempdir().unwrap();
        for id in ["a", "b", "c"] {
            let dir = root.path().join(id);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(SESSION_VIDEO_FILE), b"not a video").unwrap();
        }
        // A directory squatting on the log path makes the write fail, even for root.
        fs::create_dir_all(root.path().join("a").join(ERROR_LOG_FILE)).unwrap();

        let options = BatchOptions {
            jobs: 1,
            ..options(root.path().to_path_buf(), false)
        };
        let report = run_batch(&options, &EngineSettings::default()).await.unwrap();

        assert_eq!(report.failed, vec!["a", "b", "c"]);
        assert_eq!(report.unrecorded, vec!["a"]);
        for id in ["b", "c"] {
            let text = fs::read_to_string(root.path().join(id).join(ERROR_LOG_FILE)).unwrap();
            assert!(text.starts_with("Error during video analysis"));
        }
    }
}
