// Session directory conventions
//
// Each recorded interview lives in its own directory holding the uploaded
// video. Analysis writes proctoring_log.json next to it, or analysis_error.log
// when the run fails.

use crate::run_artifacts::PROCTORING_LOG_FILE;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const SESSION_VIDEO_FILE: &str = "interview.mp4";
pub const ERROR_LOG_FILE: &str = "analysis_error.log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDir {
    /// Path of the session directory relative to the sessions root
    pub session_id: String,
    pub dir: PathBuf,
    pub video_path: PathBuf,
}

impl SessionDir {
    pub fn log_path(&self) -> PathBuf {
        self.dir.join(PROCTORING_LOG_FILE)
    }

    pub fn error_log_path(&self) -> PathBuf {
        self.dir.join(ERROR_LOG_FILE)
    }

    pub fn has_log(&self) -> bool {
        self.log_path().exists()
    }

    /// Record a failed run so the report view can tell "failed" from "pending".
    pub fn write_error_log(&self, error: &anyhow::Error) -> Result<()> {
        let path = self.error_log_path();
        let content = format!("Error during video analysis: {:#}", error);
        fs::write(&path, content)
            .with_context(|| format!("Failed to write error log: {}", path.display()))?;
        Ok(())
    }

    pub fn clear_error_log(&self) -> Result<()> {
        let path = self.error_log_path();
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove stale error log: {}", path.display()))?;
        }
        Ok(())
    }
}

/// Find every directory under `sessions_root` that holds a `video_file`.
/// Sessions are returned sorted by id.
pub fn discover_sessions(sessions_root: &Path, video_file: &str) -> Vec<SessionDir> {
    let mut sessions: Vec<SessionDir> = WalkDir::new(sessions_root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name().to_str() == Some(video_file))
        .filter_map(|e| {
            let video_path = e.path().to_path_buf();
            let dir = video_path.parent()?.to_path_buf();
            let session_id = dir
                .strip_prefix(sessions_root)
                .ok()
                .map(|rel| rel.to_string_lossy().replace('\\', "/"))
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| ".".to_string());
            Some(SessionDir {
                session_id,
                dir,
                video_path,
            })
        })
        .collect();

    sessions.sort_by(|a, b| a.session_id.cmp(&b.session_id));
    sessions
}
