use crate::config::DEFAULT_CASCADE_DIR;
use crate::run_context::SESSION_VIDEO_FILE;
use crate::video::VideoBackend;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Interview recording integrity analysis", long_about = None)]
pub struct Args {
    /// Directory holding the Haar cascade XML files
    #[arg(long, global = true, env = "INTERVIEW_INTEGRITY_CASCADE_DIR", default_value = DEFAULT_CASCADE_DIR)]
    pub cascade_dir: PathBuf,

    /// Video decoding backend
    #[arg(long, global = true, value_enum, env = "INTERVIEW_INTEGRITY_BACKEND", default_value_t = VideoBackend::Opencv)]
    pub backend: VideoBackend,

    /// JSON file overriding analysis thresholds
    #[arg(long, global = true, env = "INTERVIEW_INTEGRITY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Disable the progress bar
    #[arg(long, global = true)]
    pub no_progress: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Analyze one recording and write proctoring_log.json
    Analyze {
        /// Recorded interview video
        #[arg(long)]
        video: PathBuf,

        /// Directory receiving proctoring_log.json
        #[arg(long)]
        output_dir: PathBuf,
    },

    /// Analyze every pending session under a sessions root
    Batch {
        /// Root directory containing one sub-directory per session
        #[arg(long, env = "INTERVIEW_INTEGRITY_SESSIONS_ROOT")]
        sessions_root: PathBuf,

        /// File name of the recording inside each session directory
        #[arg(long, default_value = SESSION_VIDEO_FILE)]
        video_file: String,

        /// Number of sessions analyzed concurrently
        #[arg(long, default_value_t = 2)]
        jobs: usize,

        /// Re-analyze sessions that already have a log
        #[arg(long)]
        force: bool,
    },

    /// Print a digest of a finished proctoring log
    Summarize {
        /// Path to proctoring_log.json
        #[arg(long)]
        log: PathBuf,

        /// Also export the score timeline as CSV
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Merge same-type events at most this many seconds apart
        #[arg(long, default_value_t = 1.0)]
        merge_gap: f64,

        /// Print the digest as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
