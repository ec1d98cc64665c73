use anyhow::Result;
use interview_integrity::batch::{run_batch, BatchOptions};
use interview_integrity::cli::{Args, Command};
use interview_integrity::pipeline::summary::{export_scores_csv, ReportSummary};
use interview_integrity::run_artifacts::ProctoringLog;
use interview_integrity::{analyze_video, AnalysisConfig, EngineSettings};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse_args();

    let analysis = match &args.config {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::default(),
    };
    let settings = EngineSettings {
        analysis,
        cascade_dir: args.cascade_dir.clone(),
        backend: args.backend,
        show_progress: !args.no_progress,
    };

    match args.command {
        Command::Analyze { video, output_dir } => {
            let outcome =
                tokio::task::spawn_blocking(move || analyze_video(&video, &output_dir, &settings))
                    .await??;
            println!(
                "{} sampled frames, {} suspicious events -> {}",
                outcome.results.len(),
                outcome.suspicious_events.len(),
                outcome.log_path.display()
            );
        }
        Command::Batch {
            sessions_root,
            video_file,
            jobs,
            force,
        } => {
            let options = BatchOptions {
                sessions_root,
                video_file,
                jobs,
                force,
            };
            let report = run_batch(&options, &settings).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.failed.is_empty() {
                anyhow::bail!("{} session(s) failed analysis", report.failed.len());
            }
        }
        Command::Summarize {
            log,
            csv,
            merge_gap,
            json,
        } => {
            let proctoring_log = ProctoringLog::load(&log)?;
            let summary = ReportSummary::from_log(&proctoring_log, merge_gap);
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print!("{}", summary);
            }
            if let Some(csv_path) = csv {
                export_scores_csv(&proctoring_log, &csv_path)?;
                tracing::info!("Score timeline written to {}", csv_path.display());
            }
        }
    }

    Ok(())
}
