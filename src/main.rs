//! Dubline - Automated Video Dubbing Pipeline
//!
//! Entry point for the `dubline` binary, which turns a Telugu video into an
//! English-dubbed one using cloud transcription, translation and speech
//! synthesis functions plus ffmpeg.

use std::path::Path;
use anyhow::Result;
use clap::Parser;
use tracing::{error, info, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dubline::cli::{Args, Commands};
use dubline::config::Config;
use dubline::error::DubError;
use dubline::media::MediaProcessorFactory;
use dubline::setup::SetupManager;
use dubline::subtitle::{strip_timecodes_file, write_transcript};
use dubline::transcribe::{LineAligner, TranscriptDocument};
use dubline::workflow::Workflow;

const DEFAULT_CONFIG_FILE: &str = "dubline.toml";

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Setup logging to both console and file
    let guard = match setup_logging(args.verbose) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(6);
        }
    };

    let code = match run(args).await {
        Ok(()) => 0,
        Err(e) => {
            error!("{:#}", e);
            exit_code(&e)
        }
    };

    // Flush the file appender before exiting
    drop(guard);
    if code != 0 {
        std::process::exit(code);
    }
}

async fn run(args: Args) -> Result<()> {
    info!("Starting Dubline - Automated Video Dubbing Pipeline");

    let mut config = load_config(args.config.as_deref())?;

    match args.command {
        Commands::Run { input, output_dir, work_dir } => {
            info!("Dubbing video file: {}", input.display());

            let setup_manager = SetupManager::new()?;
            let collaborators = setup_manager.connect(&config).await?;
            let workflow = Workflow::new(config, collaborators);

            let report = workflow
                .process_single_file(&input, work_dir.as_deref(), output_dir.as_deref())
                .await?;

            println!("Dubbed video: {}", report.output_video.display());
            println!("Transcript ({} lines): {}", report.line_count, report.source_text.display());
            println!("Translation: {}", report.target_text.display());
            println!("Synthesized audio: {}", report.target_audio.display());
        }
        Commands::Split { input, video_out, audio_out } => {
            info!("Splitting video file: {}", input.display());
            let processor = MediaProcessorFactory::create_processor(config.media.clone());
            processor.split(&input, &video_out, &audio_out).await?;
        }
        Commands::Combine { video, audio, output } => {
            info!("Combining {} with {}", video.display(), audio.display());
            let processor = MediaProcessorFactory::create_processor(config.media.clone());
            processor.combine(&video, &audio, &output).await?;
        }
        Commands::Align { input, output, max_gap, max_line_len } => {
            info!("Aligning transcript: {}", input.display());

            if let Some(max_gap) = max_gap {
                config.aligner.max_gap_secs = max_gap;
            }
            if let Some(max_line_len) = max_line_len {
                config.aligner.max_line_len = max_line_len;
            }
            config.validate()?;

            let document = TranscriptDocument::from_file(&input).await?;
            let lines = LineAligner::from_config(&config.aligner).align(document.items())?;
            write_transcript(&lines, &output).await?;
            println!("Wrote {} lines to {}", lines.len(), output.display());
        }
        Commands::Strip { input } => {
            let output = strip_timecodes_file(&input).await?;
            println!("{}", output.display());
        }
        Commands::Functions => {
            let setup_manager = SetupManager::new()?;
            let collaborators = setup_manager.connect(&config).await?;
            let workflow = Workflow::new(config, collaborators);

            println!("{:<25} {:<50}", "Function", "Resolved name");
            println!("{}", "-".repeat(75));
            for (id, name) in workflow.resolve_functions().await? {
                println!("{:<25} {:<50}", id, name);
            }
            println!("\nBucket: {}", workflow.resolve_bucket().await?);
        }
        Commands::InitConfig { output } => {
            if output.exists() {
                return Err(DubError::Config(format!(
                    "{} already exists; remove it first",
                    output.display()
                ))
                .into());
            }
            Config::default().save_to_file(&output)?;
            println!("Wrote default configuration to {}", output.display());
        }
    }

    info!("Dubline completed successfully");
    Ok(())
}

/// Load configuration from the given path, `./dubline.toml`, or defaults
fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new(DEFAULT_CONFIG_FILE).exists() {
                info!("Found {} in current directory, loading...", DEFAULT_CONFIG_FILE);
                Config::from_file(DEFAULT_CONFIG_FILE)?
            } else {
                Config::default()
            }
        }
    };
    Ok(config)
}

/// Process exit code for an error that ended the run
fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<DubError>()
        .map(DubError::exit_code)
        .unwrap_or(6)
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<WorkerGuard> {
    let log_dir = std::env::current_dir()?.join(".dubline").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "dubline.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_file(true)
        .with_line_number(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}",
          log_level, log_dir.join("dubline.log").display());

    Ok(guard)
}
