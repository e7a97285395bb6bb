use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Dub a video: transcribe, translate, synthesize and remux
    Run {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory for the dubbed video and final artifacts
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Working directory for intermediate files
        #[arg(short, long)]
        work_dir: Option<PathBuf>,
    },

    /// Split a video into a silent video file and an audio file
    Split {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Output video-only file
        #[arg(long)]
        video_out: PathBuf,

        /// Output audio file
        #[arg(long)]
        audio_out: PathBuf,
    },

    /// Combine a video-only file with an audio track
    Combine {
        /// Video-only input
        #[arg(long)]
        video: PathBuf,

        /// Audio input
        #[arg(long)]
        audio: PathBuf,

        /// Output video file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Group a saved transcription result into timecoded lines
    Align {
        /// Transcription result JSON
        #[arg(short, long)]
        input: PathBuf,

        /// Output text file
        #[arg(short, long)]
        output: PathBuf,

        /// Seconds of silence that start a new line
        #[arg(long)]
        max_gap: Option<f64>,

        /// Characters after which a line is closed
        #[arg(long)]
        max_line_len: Option<usize>,
    },

    /// Remove leading timecodes from a text file
    Strip {
        /// Timecoded text file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Show the resolved remote function names and bucket
    Functions,

    /// Write the default configuration file
    InitConfig {
        /// Destination path
        #[arg(short, long, default_value = "dubline.toml")]
        output: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let args = Args::try_parse_from(["dubline", "-v", "run", "-i", "talk.mp4", "-o", "out"]).unwrap();
        assert!(args.verbose);
        match args.command {
            Commands::Run { input, output_dir, work_dir } => {
                assert_eq!(input, PathBuf::from("talk.mp4"));
                assert_eq!(output_dir, Some(PathBuf::from("out")));
                assert!(work_dir.is_none());
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_parse_align_overrides() {
        let args = Args::try_parse_from([
            "dubline", "align", "-i", "t.json", "-o", "t.txt", "--max-gap", "4.5", "--max-line-len", "60",
        ])
        .unwrap();
        match args.command {
            Commands::Align { max_gap, max_line_len, .. } => {
                assert_eq!(max_gap, Some(4.5));
                assert_eq!(max_line_len, Some(60));
            }
            _ => panic!("expected align"),
        }
    }

    #[test]
    fn test_split_requires_outputs() {
        assert!(Args::try_parse_from(["dubline", "split", "-i", "in.mp4"]).is_err());
    }
}
