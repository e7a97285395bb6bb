use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::error::{Result, DubError};

fn default_region() -> String {
    "us-west-1".to_string()
}

fn default_bucket_pattern() -> String {
    "^telugutoenglishtranscrip-transcribebucket".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub aws: AwsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub functions: FunctionsConfig,
    #[serde(default)]
    pub languages: LanguageConfig,
    #[serde(default)]
    pub aligner: AlignerConfig,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    /// Region every service client is built for
    #[serde(default = "default_region")]
    pub region: String,
    /// Named profile from the shared AWS config files
    pub profile: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Bucket name; takes precedence over parameter and pattern lookup
    pub bucket: Option<String>,
    /// Parameter store entry holding the bucket name
    pub bucket_parameter: Option<String>,
    /// Regular expression matched against the account's bucket names
    #[serde(default = "default_bucket_pattern")]
    pub bucket_pattern: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionsConfig {
    /// Application name used in `/<app>/<FunctionId>FunctionName`
    pub app_name: String,
    pub transcribe_id: String,
    pub translate_id: String,
    pub synthesize_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageConfig {
    /// Source language code (speech in the input video)
    pub source: String,
    /// Target language code (dubbed speech)
    pub target: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignerConfig {
    /// Maximum gap in seconds between a line's first word and a new word
    pub max_gap_secs: f64,
    /// Maximum accumulated characters before a line is closed
    pub max_line_len: usize,
    /// Alternatives must score strictly above this to be kept
    pub min_confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Seconds between job status checks
    pub interval_secs: u64,
    /// Status checks before giving up; 0 waits forever
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
    /// Additional encoding options appended to the combine step
    /// e.g. ["-b:a", "192k"] to raise the dubbed audio bitrate
    #[serde(default)]
    pub combine_options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Intermediate files (split streams, transcripts)
    pub work_dir: PathBuf,
    /// Synthesized audio and the dubbed video
    pub output_dir: PathBuf,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            profile: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            bucket_parameter: None,
            bucket_pattern: default_bucket_pattern(),
        }
    }
}

impl Default for FunctionsConfig {
    fn default() -> Self {
        Self {
            app_name: "myapplication".to_string(),
            transcribe_id: "TranscriptionLambda".to_string(),
            translate_id: "TranslateLambda".to_string(),
            synthesize_id: "SynthesizeLambda".to_string(),
        }
    }
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            source: "te-IN".to_string(),
            target: "en-US".to_string(),
        }
    }
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self {
            max_gap_secs: 6.0,
            max_line_len: 90,
            min_confidence: 0.0,
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            max_attempts: 360,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            binary_path: "ffmpeg".to_string(),
            combine_options: vec![],
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("mediadir"),
            output_dir: PathBuf::from("output"),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DubError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| DubError::Config(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| DubError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| DubError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !self.aligner.max_gap_secs.is_finite() || self.aligner.max_gap_secs < 0.0 {
            return Err(DubError::Config(format!(
                "aligner.max_gap_secs must be a non-negative number, got {}",
                self.aligner.max_gap_secs
            )));
        }
        if !(0.0..1.0).contains(&self.aligner.min_confidence) {
            return Err(DubError::Config(format!(
                "aligner.min_confidence must be in [0, 1), got {}",
                self.aligner.min_confidence
            )));
        }
        if self.poller.interval_secs == 0 {
            return Err(DubError::Config("poller.interval_secs must be at least 1".to_string()));
        }
        if self.functions.app_name.trim().is_empty() {
            return Err(DubError::Config("functions.app_name must not be empty".to_string()));
        }
        if self.languages.source == self.languages.target {
            return Err(DubError::Config(format!(
                "source and target language are both {}",
                self.languages.source
            )));
        }
        Ok(())
    }
}
