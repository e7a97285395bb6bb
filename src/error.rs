use thiserror::Error;

#[derive(Error, Debug)]
pub enum DubError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("AWS {service} error: {message}")]
    Aws { service: &'static str, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Malformed or missing fields in a payload or transcript token.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Remote function {function} returned status {status}: {payload}")]
    Invocation {
        function: String,
        status: i32,
        payload: String,
    },

    #[error("Transcription job {job} failed: {reason}")]
    JobFailed { job: String, reason: String },

    #[error("Gave up waiting on job {job} after {attempts} status checks")]
    PollTimeout { job: String, attempts: u32 },

    #[error("Media processing error: {0}")]
    Media(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Speech synthesis failed: {0}")]
    SynthesisFailed(String),
}

impl DubError {
    pub fn aws<E: std::fmt::Display>(service: &'static str, err: E) -> Self {
        Self::Aws {
            service,
            message: err.to_string(),
        }
    }

    /// Validation errors are reported back to the caller; every other kind aborts the run.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Config(_))
    }

    /// Process exit code for this error when it terminates the binary.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Invocation { .. } => 1,
            Self::SynthesisFailed(_) => 2,
            Self::JobFailed { .. } | Self::PollTimeout { .. } => 3,
            Self::Media(_) => 4,
            Self::Validation(_) | Self::Config(_) | Self::FileNotFound(_) | Self::Toml(_) => 5,
            Self::Io(_) | Self::Json(_) | Self::Http(_) | Self::Aws { .. } | Self::Storage(_) => 6,
        }
    }
}

pub type Result<T> = std::result::Result<T, DubError>;
