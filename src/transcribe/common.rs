use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, DubError};

/// Transcription result document as written by the transcription service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptDocument {
    #[serde(rename = "jobName", default)]
    pub job_name: Option<String>,
    pub results: TranscriptResults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptResults {
    #[serde(default)]
    pub items: Vec<TranscriptItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Pronunciation,
    Punctuation,
}

/// A number the service may encode either as a JSON number or as a decimal string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Decimal {
    Number(f64),
    Text(String),
}

impl Decimal {
    pub fn value(&self) -> Option<f64> {
        let parsed = match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse::<f64>().ok(),
        };
        parsed.filter(|v| v.is_finite())
    }
}

impl From<f64> for Decimal {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alternative {
    pub content: String,
    #[serde(default)]
    pub confidence: Option<Decimal>,
}

/// One timed word or punctuation mark
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptItem {
    #[serde(rename = "type")]
    pub kind: ItemKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<Decimal>,
    #[serde(default)]
    pub alternatives: Vec<Alternative>,
}

impl TranscriptItem {
    pub fn pronunciation(content: &str, start_time: f64, confidence: f64) -> Self {
        Self {
            kind: ItemKind::Pronunciation,
            start_time: Some(start_time.into()),
            end_time: None,
            alternatives: vec![Alternative {
                content: content.to_string(),
                confidence: Some(confidence.into()),
            }],
        }
    }

    pub fn punctuation(content: &str, confidence: f64) -> Self {
        Self {
            kind: ItemKind::Punctuation,
            start_time: None,
            end_time: None,
            alternatives: vec![Alternative {
                content: content.to_string(),
                confidence: Some(confidence.into()),
            }],
        }
    }

    /// The first alternative; later ones are never consulted.
    pub fn best_alternative(&self, index: usize) -> Result<&Alternative> {
        self.alternatives.first().ok_or_else(|| {
            DubError::Validation(format!("transcript item {} has no alternatives", index))
        })
    }

    pub fn confidence(&self, index: usize) -> Result<f64> {
        let alternative = self.best_alternative(index)?;
        alternative
            .confidence
            .as_ref()
            .and_then(Decimal::value)
            .ok_or_else(|| {
                DubError::Validation(format!(
                    "transcript item {} has a missing or malformed confidence",
                    index
                ))
            })
    }

    pub fn start_seconds(&self, index: usize) -> Result<f64> {
        self.start_time
            .as_ref()
            .and_then(Decimal::value)
            .ok_or_else(|| {
                DubError::Validation(format!(
                    "transcript item {} has a missing or malformed start_time",
                    index
                ))
            })
    }
}

impl TranscriptDocument {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| DubError::Validation(format!("Malformed transcription result: {}", e)))
    }

    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DubError::FileNotFound(path.display().to_string()));
        }
        let raw = tokio::fs::read_to_string(path).await?;
        Self::from_json(&raw)
    }

    pub fn items(&self) -> &[TranscriptItem] {
        &self.results.items
    }
}
