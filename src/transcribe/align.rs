use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AlignerConfig;
use crate::error::Result;
use super::common::{ItemKind, TranscriptItem};

pub const DEFAULT_MAX_GAP_SECS: f64 = 6.0;
pub const DEFAULT_MAX_LINE_LEN: usize = 90;
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.0;

/// A time-stamped line of reconstructed transcript text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedLine {
    /// Start time in seconds of the line's first word
    pub start_time: f64,
    pub text: String,
}

/// Greedy grouping of timed transcript tokens into subtitle-like lines.
///
/// A line is closed before a new word when the word starts more than
/// `max_gap` seconds after the line's first word, or when the line has
/// already accumulated more than `max_line_len` characters. Punctuation is
/// glued to the preceding word. Tokens whose confidence is not strictly above
/// `min_confidence` are skipped and never close a line.
#[derive(Debug, Clone)]
pub struct LineAligner {
    max_gap: f64,
    max_line_len: usize,
    min_confidence: f64,
}

impl Default for LineAligner {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_GAP_SECS, DEFAULT_MAX_LINE_LEN)
    }
}

impl LineAligner {
    pub fn new(max_gap: f64, max_line_len: usize) -> Self {
        Self {
            max_gap,
            max_line_len,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }

    pub fn from_config(config: &AlignerConfig) -> Self {
        Self::new(config.max_gap_secs, config.max_line_len)
            .with_min_confidence(config.min_confidence)
    }

    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn align(&self, items: &[TranscriptItem]) -> Result<Vec<AlignedLine>> {
        let mut lines = Vec::new();
        let mut words: Vec<String> = Vec::new();
        let mut line_start = 0.0;
        let mut line_len = 0usize;
        let mut skipped = 0usize;

        for (index, item) in items.iter().enumerate() {
            let confidence = item.confidence(index)?;
            if confidence <= self.min_confidence {
                skipped += 1;
                continue;
            }
            let content = &item.best_alternative(index)?.content;

            match item.kind {
                ItemKind::Pronunciation => {
                    let start = item.start_seconds(index)?;
                    if !words.is_empty()
                        && (start - line_start > self.max_gap || line_len > self.max_line_len)
                    {
                        lines.push(AlignedLine {
                            start_time: line_start,
                            text: std::mem::take(&mut words).join(" "),
                        });
                        line_len = 0;
                    }
                    if words.is_empty() {
                        line_start = start;
                    }
                    line_len += content.chars().count() + 1;
                    words.push(content.clone());
                }
                ItemKind::Punctuation => {
                    // Nothing to attach to at the start of a line.
                    if let Some(last) = words.last_mut() {
                        last.push_str(content);
                        line_len += content.chars().count() + 1;
                    }
                }
            }
        }

        if !words.is_empty() {
            lines.push(AlignedLine {
                start_time: line_start,
                text: words.join(" "),
            });
        }

        debug!(
            "Aligned {} transcript items into {} lines ({} below confidence)",
            items.len(),
            lines.len(),
            skipped
        );
        Ok(lines)
    }
}
