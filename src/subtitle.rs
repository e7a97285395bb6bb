use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use regex::Regex;
use tokio::fs;
use tracing::info;

use crate::error::{Result, DubError};
use crate::transcribe::AlignedLine;

static TIMECODE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{2,}:[0-9]{2}:[0-9]{2}:[ \t]?").expect("timecode pattern is valid")
});

/// Write aligned lines as a timecoded transcript file
pub async fn write_transcript<P: AsRef<Path>>(lines: &[AlignedLine], output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    info!("Writing transcript file: {}", output_path.display());

    fs::write(output_path, render_lines(lines)).await
        .map_err(DubError::Io)?;

    info!("Transcript written with {} lines", lines.len());
    Ok(())
}

/// Render aligned lines as `HH:MM:SS: <text>`, one per line
pub fn render_lines(lines: &[AlignedLine]) -> String {
    let mut content = String::new();

    for line in lines {
        content.push_str(&format!(
            "{}: {}\n",
            format_timecode(line.start_time),
            line.text
        ));
    }

    content
}

/// Format time in seconds as HH:MM:SS, dropping the fractional part
pub fn format_timecode(seconds: f64) -> String {
    let total_seconds = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

/// Remove a leading `HH:MM:SS: ` label; other lines come back unchanged
pub fn strip_timecode(line: &str) -> &str {
    match TIMECODE_LABEL.find(line) {
        Some(label) => &line[label.end()..],
        None => line,
    }
}

/// Strip timecodes from every line of `input_path` into `<stem>_no_tc.txt`
pub async fn strip_timecodes_file<P: AsRef<Path>>(input_path: P) -> Result<PathBuf> {
    let input_path = input_path.as_ref();
    if !input_path.exists() {
        return Err(DubError::FileNotFound(input_path.display().to_string()));
    }

    let stem = input_path.file_stem()
        .ok_or_else(|| DubError::Config(format!("Invalid transcript filename: {}", input_path.display())))?
        .to_string_lossy();
    let output_path = input_path.with_file_name(format!("{}_no_tc.txt", stem));

    let content = fs::read_to_string(input_path).await?;
    let mut stripped = String::with_capacity(content.len());
    for line in content.lines() {
        stripped.push_str(strip_timecode(line));
        stripped.push('\n');
    }

    fs::write(&output_path, stripped).await?;

    info!("Timecodes removed, result saved in {}", output_path.display());
    Ok(output_path)
}
