use async_trait::async_trait;
use std::path::Path;
use tokio::fs;
use tracing::info;

use crate::config::MediaConfig;
use crate::error::{Result, DubError};
use super::{MediaProcessorTrait, MediaCommandBuilder};

/// Concrete implementation of media processor (FFmpeg-based)
pub struct MediaProcessorImpl {
    config: MediaConfig,
    command_builder: MediaCommandBuilder,
}

impl MediaProcessorImpl {
    /// Create a new media processor implementation
    pub fn new(config: MediaConfig) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.binary_path);

        Self {
            config,
            command_builder,
        }
    }
}

fn require_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(DubError::FileNotFound(path.display().to_string()))
    }
}

async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

#[async_trait]
impl MediaProcessorTrait for MediaProcessorImpl {
    async fn split(
        &self,
        input_path: &Path,
        video_path: &Path,
        audio_path: &Path,
    ) -> Result<()> {
        require_file(input_path)?;
        ensure_parent(video_path).await?;
        ensure_parent(audio_path).await?;

        info!("Splitting {} into {} and {}",
              input_path.display(), video_path.display(), audio_path.display());

        let command = self.command_builder.split_streams(input_path, video_path, audio_path);
        command.execute().await?;

        info!("Split completed");
        Ok(())
    }

    async fn combine(
        &self,
        video_path: &Path,
        audio_path: &Path,
        output_path: &Path,
    ) -> Result<()> {
        require_file(video_path)?;
        require_file(audio_path)?;
        ensure_parent(output_path).await?;

        info!("Combining video {} with audio {} -> {}",
              video_path.display(), audio_path.display(), output_path.display());

        let command = self.command_builder.combine_streams(
            video_path,
            audio_path,
            output_path,
            &self.config.combine_options,
        );
        command.execute().await?;

        info!("Combine completed");
        Ok(())
    }

    async fn check_availability(&self) -> Result<()> {
        self.command_builder
            .version_check()
            .execute()
            .await
            .map_err(|e| DubError::Media(format!("Media processor not found at {}: {}", self.config.binary_path, e)))?;

        info!("Media processor is available");
        Ok(())
    }

    async fn version_info(&self) -> Result<String> {
        let stdout = self.command_builder.version_check().execute().await?;
        // The first line typically carries the version
        Ok(stdout.lines().next().unwrap_or("Unknown version").to_string())
    }
}
