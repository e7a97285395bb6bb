use std::fmt;
use std::path::{Path, PathBuf};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{Result, DubError};
use crate::functions::{JobDescriptor, ServiceInvoker};
use crate::media::MediaProcessorTrait;
use crate::poller::{JobHandle, JobStatus};
use crate::storage::{parse_s3_location, BucketLocator, ObjectStore};
use crate::subtitle::{strip_timecodes_file, write_transcript};
use crate::transcribe::{LineAligner, TranscriptDocument};

/// Where a run is in the dubbing pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Split,
    TranscribePending,
    TranscribeDone,
    TranslatePending,
    TranslateDone,
    SynthesizePending,
    SynthesizeDone,
    Combine,
    Done,
    Failed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Split => "SPLIT",
            Self::TranscribePending => "TRANSCRIBE_PENDING",
            Self::TranscribeDone => "TRANSCRIBE_DONE",
            Self::TranslatePending => "TRANSLATE_PENDING",
            Self::TranslateDone => "TRANSLATE_DONE",
            Self::SynthesizePending => "SYNTHESIZE_PENDING",
            Self::SynthesizeDone => "SYNTHESIZE_DONE",
            Self::Combine => "COMBINE",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

fn advance(stage: &mut PipelineStage, next: PipelineStage) {
    info!("Pipeline stage {} -> {}", stage, next);
    *stage = next;
}

/// Local paths and bucket keys of one run
#[derive(Debug, Clone)]
pub struct RunLayout {
    pub input_video: PathBuf,
    pub video_only: PathBuf,
    pub source_audio: PathBuf,
    pub source_text: PathBuf,
    pub target_text: PathBuf,
    pub target_audio: PathBuf,
    pub output_video: PathBuf,
    /// Prepended to every bucket key, e.g. `runs/20240101T120000/`
    pub key_prefix: String,
}

impl RunLayout {
    pub fn new<P: AsRef<Path>>(
        input_video: P,
        work_dir: P,
        output_dir: P,
        target_language: &str,
        key_prefix: impl Into<String>,
    ) -> Result<Self> {
        let input_video = input_video.as_ref();
        let work_dir = work_dir.as_ref();
        let output_dir = output_dir.as_ref();

        let stem = input_video.file_stem()
            .ok_or_else(|| DubError::Config(format!("Invalid video filename: {}", input_video.display())))?
            .to_string_lossy();
        let language = target_language
            .split('-')
            .next()
            .unwrap_or(target_language)
            .to_lowercase();

        Ok(Self {
            input_video: input_video.to_path_buf(),
            // Combine encodes AAC audio, so both video files are MP4 whatever the input container
            video_only: work_dir.join("video_only.mp4"),
            source_audio: work_dir.join("source_audio.mp3"),
            source_text: work_dir.join("source_text.txt"),
            target_text: work_dir.join("target_text.txt"),
            target_audio: output_dir.join("target_audio.mp3"),
            output_video: output_dir.join(format!("{}_{}.mp4", stem, language)),
            key_prefix: key_prefix.into(),
        })
    }

    /// Key prefix unique to a run started now
    pub fn timestamped_prefix() -> String {
        format!("runs/{}/", chrono::Utc::now().format("%Y%m%dT%H%M%S"))
    }

    /// Bucket key for a local file of this run
    pub fn key_for(&self, path: &Path) -> String {
        let name = path.file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        format!("{}{}", self.key_prefix, name)
    }
}

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub bucket: String,
    pub job: JobHandle,
    pub line_count: usize,
    pub source_text: PathBuf,
    pub target_text: PathBuf,
    pub synth_text: PathBuf,
    pub target_audio: PathBuf,
    pub output_video: PathBuf,
}

/// External collaborators of the pipeline
pub struct Collaborators {
    pub services: ServiceInvoker,
    pub store: Box<dyn ObjectStore>,
    pub media: Box<dyn MediaProcessorTrait>,
    pub http: reqwest::Client,
}

pub struct Workflow {
    config: Config,
    services: ServiceInvoker,
    store: Box<dyn ObjectStore>,
    media: Box<dyn MediaProcessorTrait>,
    http: reqwest::Client,
    aligner: LineAligner,
}

impl Workflow {
    pub fn new(config: Config, collaborators: Collaborators) -> Self {
        let aligner = LineAligner::from_config(&config.aligner);

        Self {
            config,
            services: collaborators.services,
            store: collaborators.store,
            media: collaborators.media,
            http: collaborators.http,
            aligner,
        }
    }

    /// Resolve the pipeline bucket from configuration
    pub async fn resolve_bucket(&self) -> Result<String> {
        BucketLocator::from(&self.config.storage)
            .resolve(self.store.as_ref(), self.services.parameters())
            .await
    }

    /// Physical names of the three remote functions, keyed by logical id
    pub async fn resolve_functions(&self) -> Result<Vec<(String, String)>> {
        let functions = &self.config.functions;
        let mut resolved = Vec::new();
        for id in [&functions.transcribe_id, &functions.translate_id, &functions.synthesize_id] {
            let name = self.services.resolve_function(id).await?;
            resolved.push((id.clone(), name));
        }
        Ok(resolved)
    }

    /// Dub a single video file
    pub async fn process_single_file<P: AsRef<Path>>(
        &self,
        input_path: P,
        work_dir: Option<&Path>,
        output_dir: Option<&Path>,
    ) -> Result<RunReport> {
        let input_path = input_path.as_ref();
        info!("Processing single file: {}", input_path.display());

        if !input_path.is_file() {
            return Err(DubError::FileNotFound(input_path.display().to_string()));
        }

        let work_dir = work_dir.unwrap_or(self.config.paths.work_dir.as_path());
        let output_dir = output_dir.unwrap_or(self.config.paths.output_dir.as_path());
        tokio::fs::create_dir_all(work_dir).await?;
        tokio::fs::create_dir_all(output_dir).await?;

        let layout = RunLayout::new(
            input_path,
            work_dir,
            output_dir,
            &self.config.languages.target,
            RunLayout::timestamped_prefix(),
        )?;

        self.media.check_availability().await?;
        if let Ok(version) = self.media.version_info().await {
            debug!("Media processor: {}", version);
        }
        self.run(&layout).await
    }

    /// Run every stage for a prepared layout
    pub async fn run(&self, layout: &RunLayout) -> Result<RunReport> {
        let mut stage = PipelineStage::Split;
        match self.run_stages(layout, &mut stage).await {
            Ok(report) => Ok(report),
            Err(e) => {
                error!("Pipeline failed during {}: {}", stage, e);
                advance(&mut stage, PipelineStage::Failed);
                Err(e)
            }
        }
    }

    async fn run_stages(&self, layout: &RunLayout, stage: &mut PipelineStage) -> Result<RunReport> {
        let bucket = self.resolve_bucket().await?;
        let languages = &self.config.languages;
        let functions = &self.config.functions;

        // Step 1: Split the source into silent video and speech audio
        info!("Pipeline stage {}", stage);
        self.media.split(&layout.input_video, &layout.video_only, &layout.source_audio).await?;

        // Step 2: Start transcription and wait for the job
        advance(stage, PipelineStage::TranscribePending);
        let media_key = layout.key_for(&layout.source_audio);
        self.store.upload(&bucket, &media_key, &layout.source_audio).await?;
        info!("Audio upload of {} completed", layout.input_video.display());

        let source_key = layout.key_for(&layout.source_text);
        let descriptor = JobDescriptor::new(&bucket)
            .media(&media_key)
            .transcript_file(&source_key)
            .languages(&languages.source, &languages.target);
        let (job, report) = self.services
            .invoke(&functions.transcribe_id, &descriptor, true)
            .await?
            .into_job()?;

        if report.status == JobStatus::Failed {
            return Err(DubError::JobFailed {
                job: job.to_string(),
                reason: report.failure_reason.unwrap_or_else(|| "no reason reported".to_string()),
            });
        }

        // Step 3: Align the transcript into timecoded lines
        advance(stage, PipelineStage::TranscribeDone);
        let locator = report.locator.ok_or_else(|| {
            DubError::Validation(format!("Transcription job {} completed without a transcript location", job))
        })?;
        let document = self.fetch_transcript(&locator).await?;
        let lines = self.aligner.align(document.items())?;
        if lines.is_empty() {
            return Err(DubError::Validation(format!(
                "Transcript of job {} has no words above the confidence threshold",
                job
            )));
        }
        write_transcript(&lines, &layout.source_text).await?;
        self.store.upload(&bucket, &source_key, &layout.source_text).await?;

        // Step 4: Translate
        advance(stage, PipelineStage::TranslatePending);
        let target_key = layout.key_for(&layout.target_text);
        let descriptor = JobDescriptor::new(&bucket)
            .src_text(&source_key)
            .dst_text(&target_key)
            .languages(&languages.source, &languages.target);
        let value = self.services
            .invoke(&functions.translate_id, &descriptor, false)
            .await?
            .into_value()?;
        let translated_key = translated_text_key(&value)?;

        // Step 5: Fetch the translation and prepare synthesis input
        advance(stage, PipelineStage::TranslateDone);
        self.store.download(&bucket, &translated_key, &layout.target_text).await?;
        let synth_text = strip_timecodes_file(&layout.target_text).await?;
        let synth_key = layout.key_for(&synth_text);
        self.store.upload(&bucket, &synth_key, &synth_text).await?;

        // Step 6: Synthesize speech
        advance(stage, PipelineStage::SynthesizePending);
        let descriptor = JobDescriptor::new(&bucket).synth_file(&synth_key);
        let value = self.services
            .invoke(&functions.synthesize_id, &descriptor, false)
            .await?
            .into_value()?;
        let audio_key = synthesis_output_key(&value)?;

        advance(stage, PipelineStage::SynthesizeDone);
        self.store.download(&bucket, &audio_key, &layout.target_audio).await?;
        info!("Audio synthesis completed");

        // Step 7: Remux the original video with the synthesized audio
        advance(stage, PipelineStage::Combine);
        self.media.combine(&layout.video_only, &layout.target_audio, &layout.output_video).await?;

        advance(stage, PipelineStage::Done);
        info!("Dubbed video written to {}", layout.output_video.display());

        Ok(RunReport {
            bucket,
            job,
            line_count: lines.len(),
            source_text: layout.source_text.clone(),
            target_text: layout.target_text.clone(),
            synth_text,
            target_audio: layout.target_audio.clone(),
            output_video: layout.output_video.clone(),
        })
    }

    /// Load the transcription result from the job's result location
    async fn fetch_transcript(&self, locator: &str) -> Result<TranscriptDocument> {
        let raw = match parse_s3_location(locator) {
            Some((bucket, key)) => {
                debug!("Fetching transcript from s3://{}/{}", bucket, key);
                let bytes = self.store.get_bytes(&bucket, &key).await?;
                String::from_utf8(bytes)
                    .map_err(|e| DubError::Validation(format!("Transcript is not UTF-8: {}", e)))?
            }
            None => {
                debug!("Fetching transcript from {}", locator);
                let response = self.http.get(locator).send().await?;
                if !response.status().is_success() {
                    return Err(DubError::Storage(format!(
                        "Transcript download from {} failed with HTTP {}",
                        locator,
                        response.status()
                    )));
                }
                response.text().await?
            }
        };

        TranscriptDocument::from_json(&raw)
    }
}

/// Key of the translated text returned by the translate function
fn translated_text_key(value: &Value) -> Result<String> {
    match value {
        Value::String(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        Value::Null => Err(DubError::Validation(
            "Translate function returned no result".to_string(),
        )),
        other => Err(DubError::Validation(format!(
            "Translate function returned an unexpected result: {}",
            other
        ))),
    }
}

/// Key of the synthesized audio; the function answers `[key, null]` or `[null, error]`
fn synthesis_output_key(value: &Value) -> Result<String> {
    match value {
        Value::String(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        Value::Array(parts) => match (parts.first(), parts.get(1)) {
            (Some(Value::String(key)), _) if !key.trim().is_empty() => Ok(key.trim().to_string()),
            (Some(Value::Null) | None, reason) => {
                let reason = reason
                    .and_then(Value::as_str)
                    .unwrap_or("no error reported");
                Err(DubError::SynthesisFailed(reason.to_string()))
            }
            _ => Err(DubError::Validation(format!(
                "Synthesize function returned an unexpected result: {}",
                value
            ))),
        },
        Value::Null => Err(DubError::SynthesisFailed("no result returned".to_string())),
        other => {
            warn!("Unexpected synthesis result: {}", other);
            Err(DubError::Validation(format!(
                "Synthesize function returned an unexpected result: {}",
                other
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::functions::{MockFunctionInvoker, MockParameterStore};
    use crate::media::MockMediaProcessorTrait;
    use crate::poller::{JobPoller, PollPolicy};
    use crate::storage::MockObjectStore;
    use crate::transcribe::MockTranscriptionJobs;
    use std::time::Duration;

    fn workflow_with(media: MockMediaProcessorTrait, store: MockObjectStore) -> Workflow {
        let mut config = Config::default();
        config.storage.bucket = Some("dub-bucket".to_string());

        let services = ServiceInvoker::new(
            Box::new(MockFunctionInvoker::new()),
            Box::new(MockParameterStore::new()),
            Box::new(MockTranscriptionJobs::new()),
            JobPoller::new(PollPolicy { interval: Duration::from_millis(1), max_attempts: 1 }),
            "myapplication",
        );

        Workflow::new(config, Collaborators {
            services,
            store: Box::new(store),
            media: Box::new(media),
            http: reqwest::Client::new(),
        })
    }

    #[tokio::test]
    async fn test_split_failure_stops_before_upload() {
        let temp = tempfile::tempdir().unwrap();
        let input = temp.path().join("talk.mp4");
        std::fs::write(&input, b"video").unwrap();

        let mut media = MockMediaProcessorTrait::new();
        media.expect_check_availability().returning(|| Ok(()));
        media.expect_version_info().returning(|| Ok("ffmpeg version 6.1".to_string()));
        media.expect_split()
            .times(1)
            .returning(|_, _, _| Err(DubError::Media("no audio stream".to_string())));
        media.expect_combine().never();

        let mut store = MockObjectStore::new();
        store.expect_upload().never();

        let workflow = workflow_with(media, store);
        let work = temp.path().join("work");
        let out = temp.path().join("out");
        let err = workflow
            .process_single_file(&input, Some(work.as_path()), Some(out.as_path()))
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), 4);
        assert!(work.is_dir());
    }

    #[tokio::test]
    async fn test_missing_ffmpeg_is_reported_first() {
        let temp = tempfile::tempdir().unwrap();
        let input = temp.path().join("talk.mp4");
        std::fs::write(&input, b"video").unwrap();

        let mut media = MockMediaProcessorTrait::new();
        media.expect_check_availability()
            .returning(|| Err(DubError::Media("Media processor not found".to_string())));
        media.expect_split().never();

        let workflow = workflow_with(media, MockObjectStore::new());
        let work = temp.path().join("work");
        let result = workflow
            .process_single_file(&input, Some(work.as_path()), Some(work.as_path()))
            .await;
        assert!(matches!(result, Err(DubError::Media(_))));
    }

    #[test]
    fn test_layout_paths_and_keys() {
        let layout = RunLayout::new(
            Path::new("media/2_20.MP4"),
            Path::new("work"),
            Path::new("out"),
            "en-US",
            "runs/abc/",
        )
        .unwrap();

        assert_eq!(layout.video_only, Path::new("work/video_only.mp4"));
        assert_eq!(layout.output_video, Path::new("out/2_20_en.mp4"));
        assert_eq!(layout.key_for(&layout.source_audio), "runs/abc/source_audio.mp3");
        assert_eq!(layout.key_for(Path::new("work/target_text_no_tc.txt")), "runs/abc/target_text_no_tc.txt");
    }

    #[test]
    fn test_layout_always_remuxes_into_mp4() {
        let layout = RunLayout::new(
            Path::new("clips/talk.webm"),
            Path::new("work"),
            Path::new("out"),
            "en-US",
            "runs/abc/",
        )
        .unwrap();

        assert_eq!(layout.video_only, Path::new("work/video_only.mp4"));
        assert_eq!(layout.output_video, Path::new("out/talk_en.mp4"));

        let bare = RunLayout::new(Path::new("talk"), Path::new("w"), Path::new("o"), "en-US", "")
            .unwrap();
        assert_eq!(bare.output_video, Path::new("o/talk_en.mp4"));
    }

    #[test]
    fn test_timestamped_prefix_shape() {
        let prefix = RunLayout::timestamped_prefix();
        assert!(prefix.starts_with("runs/"));
        assert!(prefix.ends_with('/'));
        assert_eq!(prefix.len(), "runs/20240101T120000/".len());
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(PipelineStage::TranscribePending.to_string(), "TRANSCRIBE_PENDING");
        assert_eq!(PipelineStage::Done.to_string(), "DONE");
    }

    #[test]
    fn test_translated_key() {
        assert_eq!(translated_text_key(&json!("runs/a/target_text.txt")).unwrap(), "runs/a/target_text.txt");
        assert!(translated_text_key(&Value::Null).unwrap_err().is_validation());
        assert!(translated_text_key(&json!({"key": 1})).unwrap_err().is_validation());
    }

    #[test]
    fn test_synthesis_key_variants() {
        assert_eq!(synthesis_output_key(&json!(["speech.mp3", null])).unwrap(), "speech.mp3");
        assert_eq!(synthesis_output_key(&json!("speech.mp3")).unwrap(), "speech.mp3");

        let err = synthesis_output_key(&json!([null, "Error occurred during speech synthesis"])).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("Error occurred during speech synthesis"));

        assert_eq!(synthesis_output_key(&Value::Null).unwrap_err().exit_code(), 2);
        assert!(synthesis_output_key(&json!(42)).unwrap_err().is_validation());
    }
}
