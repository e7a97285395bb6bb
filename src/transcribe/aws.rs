use async_trait::async_trait;
use aws_sdk_transcribe::error::DisplayErrorContext;
use aws_sdk_transcribe::types::TranscriptionJobStatus;
use tracing::debug;

use crate::error::{Result, DubError};
use crate::poller::{JobHandle, JobStatus, JobStatusReport};
use super::TranscriptionJobs;

/// Job status lookups against AWS Transcribe
pub struct AwsTranscriptionJobs {
    client: aws_sdk_transcribe::Client,
}

impl AwsTranscriptionJobs {
    pub fn new(client: aws_sdk_transcribe::Client) -> Self {
        Self { client }
    }
}

fn map_status(status: Option<&TranscriptionJobStatus>) -> JobStatus {
    match status {
        Some(TranscriptionJobStatus::Completed) => JobStatus::Completed,
        Some(TranscriptionJobStatus::Failed) => JobStatus::Failed,
        Some(other) => JobStatus::from_service_str(other.as_str()),
        None => JobStatus::InProgress,
    }
}

#[async_trait]
impl TranscriptionJobs for AwsTranscriptionJobs {
    async fn job_status(&self, job: &JobHandle) -> Result<JobStatusReport> {
        let output = self.client
            .get_transcription_job()
            .transcription_job_name(job.as_str())
            .send()
            .await
            .map_err(|e| DubError::aws("transcribe", DisplayErrorContext(e)))?;

        let details = output.transcription_job().ok_or_else(|| {
            DubError::Validation(format!("No transcription job returned for {}", job))
        })?;

        let status = map_status(details.transcription_job_status());
        debug!("Transcription job {} reported {}", job, status);

        Ok(JobStatusReport {
            status,
            locator: details
                .transcript()
                .and_then(|t| t.transcript_file_uri())
                .map(str::to_string),
            failure_reason: details.failure_reason().map(str::to_string),
        })
    }
}
