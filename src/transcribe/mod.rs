// Transcription support
//
// - common: the transcription service's result document (timed word and
//   punctuation items)
// - align: grouping of those items into time-stamped lines
// - aws: job status lookups against AWS Transcribe
//
// Transcription jobs are started by a remote function (see `functions`); this
// module only observes them and consumes their results.

pub mod common;
pub mod align;
pub mod aws;

use async_trait::async_trait;

pub use common::*;
pub use align::{AlignedLine, LineAligner};
use crate::error::Result;
use crate::poller::{JobHandle, JobStatusReport};

/// Status lookups for asynchronous transcription jobs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriptionJobs: Send + Sync {
    /// Current status of the job and, once finished, where its transcript lives
    async fn job_status(&self, job: &JobHandle) -> Result<JobStatusReport>;
}
