use std::fmt;
use std::future::Future;
use std::time::Duration;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::PollerConfig;
use crate::error::{Result, DubError};

/// Opaque name of an asynchronous remote job
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    /// Map a service status string; anything not finished counts as in progress.
    pub fn from_service_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "COMPLETED" => Self::Completed,
            "FAILED" => Self::Failed,
            _ => Self::InProgress,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One answer from a status check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusReport {
    pub status: JobStatus,
    /// Where the result can be fetched once the job is done
    pub locator: Option<String>,
    pub failure_reason: Option<String>,
}

impl JobStatusReport {
    pub fn in_progress() -> Self {
        Self {
            status: JobStatus::InProgress,
            locator: None,
            failure_reason: None,
        }
    }

    pub fn completed<S: Into<String>>(locator: S) -> Self {
        Self {
            status: JobStatus::Completed,
            locator: Some(locator.into()),
            failure_reason: None,
        }
    }

    pub fn failed<S: Into<String>>(reason: S) -> Self {
        Self {
            status: JobStatus::Failed,
            locator: None,
            failure_reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    /// 0 means no bound
    pub max_attempts: u32,
}

impl From<&PollerConfig> for PollPolicy {
    fn from(config: &PollerConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs),
            max_attempts: config.max_attempts,
        }
    }
}

/// Fixed-interval status polling until a job reaches a terminal state
pub struct JobPoller {
    policy: PollPolicy,
    spinner: bool,
}

impl JobPoller {
    pub fn new(policy: PollPolicy) -> Self {
        Self { policy, spinner: false }
    }

    /// Show a terminal spinner with the latest status while waiting
    pub fn with_spinner(mut self) -> Self {
        self.spinner = true;
        self
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Call `check` until it reports `COMPLETED` or `FAILED`.
    ///
    /// Errors from `check` end the wait immediately. When `max_attempts` is
    /// non-zero and that many checks came back in progress, the wait ends with
    /// [`DubError::PollTimeout`].
    pub async fn wait<F, Fut>(&self, job: &JobHandle, mut check: F) -> Result<JobStatusReport>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<JobStatusReport>>,
    {
        let progress = self.make_progress(job);
        let mut attempts: u32 = 0;

        let outcome = loop {
            attempts += 1;
            let report = match check().await {
                Ok(report) => report,
                Err(e) => break Err(e),
            };

            debug!("Job {} status after {} checks: {}", job, attempts, report.status);
            if let Some(pb) = &progress {
                pb.set_message(format!("{}: {} (check {})", job, report.status, attempts));
            }

            if report.status.is_terminal() {
                break Ok(report);
            }

            if self.policy.max_attempts != 0 && attempts >= self.policy.max_attempts {
                warn!("Job {} still in progress after {} checks", job, attempts);
                break Err(DubError::PollTimeout {
                    job: job.to_string(),
                    attempts,
                });
            }

            tokio::time::sleep(self.policy.interval).await;
        };

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        if let Ok(report) = &outcome {
            info!("Job {} finished with status {} after {} checks", job, report.status, attempts);
        }
        outcome
    }

    fn make_progress(&self, job: &JobHandle) -> Option<ProgressBar> {
        if !self.spinner {
            return None;
        }
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()));
        pb.set_message(format!("{}: waiting", job));
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn quick_policy(max_attempts: u32) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(1),
            max_attempts,
        }
    }

    #[tokio::test]
    async fn test_waits_until_completed() {
        let poller = JobPoller::new(quick_policy(10));
        let job = JobHandle::new("tel2engTranscription");
        let calls = Cell::new(0);

        let report = poller
            .wait(&job, || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move {
                    if n < 3 {
                        Ok(JobStatusReport::in_progress())
                    } else {
                        Ok(JobStatusReport::completed("https://example.com/t.json"))
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(calls.get(), 3);
        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(report.locator.as_deref(), Some("https://example.com/t.json"));
    }

    #[tokio::test]
    async fn test_failed_is_terminal() {
        let poller = JobPoller::new(quick_policy(10));
        let job = JobHandle::new("job");

        let report = poller
            .wait(&job, || async { Ok(JobStatusReport::failed("bad media")) })
            .await
            .unwrap();

        assert_eq!(report.status, JobStatus::Failed);
        assert_eq!(report.failure_reason.as_deref(), Some("bad media"));
    }

    #[tokio::test]
    async fn test_times_out_after_max_attempts() {
        let poller = JobPoller::new(quick_policy(4));
        let job = JobHandle::new("slow");
        let calls = Cell::new(0);

        let err = poller
            .wait(&job, || {
                calls.set(calls.get() + 1);
                async { Ok(JobStatusReport::in_progress()) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.get(), 4);
        match err {
            DubError::PollTimeout { job, attempts } => {
                assert_eq!(job, "slow");
                assert_eq!(attempts, 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_check_error_stops_polling() {
        let poller = JobPoller::new(quick_policy(0));
        let job = JobHandle::new("job");

        let result = poller
            .wait(&job, || async { Err(DubError::Storage("throttled".to_string())) })
            .await;

        assert!(matches!(result, Err(DubError::Storage(_))));
    }

    #[test]
    fn test_service_status_mapping() {
        assert_eq!(JobStatus::from_service_str("QUEUED"), JobStatus::InProgress);
        assert_eq!(JobStatus::from_service_str("in_progress"), JobStatus::InProgress);
        assert_eq!(JobStatus::from_service_str("COMPLETED"), JobStatus::Completed);
        assert_eq!(JobStatus::from_service_str("FAILED"), JobStatus::Failed);
    }
}
