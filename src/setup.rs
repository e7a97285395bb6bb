use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use aws_config::{BehaviorVersion, Region};
use reqwest::Client;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Result, DubError};
use crate::functions::lambda::LambdaInvoker;
use crate::functions::ssm::SsmParameterStore;
use crate::functions::ServiceInvoker;
use crate::media::MediaProcessorFactory;
use crate::poller::{JobPoller, PollPolicy};
use crate::storage::s3::S3ObjectStore;
use crate::transcribe::aws::AwsTranscriptionJobs;
use crate::workflow::Collaborators;

const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

/// Prepares the local state directory and connects the cloud services
pub struct SetupManager {
    client: Client,
    state_dir: PathBuf,
}

impl SetupManager {
    pub fn new() -> Result<Self> {
        Self::with_state_dir(".dubline")
    }

    pub fn with_state_dir<P: Into<PathBuf>>(state_dir: P) -> Result<Self> {
        let state_dir = state_dir.into();
        fs::create_dir_all(state_dir.join("log"))?;

        let client = Client::builder()
            .user_agent(concat!("dubline/", env!("CARGO_PKG_VERSION")))
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(DubError::Http)?;

        Ok(Self { client, state_dir })
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    /// Build AWS-backed collaborators for a pipeline run
    pub async fn connect(&self, config: &Config) -> Result<Collaborators> {
        info!("Connecting to AWS in region {}", config.aws.region);

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.aws.region.clone()));
        if let Some(profile) = &config.aws.profile {
            debug!("Using AWS profile {}", profile);
            loader = loader.profile_name(profile);
        }
        let shared = loader.load().await;

        let poller = JobPoller::new(PollPolicy::from(&config.poller)).with_spinner();
        let services = ServiceInvoker::new(
            Box::new(LambdaInvoker::new(aws_sdk_lambda::Client::new(&shared))),
            Box::new(SsmParameterStore::new(aws_sdk_ssm::Client::new(&shared))),
            Box::new(AwsTranscriptionJobs::new(aws_sdk_transcribe::Client::new(&shared))),
            poller,
            config.functions.app_name.clone(),
        );

        Ok(Collaborators {
            services,
            store: Box::new(S3ObjectStore::new(aws_sdk_s3::Client::new(&shared))),
            media: MediaProcessorFactory::create_processor(config.media.clone()),
            http: self.client.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_dir_is_created() {
        let temp = tempfile::tempdir().unwrap();
        let state_dir = temp.path().join(".dubline");

        let manager = SetupManager::with_state_dir(&state_dir).unwrap();
        assert_eq!(manager.state_dir(), state_dir.as_path());
        assert!(state_dir.join("log").is_dir());
    }
}
