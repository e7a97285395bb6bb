use async_trait::async_trait;
use aws_sdk_ssm::error::DisplayErrorContext;
use tracing::debug;

use crate::error::{Result, DubError};
use super::ParameterStore;

/// AWS SSM parameter store
pub struct SsmParameterStore {
    client: aws_sdk_ssm::Client,
}

impl SsmParameterStore {
    pub fn new(client: aws_sdk_ssm::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ParameterStore for SsmParameterStore {
    async fn get_parameter(&self, name: &str) -> Result<String> {
        let output = self.client
            .get_parameter()
            .name(name)
            .with_decryption(true)
            .send()
            .await
            .map_err(|e| DubError::aws("ssm", DisplayErrorContext(e)))?;

        let value = output
            .parameter()
            .and_then(|p| p.value())
            .map(str::to_string)
            .ok_or_else(|| DubError::Config(format!("Parameter {} has no value", name)))?;

        debug!("Parameter {} = {}", name, value);
        Ok(value)
    }
}
