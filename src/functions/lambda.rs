use async_trait::async_trait;
use aws_sdk_lambda::error::DisplayErrorContext;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::InvocationType;
use tracing::debug;

use crate::error::{Result, DubError};
use super::{FunctionInvoker, InvocationResponse};

/// Synchronous (`RequestResponse`) AWS Lambda invocations
pub struct LambdaInvoker {
    client: aws_sdk_lambda::Client,
}

impl LambdaInvoker {
    pub fn new(client: aws_sdk_lambda::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FunctionInvoker for LambdaInvoker {
    async fn invoke(&self, function_name: &str, payload: Vec<u8>) -> Result<InvocationResponse> {
        debug!("Lambda request to {}: {} bytes", function_name, payload.len());

        let output = self.client
            .invoke()
            .function_name(function_name)
            .invocation_type(InvocationType::RequestResponse)
            .payload(Blob::new(payload))
            .send()
            .await
            .map_err(|e| DubError::aws("lambda", DisplayErrorContext(e)))?;

        Ok(InvocationResponse {
            status_code: output.status_code(),
            payload: output.payload().map(|blob| blob.as_ref().to_vec()).unwrap_or_default(),
            function_error: output.function_error().map(str::to_string),
        })
    }
}
