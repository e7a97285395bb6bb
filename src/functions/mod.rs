// Remote compute functions
//
// - lambda: AWS Lambda invocation
// - ssm: AWS SSM parameter store lookups
//
// The transcribe, translate and synthesize steps each run as a remote function.
// Their physical names are published in the parameter store under
// `/<app>/<FunctionId>FunctionName`; `ServiceInvoker` resolves those names,
// performs the call, checks the status and hands job handles to the poller.

pub mod lambda;
pub mod ssm;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, error, info};

use crate::error::{Result, DubError};
use crate::poller::{JobHandle, JobPoller, JobStatusReport};
use crate::transcribe::TranscriptionJobs;

const MAX_REPORTED_PAYLOAD_CHARS: usize = 256;

/// Raw result of a synchronous function call
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationResponse {
    pub status_code: i32,
    pub payload: Vec<u8>,
    /// Set when the function itself raised instead of returning
    pub function_error: Option<String>,
}

impl InvocationResponse {
    pub fn ok<S: Into<String>>(body: S) -> Self {
        Self {
            status_code: 200,
            payload: body.into().into_bytes(),
            function_error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code) && self.function_error.is_none()
    }
}

/// Synchronous remote function calls
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FunctionInvoker: Send + Sync {
    async fn invoke(&self, function_name: &str, payload: Vec<u8>) -> Result<InvocationResponse>;
}

/// Key-value parameter lookups
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ParameterStore: Send + Sync {
    async fn get_parameter(&self, name: &str) -> Result<String>;
}

/// Parameter name under which a function's physical name is published
pub fn function_parameter_name(app_name: &str, function_id: &str) -> String {
    format!("/{}/{}FunctionName", app_name, function_id)
}

/// Payload sent to the remote functions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub bucket: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dst_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synth_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_lang: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dst_lang: Option<String>,
}

impl JobDescriptor {
    pub fn new<S: Into<String>>(bucket: S) -> Self {
        Self {
            bucket: bucket.into(),
            ..Default::default()
        }
    }

    pub fn media<S: Into<String>>(mut self, key: S) -> Self {
        self.media = Some(key.into());
        self
    }

    pub fn transcript_file<S: Into<String>>(mut self, key: S) -> Self {
        self.transcript_file = Some(key.into());
        self
    }

    pub fn src_text<S: Into<String>>(mut self, key: S) -> Self {
        self.src_text = Some(key.into());
        self
    }

    pub fn dst_text<S: Into<String>>(mut self, key: S) -> Self {
        self.dst_text = Some(key.into());
        self
    }

    pub fn synth_file<S: Into<String>>(mut self, key: S) -> Self {
        self.synth_file = Some(key.into());
        self
    }

    pub fn languages<S1: Into<String>, S2: Into<String>>(mut self, source: S1, target: S2) -> Self {
        self.src_lang = Some(source.into());
        self.dst_lang = Some(target.into());
        self
    }
}

/// Outcome of [`ServiceInvoker::invoke`]
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationResult {
    /// Parsed JSON returned by the function
    Value(Value),
    /// The function started a job; this is its terminal report
    Job {
        handle: JobHandle,
        report: JobStatusReport,
    },
}

impl InvocationResult {
    /// The parsed value of a call made without polling
    pub fn into_value(self) -> Result<Value> {
        match self {
            Self::Value(value) => Ok(value),
            Self::Job { handle, .. } => Err(DubError::Validation(format!(
                "expected a plain result but got job {}",
                handle
            ))),
        }
    }

    /// The job and its terminal report of a polled call
    pub fn into_job(self) -> Result<(JobHandle, JobStatusReport)> {
        match self {
            Self::Job { handle, report } => Ok((handle, report)),
            Self::Value(value) => Err(DubError::Validation(format!(
                "expected a job but got {}",
                value
            ))),
        }
    }
}

/// Calls remote functions by logical id and routes job handles to the poller
pub struct ServiceInvoker {
    invoker: Box<dyn FunctionInvoker>,
    parameters: Box<dyn ParameterStore>,
    jobs: Box<dyn TranscriptionJobs>,
    poller: JobPoller,
    app_name: String,
    names: Mutex<HashMap<String, String>>,
}

impl ServiceInvoker {
    pub fn new(
        invoker: Box<dyn FunctionInvoker>,
        parameters: Box<dyn ParameterStore>,
        jobs: Box<dyn TranscriptionJobs>,
        poller: JobPoller,
        app_name: impl Into<String>,
    ) -> Self {
        Self {
            invoker,
            parameters,
            jobs,
            poller,
            app_name: app_name.into(),
            names: Mutex::new(HashMap::new()),
        }
    }

    pub fn parameters(&self) -> &dyn ParameterStore {
        self.parameters.as_ref()
    }

    /// Physical function name for a logical id, cached after the first lookup
    pub async fn resolve_function(&self, function_id: &str) -> Result<String> {
        if let Some(name) = self.cached_name(function_id) {
            return Ok(name);
        }

        let parameter = function_parameter_name(&self.app_name, function_id);
        let name = self.parameters.get_parameter(&parameter).await?;
        debug!("Resolved {} via {} to {}", function_id, parameter, name);

        if let Ok(mut names) = self.names.lock() {
            names.insert(function_id.to_string(), name.clone());
        }
        Ok(name)
    }

    fn cached_name(&self, function_id: &str) -> Option<String> {
        self.names.lock().ok()?.get(function_id).cloned()
    }

    /// Invoke `function_id` with `payload`.
    ///
    /// A non-success status is fatal and the body is not parsed. With
    /// `requires_polling` the parsed result must be a job name, which is polled
    /// until the job is COMPLETED or FAILED.
    pub async fn invoke<T: Serialize + ?Sized>(
        &self,
        function_id: &str,
        payload: &T,
        requires_polling: bool,
    ) -> Result<InvocationResult> {
        let function_name = self.resolve_function(function_id).await?;
        let body = serde_json::to_vec(payload)?;

        info!("Invoking {} ({})", function_id, function_name);
        let response = self.invoker.invoke(&function_name, body).await?;

        if !response.is_success() {
            let payload = truncate_payload(&response.payload);
            error!(
                "Received error from {}: {}: {}",
                function_id, response.status_code, payload
            );
            let payload = match &response.function_error {
                Some(kind) => format!("{} ({})", payload, kind),
                None => payload,
            };
            return Err(DubError::Invocation {
                function: function_id.to_string(),
                status: response.status_code,
                payload,
            });
        }

        let value: Value = serde_json::from_slice(&response.payload).map_err(|e| {
            DubError::Validation(format!(
                "{} returned a body that is not JSON ({}): {}",
                function_id,
                e,
                truncate_payload(&response.payload)
            ))
        })?;

        if !requires_polling {
            return Ok(InvocationResult::Value(value));
        }

        let handle = match value.as_str() {
            Some(name) if !name.trim().is_empty() => JobHandle::new(name.trim()),
            _ => {
                return Err(DubError::Validation(format!(
                    "{} did not return a job name: {}",
                    function_id, value
                )));
            }
        };

        info!("{} started job {}", function_id, handle);
        let report = self.poller
            .wait(&handle, || self.jobs.job_status(&handle))
            .await?;

        Ok(InvocationResult::Job { handle, report })
    }
}

fn truncate_payload(payload: &[u8]) -> String {
    let text = String::from_utf8_lossy(payload);
    if text.chars().count() > MAX_REPORTED_PAYLOAD_CHARS {
        let cut: String = text.chars().take(MAX_REPORTED_PAYLOAD_CHARS).collect();
        format!("{}...", cut)
    } else {
        text.into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poller::{JobStatus, PollPolicy};
    use crate::transcribe::MockTranscriptionJobs;
    use std::time::Duration;

    fn quick_poller() -> JobPoller {
        JobPoller::new(PollPolicy {
            interval: Duration::from_millis(1),
            max_attempts: 5,
        })
    }

    fn parameters() -> MockParameterStore {
        let mut params = MockParameterStore::new();
        params.expect_get_parameter()
            .returning(|name| Ok(format!("fn-for-{}", name)));
        params
    }

    #[test]
    fn test_parameter_naming() {
        assert_eq!(
            function_parameter_name("myapplication", "TranslateLambda"),
            "/myapplication/TranslateLambdaFunctionName"
        );
    }

    #[test]
    fn test_descriptor_omits_unset_keys() {
        let descriptor = JobDescriptor::new("bucket")
            .synth_file("runs/x/target_text_no_tc.txt");
        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"bucket": "bucket", "synth_file": "runs/x/target_text_no_tc.txt"})
        );
    }

    #[tokio::test]
    async fn test_returns_parsed_value() {
        let mut invoker = MockFunctionInvoker::new();
        invoker.expect_invoke()
            .withf(|name: &str, body: &Vec<u8>| {
                let sent: Value = serde_json::from_slice(body).unwrap();
                name == "fn-for-/myapplication/TranslateLambdaFunctionName" && sent["bucket"] == "b"
            })
            .times(1)
            .returning(|_, _| Ok(InvocationResponse::ok("\"runs/x/target_text.txt\"")));

        let service = ServiceInvoker::new(
            Box::new(invoker),
            Box::new(parameters()),
            Box::new(MockTranscriptionJobs::new()),
            quick_poller(),
            "myapplication",
        );

        let result = service
            .invoke("TranslateLambda", &JobDescriptor::new("b"), false)
            .await
            .unwrap();
        assert_eq!(result, InvocationResult::Value(Value::String("runs/x/target_text.txt".to_string())));
    }

    #[tokio::test]
    async fn test_error_status_is_fatal_and_truncated() {
        let mut invoker = MockFunctionInvoker::new();
        invoker.expect_invoke().returning(|_, _| {
            Ok(InvocationResponse {
                status_code: 500,
                payload: "x".repeat(1000).into_bytes(),
                function_error: None,
            })
        });

        let service = ServiceInvoker::new(
            Box::new(invoker),
            Box::new(parameters()),
            Box::new(MockTranscriptionJobs::new()),
            quick_poller(),
            "myapplication",
        );

        let err = service
            .invoke("TranscriptionLambda", &JobDescriptor::new("b"), true)
            .await
            .unwrap_err();
        match err {
            DubError::Invocation { function, status, payload } => {
                assert_eq!(function, "TranscriptionLambda");
                assert_eq!(status, 500);
                assert_eq!(payload.len(), MAX_REPORTED_PAYLOAD_CHARS + 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_function_error_is_fatal() {
        let mut invoker = MockFunctionInvoker::new();
        invoker.expect_invoke().returning(|_, _| {
            Ok(InvocationResponse {
                status_code: 200,
                payload: br#"{"errorMessage": "KeyError: 'media'"}"#.to_vec(),
                function_error: Some("Unhandled".to_string()),
            })
        });

        let service = ServiceInvoker::new(
            Box::new(invoker),
            Box::new(parameters()),
            Box::new(MockTranscriptionJobs::new()),
            quick_poller(),
            "myapplication",
        );

        let err = service
            .invoke("TranscriptionLambda", &JobDescriptor::new("b"), true)
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_polls_returned_job() {
        let mut invoker = MockFunctionInvoker::new();
        invoker.expect_invoke()
            .returning(|_, _| Ok(InvocationResponse::ok("\"tel2engTranscription\"")));

        let mut jobs = MockTranscriptionJobs::new();
        let mut seq = mockall::Sequence::new();
        jobs.expect_job_status()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Ok(JobStatusReport::in_progress()));
        jobs.expect_job_status()
            .withf(|job: &JobHandle| job.as_str() == "tel2engTranscription")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(JobStatusReport::completed("s3://b/tel2engTranscription.json")));

        let service = ServiceInvoker::new(
            Box::new(invoker),
            Box::new(parameters()),
            Box::new(jobs),
            quick_poller(),
            "myapplication",
        );

        let result = service
            .invoke("TranscriptionLambda", &JobDescriptor::new("b"), true)
            .await
            .unwrap();
        match result {
            InvocationResult::Job { handle, report } => {
                assert_eq!(handle.as_str(), "tel2engTranscription");
                assert_eq!(report.status, JobStatus::Completed);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_null_job_name_is_validation_error() {
        let mut invoker = MockFunctionInvoker::new();
        invoker.expect_invoke().returning(|_, _| Ok(InvocationResponse::ok("null")));

        let service = ServiceInvoker::new(
            Box::new(invoker),
            Box::new(parameters()),
            Box::new(MockTranscriptionJobs::new()),
            quick_poller(),
            "myapplication",
        );

        let err = service
            .invoke("TranscriptionLambda", &JobDescriptor::new("b"), true)
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_function_names_are_cached() {
        let mut params = MockParameterStore::new();
        params.expect_get_parameter()
            .times(1)
            .returning(|_| Ok("resolved".to_string()));

        let service = ServiceInvoker::new(
            Box::new(MockFunctionInvoker::new()),
            Box::new(params),
            Box::new(MockTranscriptionJobs::new()),
            quick_poller(),
            "myapplication",
        );

        assert_eq!(service.resolve_function("SynthesizeLambda").await.unwrap(), "resolved");
        assert_eq!(service.resolve_function("SynthesizeLambda").await.unwrap(), "resolved");
    }
}
