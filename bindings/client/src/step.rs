use bytes::Bytes;
use reqwest::{Method, StatusCode};
use url::Url;

/// One HTTP request step of a scenario.
///
/// The label names the step for aggregation and is attached to the request's operation record
/// whatever the outcome.
#[derive(Debug, Clone)]
pub struct StepRequest {
    pub label: &'static str,
    pub method: Method,
    pub url: Url,
    pub body: Option<Bytes>,
    pub content_type: Option<&'static str>,
}

/// The outcome of one request step.
///
/// A transport failure or timeout leaves `status` empty and carries the error text instead.
/// The body is always fully read before the step completes.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub status: Option<StatusCode>,
    pub body: Bytes,
    pub error: Option<String>,
}

impl StepResult {
    pub fn is_status(&self, status: StatusCode) -> bool {
        self.status == Some(status)
    }

    /// True for any 2xx status.
    pub fn is_success(&self) -> bool {
        self.status.map(|s| s.is_success()).unwrap_or(false)
    }
}
