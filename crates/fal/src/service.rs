//! Inference service abstraction consumed by the api crate.

use crate::client::FalError;

/// Result of submitting work to the inference service.
#[derive(Debug, Clone)]
pub struct Submission {
    /// Request id assigned by the service; the handle for all later polls.
    pub request_id: String,
    /// Endpoint the work was submitted to (text-to-image or
    /// image-to-image). Polling must target the same endpoint.
    pub application: String,
}

/// Outcome of a single status poll.
///
/// `Unknown` means the service could not be reached or gave an
/// unrecognizable answer; the caller treats it as non-terminal and
/// retries on its own cadence. Polling never returns an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Queued,
    Processing,
    /// The service reports completion. `result_url` is `None` when the
    /// result payload carried no image; callers must record that as a
    /// failure, never as a result-less completion.
    Completed { result_url: Option<String> },
    Failed,
    Unknown,
}

impl PollOutcome {
    /// Whether this outcome ends the polling loop.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed)
    }
}

/// Contract against the third-party inference service. Implemented by
/// [`crate::FalClient`] for production and by scripted doubles in
/// tests.
#[async_trait::async_trait]
pub trait InferenceService: Send + Sync {
    /// Submit a generation job. Selects the image-to-image endpoint
    /// when `image` is present, text-to-image otherwise. Returns as
    /// soon as the service has queued the work.
    async fn submit(&self, prompt: &str, image: Option<&[u8]>) -> Result<Submission, FalError>;

    /// Poll a submitted job once. Retry cadence belongs to the caller;
    /// no retries or backoff happen here.
    async fn poll_status(&self, request_id: &str, application: &str) -> PollOutcome;
}
