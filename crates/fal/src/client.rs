//! reqwest-based [`FalClient`] implementing [`InferenceService`].
//!
//! Talks to the fal.ai queue API:
//!
//! ```text
//! POST {base}/{endpoint}                      submit, returns request_id
//! GET  {base}/{endpoint}/requests/{id}/status current queue status
//! GET  {base}/{endpoint}/requests/{id}        result payload
//! ```

use base64::Engine;
use serde::Deserialize;

use crate::service::{InferenceService, PollOutcome, Submission};

/// Endpoint for prompt-only generation.
pub const TEXT_TO_IMAGE_ENDPOINT: &str = "fal-ai/nano-banana";

/// Endpoint for editing an existing image.
pub const IMAGE_TO_IMAGE_ENDPOINT: &str = "fal-ai/nano-banana/edit";

/// Default queue API base URL.
const DEFAULT_BASE_URL: &str = "https://queue.fal.run";

/// Per-call timeout for queue API requests. The submit endpoint only
/// enqueues work, so no call should run long.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Errors from the fal.ai client.
///
/// Only submission surfaces these to callers; status polling maps all
/// failures to [`PollOutcome::Unknown`] internally.
#[derive(Debug, thiserror::Error)]
pub enum FalError {
    /// No API credential configured; nothing can be submitted.
    #[error("FAL API key not configured")]
    Unconfigured,

    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// fal.ai returned a non-2xx status code.
    #[error("fal.ai API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

/// HTTP client for the fal.ai queue API.
pub struct FalClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

/// Response returned by the queue submit endpoint.
#[derive(Debug, Deserialize)]
struct QueueSubmitResponse {
    request_id: String,
}

impl FalClient {
    /// Create a client with an explicit base URL and optional API key.
    ///
    /// A `None` key is allowed at construction time so the server can
    /// start without a credential; submission then fails with
    /// [`FalError::Unconfigured`].
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self {
            client,
            base_url,
            api_key,
        }
    }

    /// Build a client from environment variables.
    ///
    /// | Env Var         | Required | Default                  |
    /// |-----------------|----------|--------------------------|
    /// | `FAL_KEY`       | no       | -- (submission disabled) |
    /// | `FAL_QUEUE_URL` | no       | `https://queue.fal.run`  |
    pub fn from_env() -> Self {
        let api_key = std::env::var("FAL_KEY").ok().filter(|k| !k.is_empty());
        let base_url =
            std::env::var("FAL_QUEUE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(base_url, api_key)
    }

    fn key(&self) -> Result<&str, FalError> {
        self.api_key.as_deref().ok_or(FalError::Unconfigured)
    }

    /// Fetch the result payload for a request.
    async fn fetch_result(
        &self,
        request_id: &str,
        application: &str,
    ) -> Result<serde_json::Value, FalError> {
        let url = format!("{}/{application}/requests/{request_id}", self.base_url);
        let response = self
            .client
            .get(url)
            .header("Authorization", format!("Key {}", self.key()?))
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Ensure the response has a success status code, then parse JSON.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, FalError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(FalError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait::async_trait]
impl InferenceService for FalClient {
    async fn submit(&self, prompt: &str, image: Option<&[u8]>) -> Result<Submission, FalError> {
        let key = self.key()?;

        let (application, arguments) = build_submit_arguments(prompt, image);

        let url = format!("{}/{application}", self.base_url);
        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Key {key}"))
            .json(&arguments)
            .send()
            .await?;

        let queued: QueueSubmitResponse = Self::parse_response(response).await?;

        tracing::info!(
            request_id = %queued.request_id,
            application,
            "Submitted job to fal.ai",
        );

        Ok(Submission {
            request_id: queued.request_id,
            application: application.to_string(),
        })
    }

    async fn poll_status(&self, request_id: &str, application: &str) -> PollOutcome {
        let key = match self.key() {
            Ok(key) => key,
            Err(_) => return PollOutcome::Unknown,
        };

        let url = format!(
            "{}/{application}/requests/{request_id}/status",
            self.base_url
        );
        let status_payload: Result<serde_json::Value, FalError> = match self
            .client
            .get(url)
            .header("Authorization", format!("Key {key}"))
            .send()
            .await
        {
            Ok(response) => Self::parse_response(response).await,
            Err(e) => Err(e.into()),
        };

        let wire_status = match &status_payload {
            Ok(payload) => payload.get("status").and_then(|s| s.as_str()),
            Err(_) => None,
        };

        match wire_status.map(status_from_wire) {
            Some(WireStatus::Queued) => PollOutcome::Queued,
            Some(WireStatus::Processing) => PollOutcome::Processing,
            Some(WireStatus::Completed) => {
                // Status says done; the result payload is authoritative
                // for the output URL. A failed result fetch at this
                // point is recorded as a failure, not retried.
                match self.fetch_result(request_id, application).await {
                    Ok(result) => PollOutcome::Completed {
                        result_url: extract_result_url(&result),
                    },
                    Err(e) => {
                        tracing::warn!(
                            request_id,
                            error = %e,
                            "Job reported completed but result is unavailable",
                        );
                        PollOutcome::Failed
                    }
                }
            }
            Some(WireStatus::Other) => PollOutcome::Unknown,
            None => {
                // Status endpoint unreachable or unparsable. Fall back
                // to fetching the result directly: a job may already
                // have finished even when status queries fail.
                match self.fetch_result(request_id, application).await {
                    Ok(result) => PollOutcome::Completed {
                        result_url: extract_result_url(&result),
                    },
                    Err(e) => {
                        tracing::debug!(
                            request_id,
                            error = %e,
                            "Unable to determine job status this cycle",
                        );
                        PollOutcome::Unknown
                    }
                }
            }
        }
    }
}

/// Queue status strings as reported on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WireStatus {
    Queued,
    Processing,
    Completed,
    Other,
}

/// Map a wire status string to a known queue state.
fn status_from_wire(status: &str) -> WireStatus {
    match status {
        "IN_QUEUE" => WireStatus::Queued,
        "IN_PROGRESS" => WireStatus::Processing,
        "COMPLETED" => WireStatus::Completed,
        _ => WireStatus::Other,
    }
}

/// Select the endpoint and build the request arguments.
///
/// With an input image the job goes to the edit endpoint with the
/// image transmitted inline as a base64 data URI; without one it goes
/// to text-to-image with a square aspect ratio.
fn build_submit_arguments(
    prompt: &str,
    image: Option<&[u8]>,
) -> (&'static str, serde_json::Value) {
    match image {
        Some(bytes) => {
            let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
            let arguments = serde_json::json!({
                "prompt": prompt,
                "image_urls": [format!("data:image/jpeg;base64,{encoded}")],
                "num_images": 1,
                "output_format": "jpeg",
            });
            (IMAGE_TO_IMAGE_ENDPOINT, arguments)
        }
        None => {
            let arguments = serde_json::json!({
                "prompt": prompt,
                "num_images": 1,
                "output_format": "jpeg",
                "aspect_ratio": "1:1",
            });
            (TEXT_TO_IMAGE_ENDPOINT, arguments)
        }
    }
}

/// Pull the first image URL out of a result payload
/// (`result.images[0].url`).
fn extract_result_url(result: &serde_json::Value) -> Option<String> {
    result
        .get("images")?
        .as_array()?
        .first()?
        .get("url")?
        .as_str()
        .map(str::to_string)
}
