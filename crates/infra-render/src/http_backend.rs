// HTTP Render Backend
// reqwest client over the asynchronous submit/poll/fetch/cancel rendering API

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use varia_core::domain::{Descriptor, ExternalJobId};
use varia_core::port::{RenderBackend, RenderBackendError, RenderState, RenderStatus};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Submit response body: `{"job_id": "..."}`
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    job_id: String,
}

/// Status response body: `{"state": "running", "progress": 42, "error": null}`
#[derive(Debug, Deserialize)]
struct StatusResponse {
    state: RenderState,
    progress: Option<u8>,
    error: Option<String>,
}

/// Render backend client
///
/// # Example
///
/// ```no_run
/// use varia_infra_render::HttpRenderBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = HttpRenderBackend::new("http://127.0.0.1:8090")?;
/// # Ok(())
/// # }
/// ```
pub struct HttpRenderBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRenderBackend {
    /// Create a client for the render service at `base_url`
    pub fn new(base_url: impl Into<String>) -> Result<Self, RenderBackendError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RenderBackendError::Http(format!("Failed to create client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn job_url(&self, id: &ExternalJobId) -> String {
        format!("{}/jobs/{}", self.base_url, id)
    }
}

#[async_trait]
impl RenderBackend for HttpRenderBackend {
    async fn submit(&self, descriptor: &Descriptor) -> Result<ExternalJobId, RenderBackendError> {
        let url = format!("{}/jobs", self.base_url);
        debug!(url = %url, template = %descriptor.template.id, "Submitting render job");

        let response = self
            .client
            .post(&url)
            .json(descriptor)
            .send()
            .await
            .map_err(|e| RenderBackendError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RenderBackendError::Submission {
                status: status.as_u16(),
                message,
            });
        }

        let body: SubmitResponse = response
            .json()
            .await
            .map_err(|e| RenderBackendError::Http(format!("Invalid submit response: {}", e)))?;

        Ok(body.job_id)
    }

    async fn status(&self, id: &ExternalJobId) -> Result<RenderStatus, RenderBackendError> {
        let response = self
            .client
            .get(self.job_url(id))
            .send()
            .await
            .map_err(|e| RenderBackendError::Poll(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RenderBackendError::Poll(format!(
                "status {}: {}",
                status.as_u16(),
                message
            )));
        }

        let body: StatusResponse = response
            .json()
            .await
            .map_err(|e| RenderBackendError::Poll(format!("Invalid status response: {}", e)))?;

        Ok(RenderStatus {
            state: body.state,
            progress: body.progress,
            error: body.error,
        })
    }

    async fn fetch(&self, id: &ExternalJobId) -> Result<Vec<u8>, RenderBackendError> {
        let url = format!("{}/artifact", self.job_url(id));
        debug!(url = %url, "Fetching render artifact");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RenderBackendError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RenderBackendError::Fetch(format!(
                "status {}: {}",
                status.as_u16(),
                message
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RenderBackendError::Fetch(e.to_string()))?;

        Ok(bytes.to_vec())
    }

    async fn cancel(&self, id: &ExternalJobId) -> Result<(), RenderBackendError> {
        let response = self
            .client
            .delete(self.job_url(id))
            .send()
            .await
            .map_err(|e| RenderBackendError::Cancel(e.to_string()))?;

        let status = response.status();
        // 404 means the backend already forgot the job; treat as cancelled
        if !status.is_success() && status.as_u16() != 404 {
            let message = response.text().await.unwrap_or_default();
            return Err(RenderBackendError::Cancel(format!(
                "status {}: {}",
                status.as_u16(),
                message
            )));
        }

        Ok(())
    }
}
