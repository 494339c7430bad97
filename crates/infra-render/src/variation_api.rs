// HTTP Variation Store
// reqwest client over the variation persistence API, keyed by
// project + element + kind

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use varia_core::domain::{ElementId, Variation};
use varia_core::error::{AppError, Result};
use varia_core::port::{AxisRecord, VariationStore};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct CleanupRequest<'a> {
    live_ids: &'a [ElementId],
}

#[derive(Debug, Deserialize)]
struct CleanupResponse {
    removed: u64,
}

/// Variation persistence client
pub struct HttpVariationStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpVariationStore {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn project_url(&self, project: &str, suffix: &str) -> String {
        format!("{}/projects/{}/{}", self.base_url, project, suffix)
    }
}

#[async_trait]
impl VariationStore for HttpVariationStore {
    async fn fetch(&self, project: &str, element_id: &ElementId) -> Result<Vec<AxisRecord>> {
        let url = self.project_url(project, &format!("elements/{}/variations", element_id));

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::Backend(varia_core::port::RenderBackendError::Http(
                e.to_string(),
            )))?;

        // 404 means the element was never varied
        if response.status().as_u16() == 404 {
            return Ok(Vec::new());
        }

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AppError::Validation(format!(
                "Variation fetch failed (status {}): {}",
                status.as_u16(),
                message
            )));
        }

        // One record per varied kind on this element
        let records: Vec<AxisRecord> = response
            .json()
            .await
            .map_err(|e| AppError::Validation(format!("Invalid variation records: {}", e)))?;

        Ok(records)
    }

    async fn save(&self, project: &str, variation: &Variation) -> Result<()> {
        let url = self.project_url(project, &format!("variations/{}", variation.id));
        debug!(url = %url, element_id = %variation.element_id, "Saving variation");

        let response = self
            .client
            .put(&url)
            .json(variation)
            .send()
            .await
            .map_err(|e| AppError::Backend(varia_core::port::RenderBackendError::Http(
                e.to_string(),
            )))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AppError::Validation(format!(
                "Variation save failed (status {}): {}",
                status.as_u16(),
                message
            )));
        }

        Ok(())
    }

    async fn delete(&self, project: &str, variation_id: &str) -> Result<()> {
        let url = self.project_url(project, &format!("variations/{}", variation_id));

        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| AppError::Backend(varia_core::port::RenderBackendError::Http(
                e.to_string(),
            )))?;

        let status = response.status();
        if !status.is_success() && status.as_u16() != 404 {
            let message = response.text().await.unwrap_or_default();
            return Err(AppError::Validation(format!(
                "Variation delete failed (status {}): {}",
                status.as_u16(),
                message
            )));
        }

        Ok(())
    }

    async fn cleanup_orphans(&self, project: &str, live_ids: &[ElementId]) -> Result<u64> {
        let url = self.project_url(project, "variations/cleanup");

        let response = self
            .client
            .post(&url)
            .json(&CleanupRequest { live_ids })
            .send()
            .await
            .map_err(|e| AppError::Backend(varia_core::port::RenderBackendError::Http(
                e.to_string(),
            )))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AppError::Validation(format!(
                "Variation cleanup failed (status {}): {}",
                status.as_u16(),
                message
            )));
        }

        let body: CleanupResponse = response
            .json()
            .await
            .map_err(|e| AppError::Validation(format!("Invalid cleanup response: {}", e)))?;

        Ok(body.removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_url_layout() {
        let store = HttpVariationStore::new("http://localhost:8091/").unwrap();
        assert_eq!(
            store.project_url("summer-sale", "elements/el-1/variations"),
            "http://localhost:8091/projects/summer-sale/elements/el-1/variations"
        );
    }

    #[test]
    fn test_cleanup_request_serializes() {
        let ids = vec!["el-1".to_string(), "el-2".to_string()];
        let json = serde_json::to_string(&CleanupRequest { live_ids: &ids }).unwrap();
        assert_eq!(json, r#"{"live_ids":["el-1","el-2"]}"#);
    }
}
