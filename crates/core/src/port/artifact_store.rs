// Artifact Store Port
// Where fetched render artifacts end up (filesystem in production)

use crate::domain::JobId;
use crate::error::Result;
use async_trait::async_trait;

/// Artifact persistence interface
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist artifact bytes under the resolved filename.
    /// Returns the stored path (or URI) for the job record.
    async fn save(&self, job_id: &JobId, file_name: &str, bytes: &[u8]) -> Result<String>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory artifact store for queue tests
    #[derive(Default)]
    pub struct InMemoryArtifactStore {
        saved: Mutex<HashMap<JobId, (String, Vec<u8>)>>,
    }

    impl InMemoryArtifactStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn saved_for(&self, job_id: &str) -> Option<(String, Vec<u8>)> {
            self.saved.lock().unwrap().get(job_id).cloned()
        }

        pub fn count(&self) -> usize {
            self.saved.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ArtifactStore for InMemoryArtifactStore {
        async fn save(&self, job_id: &JobId, file_name: &str, bytes: &[u8]) -> Result<String> {
            let path = format!("mem://{}", file_name);
            self.saved
                .lock()
                .unwrap()
                .insert(job_id.clone(), (file_name.to_string(), bytes.to_vec()));
            Ok(path)
        }
    }
}
