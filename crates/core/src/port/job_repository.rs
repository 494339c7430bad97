// Job Repository Port (Interface)

use crate::domain::{JobId, JobStatus, RenderJob};
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for RenderJob persistence.
///
/// The job list and the concurrency setting both survive process restart, so
/// the queue can reload its state (jobs persisted as Running are failed on
/// reload - there is no resumable network handle).
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a new job
    async fn insert(&self, job: &RenderJob) -> Result<()>;

    /// Update an existing job
    async fn update(&self, job: &RenderJob) -> Result<()>;

    /// Delete a job by ID (no-op when absent)
    async fn delete(&self, id: &JobId) -> Result<()>;

    /// Find job by ID
    async fn find_by_id(&self, id: &JobId) -> Result<Option<RenderJob>>;

    /// All jobs in insertion order
    async fn list_all(&self) -> Result<Vec<RenderJob>>;

    /// All jobs with the given status, in insertion order
    async fn find_by_status(&self, status: JobStatus) -> Result<Vec<RenderJob>>;

    /// Persisted max-concurrency setting, if any
    async fn load_max_concurrent(&self) -> Result<Option<usize>>;

    /// Persist the max-concurrency setting
    async fn save_max_concurrent(&self, value: usize) -> Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// In-memory repository for queue tests (no database)
    #[derive(Default)]
    pub struct InMemoryJobRepository {
        jobs: Mutex<Vec<RenderJob>>,
        max_concurrent: Mutex<Option<usize>>,
        fail_next_insert: AtomicBool,
    }

    impl InMemoryJobRepository {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make the next insert fail, for write-path error tests
        pub fn fail_next_insert(&self) {
            self.fail_next_insert.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl JobRepository for InMemoryJobRepository {
        async fn insert(&self, job: &RenderJob) -> Result<()> {
            if self.fail_next_insert.swap(false, Ordering::SeqCst) {
                return Err(AppError::Database("insert rejected".to_string()));
            }
            self.jobs.lock().unwrap().push(job.clone());
            Ok(())
        }

        async fn update(&self, job: &RenderJob) -> Result<()> {
            let mut jobs = self.jobs.lock().unwrap();
            if let Some(existing) = jobs.iter_mut().find(|j| j.id == job.id) {
                *existing = job.clone();
            }
            Ok(())
        }

        async fn delete(&self, id: &JobId) -> Result<()> {
            self.jobs.lock().unwrap().retain(|j| &j.id != id);
            Ok(())
        }

        async fn find_by_id(&self, id: &JobId) -> Result<Option<RenderJob>> {
            Ok(self
                .jobs
                .lock()
                .unwrap()
                .iter()
                .find(|j| &j.id == id)
                .cloned())
        }

        async fn list_all(&self) -> Result<Vec<RenderJob>> {
            Ok(self.jobs.lock().unwrap().clone())
        }

        async fn find_by_status(&self, status: JobStatus) -> Result<Vec<RenderJob>> {
            Ok(self
                .jobs
                .lock()
                .unwrap()
                .iter()
                .filter(|j| j.status == status)
                .cloned()
                .collect())
        }

        async fn load_max_concurrent(&self) -> Result<Option<usize>> {
            Ok(*self.max_concurrent.lock().unwrap())
        }

        async fn save_max_concurrent(&self, value: usize) -> Result<()> {
            *self.max_concurrent.lock().unwrap() = Some(value);
            Ok(())
        }
    }
}
