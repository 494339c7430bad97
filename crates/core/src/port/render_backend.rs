// Render Backend Port
// Abstraction over the asynchronous submit/poll/fetch/cancel rendering API

use crate::domain::{Descriptor, ExternalJobId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Backend-reported state of a submitted render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderState {
    Pending,
    Running,
    Completed,
    Failed,
}

/// One poll result from the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderStatus {
    pub state: RenderState,
    /// 0..=100 when the backend reports progress
    pub progress: Option<u8>,
    /// Backend error message, surfaced verbatim to the user
    pub error: Option<String>,
}

/// Render backend errors
#[derive(Error, Debug)]
pub enum RenderBackendError {
    #[error("Submission rejected (status {status}): {message}")]
    Submission { status: u16, message: String },

    #[error("Status poll failed: {0}")]
    Poll(String),

    #[error("Artifact fetch failed: {0}")]
    Fetch(String),

    #[error("Cancel failed: {0}")]
    Cancel(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Render backend trait
///
/// Implementations:
/// - HttpRenderBackend: production HTTP client (infra-render)
/// - mocks::MockRenderBackend: scripted behavior for tests
#[async_trait]
pub trait RenderBackend: Send + Sync {
    /// Submit a descriptor for rendering, returning the backend's job id
    ///
    /// # Errors
    /// - RenderBackendError::Submission if the backend rejects the descriptor
    async fn submit(&self, descriptor: &Descriptor) -> Result<ExternalJobId, RenderBackendError>;

    /// Poll the current status of a submitted render
    async fn status(&self, id: &ExternalJobId) -> Result<RenderStatus, RenderBackendError>;

    /// Download the finished artifact bytes
    async fn fetch(&self, id: &ExternalJobId) -> Result<Vec<u8>, RenderBackendError>;

    /// Best-effort cancellation of a submitted render
    async fn cancel(&self, id: &ExternalJobId) -> Result<(), RenderBackendError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Scripted mock behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Submit succeeds; each poll reports Running until `polls_until_done`
        /// have elapsed, then Completed with the given artifact bytes
        CompleteAfter {
            polls_until_done: usize,
            artifact: Vec<u8>,
        },
        /// Submit succeeds; the first poll reports Failed with this message
        FailOnPoll(String),
        /// Submit is rejected outright (HTTP status, message)
        RejectSubmit(u16, String),
        /// Submit succeeds; every poll errors (transient network failure)
        PollError(String),
        /// Submit succeeds; polls report Running forever (drives timeout paths)
        NeverFinish,
    }

    /// Mock render backend for queue tests
    pub struct MockRenderBackend {
        behavior: Mutex<MockBehavior>,
        submit_count: AtomicUsize,
        poll_count: AtomicUsize,
        cancel_count: AtomicUsize,
        cancelled_ids: Mutex<Vec<ExternalJobId>>,
        next_id: AtomicUsize,
    }

    impl MockRenderBackend {
        pub fn new(behavior: MockBehavior) -> Arc<Self> {
            Arc::new(Self {
                behavior: Mutex::new(behavior),
                submit_count: AtomicUsize::new(0),
                poll_count: AtomicUsize::new(0),
                cancel_count: AtomicUsize::new(0),
                cancelled_ids: Mutex::new(Vec::new()),
                next_id: AtomicUsize::new(1),
            })
        }

        pub fn new_completing(artifact: impl Into<Vec<u8>>) -> Arc<Self> {
            Self::new(MockBehavior::CompleteAfter {
                polls_until_done: 1,
                artifact: artifact.into(),
            })
        }

        pub fn set_behavior(&self, behavior: MockBehavior) {
            *self.behavior.lock().unwrap() = behavior;
        }

        pub fn submit_count(&self) -> usize {
            self.submit_count.load(Ordering::SeqCst)
        }

        pub fn poll_count(&self) -> usize {
            self.poll_count.load(Ordering::SeqCst)
        }

        pub fn cancel_count(&self) -> usize {
            self.cancel_count.load(Ordering::SeqCst)
        }

        pub fn cancelled_ids(&self) -> Vec<ExternalJobId> {
            self.cancelled_ids.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RenderBackend for MockRenderBackend {
        async fn submit(
            &self,
            _descriptor: &Descriptor,
        ) -> Result<ExternalJobId, RenderBackendError> {
            let behavior = self.behavior.lock().unwrap().clone();
            if let MockBehavior::RejectSubmit(status, message) = behavior {
                return Err(RenderBackendError::Submission { status, message });
            }
            self.submit_count.fetch_add(1, Ordering::SeqCst);
            let n = self.next_id.fetch_add(1, Ordering::SeqCst);
            Ok(format!("ext-{}", n))
        }

        async fn status(&self, _id: &ExternalJobId) -> Result<RenderStatus, RenderBackendError> {
            let polls = self.poll_count.fetch_add(1, Ordering::SeqCst) + 1;
            let behavior = self.behavior.lock().unwrap().clone();
            match behavior {
                MockBehavior::CompleteAfter {
                    polls_until_done, ..
                } => {
                    if polls >= polls_until_done {
                        Ok(RenderStatus {
                            state: RenderState::Completed,
                            progress: Some(100),
                            error: None,
                        })
                    } else {
                        Ok(RenderStatus {
                            state: RenderState::Running,
                            progress: Some((polls * 100 / polls_until_done.max(1)) as u8),
                            error: None,
                        })
                    }
                }
                MockBehavior::FailOnPoll(message) => Ok(RenderStatus {
                    state: RenderState::Failed,
                    progress: None,
                    error: Some(message),
                }),
                MockBehavior::RejectSubmit(..) => Err(RenderBackendError::Poll(
                    "status called on rejected submit".to_string(),
                )),
                MockBehavior::PollError(message) => Err(RenderBackendError::Poll(message)),
                MockBehavior::NeverFinish => Ok(RenderStatus {
                    state: RenderState::Running,
                    progress: None,
                    error: None,
                }),
            }
        }

        async fn fetch(&self, _id: &ExternalJobId) -> Result<Vec<u8>, RenderBackendError> {
            let behavior = self.behavior.lock().unwrap().clone();
            match behavior {
                MockBehavior::CompleteAfter { artifact, .. } => Ok(artifact),
                _ => Err(RenderBackendError::Fetch(
                    "no artifact for this behavior".to_string(),
                )),
            }
        }

        async fn cancel(&self, id: &ExternalJobId) -> Result<(), RenderBackendError> {
            self.cancel_count.fetch_add(1, Ordering::SeqCst);
            self.cancelled_ids.lock().unwrap().push(id.clone());
            Ok(())
        }
    }
}
