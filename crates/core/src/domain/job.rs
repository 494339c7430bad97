// Render Job Domain Model

use crate::domain::element::Descriptor;
use crate::domain::error::{DomainError, Result};
use serde::{Deserialize, Serialize};

/// Job ID (UUID v4)
pub type JobId = String;

/// Job id assigned by the render backend on submit
pub type ExternalJobId = String;

/// Render job state machine: Pending -> Running -> {Completed | Failed}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "PENDING"),
            JobStatus::Running => write!(f, "RUNNING"),
            JobStatus::Completed => write!(f, "COMPLETED"),
            JobStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// One queued request to render a descriptor into a downloadable artifact.
///
/// Created on enqueue, mutated only by the queue's update path, terminal on
/// Completed/Failed. Removable at any time; removing a Running job triggers a
/// best-effort backend cancel before local removal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderJob {
    pub id: JobId,
    /// Resolved output filename for this combination
    pub name: String,
    pub descriptor: Descriptor,
    pub status: JobStatus,
    /// 0..=100; estimated when the backend reports nothing
    pub progress: u8,
    pub external_id: Option<ExternalJobId>,

    pub created_at: i64, // epoch ms
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,

    pub error: Option<String>,
    pub artifact_path: Option<String>,
}

impl RenderJob {
    /// Create a new pending job
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    /// * `name` - Resolved output filename
    /// * `descriptor` - Materialized render descriptor
    pub fn new(
        id: impl Into<String>,
        created_at: i64,
        name: impl Into<String>,
        descriptor: Descriptor,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            descriptor,
            status: JobStatus::Pending,
            progress: 0,
            external_id: None,
            created_at,
            started_at: None,
            finished_at: None,
            error: None,
            artifact_path: None,
        }
    }

    /// Transition to Running with explicit timestamp
    pub fn start(&mut self, now_millis: i64) -> Result<()> {
        if self.status != JobStatus::Pending {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: "RUNNING".to_string(),
            });
        }
        self.status = JobStatus::Running;
        self.started_at = Some(now_millis);
        Ok(())
    }

    /// Transition to Completed with explicit timestamp
    pub fn complete(&mut self, now_millis: i64, artifact_path: impl Into<String>) -> Result<()> {
        if self.status != JobStatus::Running {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: "COMPLETED".to_string(),
            });
        }
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.finished_at = Some(now_millis);
        self.artifact_path = Some(artifact_path.into());
        Ok(())
    }

    /// Mark as Failed with explicit timestamp and captured error
    pub fn fail(&mut self, now_millis: i64, error: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.finished_at = Some(now_millis);
        self.error = Some(error.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::element::Template;

    fn descriptor() -> Descriptor {
        Descriptor {
            template: Template {
                id: "tpl-1".to_string(),
                project: "demo".to_string(),
                platform: None,
                duration_ms: 5000.0,
                nodes: vec![],
            },
            duration_ms: 5000.0,
            platform: None,
            output_format: "mp4".to_string(),
        }
    }

    #[test]
    fn test_job_lifecycle() {
        let mut job = RenderJob::new("job-1", 1000, "out.mp4", descriptor());
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.started_at.is_none());

        job.start(2000).unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.started_at, Some(2000));

        job.complete(3000, "/out/out.mp4").unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert_eq!(job.artifact_path.as_deref(), Some("/out/out.mp4"));
        assert!(job.status.is_terminal());
    }

    #[test]
    fn test_invalid_transitions() {
        let mut job = RenderJob::new("job-2", 1000, "out.mp4", descriptor());

        // Cannot complete without starting
        assert!(job.complete(2000, "/out/out.mp4").is_err());

        job.start(2000).unwrap();
        // Cannot start twice
        assert!(job.start(3000).is_err());
    }

    #[test]
    fn test_fail_captures_error() {
        let mut job = RenderJob::new("job-3", 1000, "out.mp4", descriptor());
        job.fail(2000, "backend exploded");
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("backend exploded"));
        assert!(job.status.is_terminal());
    }
}
