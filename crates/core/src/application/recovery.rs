//! Restart recovery
//!
//! A job persisted as Running belonged to a previous process; its poll loop
//! and backend handle are gone, so it cannot be resumed. It is failed on
//! reload rather than left hanging at a stale progress value.

use crate::domain::JobStatus;
use crate::error::Result;
use crate::port::{JobRepository, TimeProvider};
use tracing::warn;

pub const INTERRUPTED_ERROR: &str = "interrupted by restart";

/// Fail every job persisted as Running. Returns the number updated.
pub async fn fail_interrupted_jobs(
    repo: &dyn JobRepository,
    time: &dyn TimeProvider,
) -> Result<usize> {
    let running = repo.find_by_status(JobStatus::Running).await?;
    let now = time.now_millis();

    let mut count = 0;
    for mut job in running {
        warn!(job_id = %job.id, "failing job interrupted by restart");
        job.fail(now, INTERRUPTED_ERROR);
        repo.update(&job).await?;
        count += 1;
    }
    Ok(count)
}
