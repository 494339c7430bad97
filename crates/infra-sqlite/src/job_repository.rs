// SQLite JobRepository Implementation

use async_trait::async_trait;
use sqlx::SqlitePool;
use varia_core::domain::{Descriptor, JobId, JobStatus, RenderJob};
use varia_core::error::{AppError, Result};
use varia_core::port::JobRepository;

const MAX_CONCURRENT_KEY: &str = "max_concurrent";

// SQLite result codes (https://www.sqlite.org/rescode.html): name the two
// this schema can produce - duplicate primary key on render_jobs/settings,
// and SQLITE_BUSY under write contention
fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            Some("1555") | Some("2067") => AppError::Database(format!(
                "Unique constraint violation: {}",
                db_err.message()
            )),
            Some("5") => AppError::Database(format!(
                "Database locked (SQLITE_BUSY): {}",
                db_err.message()
            )),
            Some(code) => {
                AppError::Database(format!("Database error [{}]: {}", code, db_err.message()))
            }
            None => AppError::Database(format!("Database error: {}", db_err.message())),
        },
        _ => AppError::Database(err.to_string()),
    }
}

pub struct SqliteJobRepository {
    pool: SqlitePool,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn insert(&self, job: &RenderJob) -> Result<()> {
        let descriptor = serde_json::to_string(&job.descriptor)?;

        sqlx::query(
            r#"
            INSERT INTO render_jobs (
                id, name, descriptor, status, progress, external_id,
                created_at, started_at, finished_at, error, artifact_path
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.name)
        .bind(descriptor)
        .bind(job.status.to_string())
        .bind(job.progress as i32)
        .bind(&job.external_id)
        .bind(job.created_at)
        .bind(job.started_at)
        .bind(job.finished_at)
        .bind(&job.error)
        .bind(&job.artifact_path)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn update(&self, job: &RenderJob) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE render_jobs
            SET status = ?, progress = ?, external_id = ?,
                started_at = ?, finished_at = ?, error = ?, artifact_path = ?
            WHERE id = ?
            "#,
        )
        .bind(job.status.to_string())
        .bind(job.progress as i32)
        .bind(&job.external_id)
        .bind(job.started_at)
        .bind(job.finished_at)
        .bind(&job.error)
        .bind(&job.artifact_path)
        .bind(&job.id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn delete(&self, id: &JobId) -> Result<()> {
        sqlx::query("DELETE FROM render_jobs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn find_by_id(&self, id: &JobId) -> Result<Option<RenderJob>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM render_jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(|r| r.into_job()).transpose()
    }

    async fn list_all(&self) -> Result<Vec<RenderJob>> {
        let rows: Vec<JobRow> =
            sqlx::query_as("SELECT * FROM render_jobs ORDER BY created_at ASC, id ASC")
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        rows.into_iter().map(|r| r.into_job()).collect()
    }

    async fn find_by_status(&self, status: JobStatus) -> Result<Vec<RenderJob>> {
        let rows: Vec<JobRow> = sqlx::query_as(
            r#"
            SELECT * FROM render_jobs
            WHERE status = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(status.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(|r| r.into_job()).collect()
    }

    async fn load_max_concurrent(&self) -> Result<Option<usize>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
                .bind(MAX_CONCURRENT_KEY)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        Ok(value.and_then(|v| v.parse().ok()))
    }

    async fn save_max_concurrent(&self, value: usize) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(MAX_CONCURRENT_KEY)
        .bind(value.to_string())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    name: String,
    descriptor: String,
    status: String,
    progress: i32,
    external_id: Option<String>,
    created_at: i64,
    started_at: Option<i64>,
    finished_at: Option<i64>,
    error: Option<String>,
    artifact_path: Option<String>,
}

impl JobRow {
    fn into_job(self) -> Result<RenderJob> {
        let status = match self.status.as_str() {
            "PENDING" => JobStatus::Pending,
            "RUNNING" => JobStatus::Running,
            "COMPLETED" => JobStatus::Completed,
            _ => JobStatus::Failed, // Default fallback
        };

        let descriptor: Descriptor = serde_json::from_str(&self.descriptor)?;

        Ok(RenderJob {
            id: self.id,
            name: self.name,
            descriptor,
            status,
            progress: self.progress.clamp(0, 100) as u8,
            external_id: self.external_id,
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            error: self.error,
            artifact_path: self.artifact_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use varia_core::domain::Template;

    async fn setup_test_db() -> SqlitePool {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    fn descriptor() -> Descriptor {
        Descriptor {
            template: Template {
                id: "tpl".to_string(),
                project: "demo".to_string(),
                platform: Some("landscape".to_string()),
                duration_ms: 5000.0,
                nodes: vec![],
            },
            duration_ms: 5000.0,
            platform: Some("landscape".to_string()),
            output_format: "mp4".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_find_round_trip() {
        let repo = SqliteJobRepository::new(setup_test_db().await);

        let job = RenderJob::new("job-1", 1000, "M-text.mp4", descriptor());
        repo.insert(&job).await.unwrap();

        let found = repo.find_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(found.id, job.id);
        assert_eq!(found.name, "M-text.mp4");
        assert_eq!(found.status, JobStatus::Pending);
        assert_eq!(found.descriptor, job.descriptor);
    }

    #[tokio::test]
    async fn test_duplicate_insert_reports_unique_violation() {
        let repo = SqliteJobRepository::new(setup_test_db().await);

        let job = RenderJob::new("job-1", 1000, "a.mp4", descriptor());
        repo.insert(&job).await.unwrap();

        let err = repo.insert(&job).await.unwrap_err();
        assert!(err.to_string().contains("Unique constraint violation"));
    }

    #[tokio::test]
    async fn test_update_and_find_by_status() {
        let repo = SqliteJobRepository::new(setup_test_db().await);

        let mut job1 = RenderJob::new("job-1", 1000, "a.mp4", descriptor());
        let job2 = RenderJob::new("job-2", 2000, "b.mp4", descriptor());
        repo.insert(&job1).await.unwrap();
        repo.insert(&job2).await.unwrap();

        job1.start(3000).unwrap();
        job1.progress = 42;
        job1.external_id = Some("ext-9".to_string());
        repo.update(&job1).await.unwrap();

        let running = repo.find_by_status(JobStatus::Running).await.unwrap();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].id, "job-1");
        assert_eq!(running[0].progress, 42);
        assert_eq!(running[0].external_id.as_deref(), Some("ext-9"));

        let pending = repo.find_by_status(JobStatus::Pending).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "job-2");
    }

    #[tokio::test]
    async fn test_list_all_preserves_insertion_order() {
        let repo = SqliteJobRepository::new(setup_test_db().await);

        for (i, created_at) in [1000i64, 2000, 3000].iter().enumerate() {
            let job = RenderJob::new(format!("job-{}", i), *created_at, "x.mp4", descriptor());
            repo.insert(&job).await.unwrap();
        }

        let all = repo.list_all().await.unwrap();
        let ids: Vec<&str> = all.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["job-0", "job-1", "job-2"]);
    }

    #[tokio::test]
    async fn test_delete_is_noop_for_unknown_id() {
        let repo = SqliteJobRepository::new(setup_test_db().await);

        let job = RenderJob::new("job-1", 1000, "a.mp4", descriptor());
        repo.insert(&job).await.unwrap();

        repo.delete(&"missing".to_string()).await.unwrap();
        repo.delete(&job.id).await.unwrap();
        assert!(repo.find_by_id(&job.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_max_concurrent_setting_round_trip() {
        let repo = SqliteJobRepository::new(setup_test_db().await);

        assert_eq!(repo.load_max_concurrent().await.unwrap(), None);
        repo.save_max_concurrent(3).await.unwrap();
        assert_eq!(repo.load_max_concurrent().await.unwrap(), Some(3));
        repo.save_max_concurrent(1).await.unwrap();
        assert_eq!(repo.load_max_concurrent().await.unwrap(), Some(1));
    }
}
