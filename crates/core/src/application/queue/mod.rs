//! Render Job Queue - bounded-concurrency scheduler over the render backend
//!
//! Per-job state machine: Pending -> Running -> {Completed | Failed}. A single
//! boolean dispatch lock serializes scheduling passes so two triggers never
//! promote the same job. Jobs start in FIFO order; completion order depends on
//! backend timing. Cancellation is cooperative: removing a job stops future
//! polls (the runner re-reads job state at the top of each tick) and
//! best-effort notifies the backend; in-flight network calls are not
//! interrupted. Job failures are captured on the job record, never thrown, so
//! one job cannot abort the rest - the queue always advances.

pub mod constants;

use crate::domain::{Descriptor, JobId, JobStatus, RenderJob};
use crate::error::Result;
use crate::port::{ArtifactStore, IdProvider, JobRepository, RenderBackend, RenderState, TimeProvider};
use constants::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Queue tuning knobs
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub poll_interval: Duration,
    pub max_poll_attempts: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
        }
    }
}

struct QueueState {
    jobs: Vec<RenderJob>,
    max_concurrent: usize,
}

struct QueueInner {
    repo: Arc<dyn JobRepository>,
    backend: Arc<dyn RenderBackend>,
    artifacts: Arc<dyn ArtifactStore>,
    time: Arc<dyn TimeProvider>,
    ids: Arc<dyn IdProvider>,
    config: QueueConfig,
    state: Mutex<QueueState>,
    // Single global dispatch lock: two scheduling passes must never both
    // promote the queue head
    dispatching: AtomicBool,
}

/// Render job queue. Cheap to clone; all clones share one job list.
#[derive(Clone)]
pub struct RenderQueue {
    inner: Arc<QueueInner>,
}

impl RenderQueue {
    pub fn new(
        repo: Arc<dyn JobRepository>,
        backend: Arc<dyn RenderBackend>,
        artifacts: Arc<dyn ArtifactStore>,
        time: Arc<dyn TimeProvider>,
        ids: Arc<dyn IdProvider>,
        config: QueueConfig,
    ) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                repo,
                backend,
                artifacts,
                time,
                ids,
                config,
                state: Mutex::new(QueueState {
                    jobs: Vec::new(),
                    max_concurrent: DEFAULT_MAX_CONCURRENT,
                }),
                dispatching: AtomicBool::new(false),
            }),
        }
    }

    /// Reload persisted queue state.
    ///
    /// Jobs persisted as Running have no resumable network handle and are
    /// failed before the queue serves its first snapshot. The persisted
    /// concurrency setting is restored as well. Does not auto-dispatch:
    /// reloaded Pending jobs start on the next trigger.
    pub async fn load(
        repo: Arc<dyn JobRepository>,
        backend: Arc<dyn RenderBackend>,
        artifacts: Arc<dyn ArtifactStore>,
        time: Arc<dyn TimeProvider>,
        ids: Arc<dyn IdProvider>,
        config: QueueConfig,
    ) -> Result<Self> {
        let recovered =
            super::recovery::fail_interrupted_jobs(repo.as_ref(), time.as_ref()).await?;
        if recovered > 0 {
            info!(recovered = recovered, "interrupted jobs failed on reload");
        }

        let jobs = repo.list_all().await?;
        let max_concurrent = repo
            .load_max_concurrent()
            .await?
            .unwrap_or(DEFAULT_MAX_CONCURRENT)
            .max(1);

        let queue = Self::new(repo, backend, artifacts, time, ids, config);
        {
            let mut st = queue.inner.state.lock().unwrap();
            st.jobs = jobs;
            st.max_concurrent = max_concurrent;
        }
        Ok(queue)
    }

    /// Append a pending job and trigger a scheduling pass
    pub async fn enqueue(&self, name: impl Into<String>, descriptor: Descriptor) -> Result<JobId> {
        let id = self.inner.ids.generate_id();
        let job = RenderJob::new(id.clone(), self.inner.time.now_millis(), name, descriptor);

        // Persist before publishing: a rejected insert must not leave a job
        // the dispatcher can see but the database never recorded
        self.inner.repo.insert(&job).await?;
        info!(job_id = %id, name = %job.name, "job enqueued");
        self.inner.state.lock().unwrap().jobs.push(job);

        self.inner.clone().dispatch().await;
        Ok(id)
    }

    /// Read-only snapshot of the job list
    pub fn jobs(&self) -> Vec<RenderJob> {
        self.inner.state.lock().unwrap().jobs.clone()
    }

    /// Remove a job at any state.
    ///
    /// A Running job gets a best-effort backend cancel before local removal;
    /// a Pending job makes no backend call. Returns false when the id is
    /// unknown.
    pub async fn remove_job(&self, id: &JobId) -> Result<bool> {
        let Some(job) = self.inner.snapshot_job(id) else {
            return Ok(false);
        };

        // Cancel before removal so the backend stops work for a job that is
        // about to disappear locally
        if job.status == JobStatus::Running {
            if let Some(external_id) = &job.external_id {
                if let Err(e) = self.inner.backend.cancel(external_id).await {
                    warn!(job_id = %id, error = %e, "backend cancel failed, removing anyway");
                }
            }
        }

        self.inner.state.lock().unwrap().jobs.retain(|j| &j.id != id);
        self.inner.repo.delete(id).await?;
        info!(job_id = %id, status = %job.status, "job removed");

        // Removing a running job frees capacity
        self.inner.clone().dispatch().await;
        Ok(true)
    }

    /// Drop all Completed jobs, leaving the rest untouched
    pub async fn clear_completed(&self) -> Result<usize> {
        let cleared: Vec<JobId> = {
            let mut st = self.inner.state.lock().unwrap();
            let ids = st
                .jobs
                .iter()
                .filter(|j| j.status == JobStatus::Completed)
                .map(|j| j.id.clone())
                .collect::<Vec<_>>();
            st.jobs.retain(|j| j.status != JobStatus::Completed);
            ids
        };
        for id in &cleared {
            self.inner.repo.delete(id).await?;
        }
        Ok(cleared.len())
    }

    /// Change the concurrency ceiling (clamped to >= 1), persist it, and
    /// trigger a scheduling pass so freed capacity is used immediately
    pub async fn set_concurrency(&self, max_concurrent: usize) -> Result<()> {
        let value = max_concurrent.max(1);
        self.inner.state.lock().unwrap().max_concurrent = value;
        self.inner.repo.save_max_concurrent(value).await?;
        info!(max_concurrent = value, "concurrency updated");
        self.inner.clone().dispatch().await;
        Ok(())
    }

    /// Current concurrency ceiling
    pub fn concurrency(&self) -> usize {
        self.inner.state.lock().unwrap().max_concurrent
    }

    /// Trigger a scheduling pass (used after load to start reloaded jobs)
    pub async fn dispatch(&self) {
        self.inner.clone().dispatch().await;
    }
}

impl QueueInner {
    /// Scheduling pass: promote FIFO pending jobs while capacity remains.
    ///
    /// The AtomicBool gate admits one pass at a time; concurrent triggers
    /// return immediately and rely on the in-flight pass re-reading state on
    /// every iteration and re-checking for promotable work before it ends.
    async fn dispatch(self: Arc<Self>) {
        if self.dispatching.swap(true, Ordering::SeqCst) {
            return;
        }

        loop {
            loop {
                let promoted = {
                    let mut st = self.state.lock().unwrap();
                    let running = st
                        .jobs
                        .iter()
                        .filter(|j| j.status == JobStatus::Running)
                        .count();
                    if running >= st.max_concurrent {
                        None
                    } else {
                        let now = self.time.now_millis();
                        st.jobs
                            .iter_mut()
                            .find(|j| j.status == JobStatus::Pending)
                            .and_then(|job| job.start(now).ok().map(|_| job.clone()))
                    }
                };

                let Some(job) = promoted else { break };

                if let Err(e) = self.repo.update(&job).await {
                    error!(job_id = %job.id, error = %e, "failed to persist job start");
                }
                info!(job_id = %job.id, name = %job.name, "job started");

                let inner = Arc::clone(&self);
                tokio::spawn(async move {
                    inner.run_job(job.id.clone()).await;
                });
            }

            self.dispatching.store(false, Ordering::SeqCst);

            // A trigger that arrived while the gate was held returned without
            // scheduling anything. Re-take the gate while promotable work
            // remains so that trigger is not lost.
            if !self.has_promotable() {
                break;
            }
            if self.dispatching.swap(true, Ordering::SeqCst) {
                break; // another pass took over
            }
        }
    }

    fn has_promotable(&self) -> bool {
        let st = self.state.lock().unwrap();
        let running = st
            .jobs
            .iter()
            .filter(|j| j.status == JobStatus::Running)
            .count();
        running < st.max_concurrent && st.jobs.iter().any(|j| j.status == JobStatus::Pending)
    }

    /// Queue another scheduling pass on the runtime instead of awaiting it.
    /// The runner calls this on its terminal paths; awaiting dispatch there
    /// would nest the dispatch future inside the runner future it spawns.
    fn schedule_dispatch(self: Arc<Self>) {
        tokio::spawn(async move {
            self.dispatch().await;
        });
    }

    /// Drive one running job to a terminal state: submit, poll within the
    /// attempt budget, fetch and persist the artifact
    async fn run_job(self: Arc<Self>, job_id: JobId) {
        let Some(job) = self.snapshot_job(&job_id) else {
            return; // removed before the runner got scheduled
        };

        // Submission failure is an immediate Failed, surfaced verbatim
        let external_id = match self.backend.submit(&job.descriptor).await {
            Ok(id) => id,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "submission rejected");
                self.fail_job(&job_id, e.to_string()).await;
                self.clone().schedule_dispatch();
                return;
            }
        };

        // The job may have been removed while submit was in flight
        let still_present = self
            .update_job(&job_id, |j| j.external_id = Some(external_id.clone()))
            .await;
        if !still_present {
            let _ = self.backend.cancel(&external_id).await;
            return;
        }

        debug!(job_id = %job_id, external_id = %external_id, "render submitted, polling");

        for attempt in 1..=self.config.max_poll_attempts {
            sleep(self.config.poll_interval).await;

            // Cooperative cancellation: re-read current state each tick and
            // stop polling silently when the job disappeared locally
            if self.snapshot_job(&job_id).is_none() {
                debug!(job_id = %job_id, "job removed mid-poll, stopping");
                return;
            }

            let status = match self.backend.status(&external_id).await {
                Ok(status) => status,
                Err(e) => {
                    // Transient poll failures are tolerated within the budget
                    debug!(job_id = %job_id, attempt = attempt, error = %e, "poll failed, retrying");
                    continue;
                }
            };

            match status.state {
                RenderState::Completed => {
                    self.finish_job(&job_id, &external_id, &job.name).await;
                    self.clone().schedule_dispatch();
                    return;
                }
                RenderState::Failed => {
                    let message = status
                        .error
                        .unwrap_or_else(|| "render failed without a backend message".to_string());
                    self.fail_job(&job_id, message).await;
                    self.clone().schedule_dispatch();
                    return;
                }
                RenderState::Pending | RenderState::Running => {
                    let estimate = ((attempt * 100 / self.config.max_poll_attempts) as u8)
                        .min(PROGRESS_ESTIMATE_CAP);
                    let progress = status
                        .progress
                        .unwrap_or(estimate)
                        .min(PROGRESS_RUNNING_CAP);
                    // Monotonic: estimates never walk progress backwards
                    self.update_job(&job_id, |j| j.progress = j.progress.max(progress))
                        .await;
                }
            }
        }

        self.fail_job(
            &job_id,
            format!(
                "render timed out after {} polls",
                self.config.max_poll_attempts
            ),
        )
        .await;
        self.clone().schedule_dispatch();
    }

    /// Fetch, validate, and persist the artifact of a completed render
    async fn finish_job(&self, job_id: &JobId, external_id: &str, name: &str) {
        let bytes = match self.backend.fetch(&external_id.to_string()).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.fail_job(job_id, e.to_string()).await;
                return;
            }
        };

        if bytes.is_empty() {
            self.fail_job(job_id, "artifact is empty or corrupt").await;
            return;
        }

        match self.artifacts.save(job_id, name, &bytes).await {
            Ok(path) => {
                let now = self.time.now_millis();
                self.update_job(job_id, |j| {
                    if let Err(e) = j.complete(now, path.clone()) {
                        // Completion racing a concurrent mutation; record it
                        j.fail(now, e.to_string());
                    }
                })
                .await;
                info!(job_id = %job_id, artifact = %path, "job completed");
            }
            Err(e) => {
                self.fail_job(job_id, format!("artifact save failed: {}", e))
                    .await;
            }
        }
    }

    async fn fail_job(&self, job_id: &JobId, message: impl Into<String>) {
        let message = message.into();
        let now = self.time.now_millis();
        let updated = self
            .update_job(job_id, |j| j.fail(now, message.clone()))
            .await;
        if updated {
            warn!(job_id = %job_id, error = %message, "job failed");
        }
    }

    /// The single mutation path for the shared job list: lock, mutate, clone,
    /// persist. No caller holds a job snapshot across a suspension point.
    async fn update_job(&self, job_id: &JobId, f: impl FnOnce(&mut RenderJob)) -> bool {
        let updated = {
            let mut st = self.state.lock().unwrap();
            match st.jobs.iter_mut().find(|j| &j.id == job_id) {
                Some(job) => {
                    f(job);
                    Some(job.clone())
                }
                None => None,
            }
        };
        match updated {
            Some(job) => {
                if let Err(e) = self.repo.update(&job).await {
                    error!(job_id = %job_id, error = %e, "failed to persist job update");
                }
                true
            }
            None => false,
        }
    }

    fn snapshot_job(&self, job_id: &JobId) -> Option<RenderJob> {
        self.state
            .lock()
            .unwrap()
            .jobs
            .iter()
            .find(|j| &j.id == job_id)
            .cloned()
    }
}
