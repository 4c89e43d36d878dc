use std::sync::Arc;

use chrono::{DateTime, Utc};
use sitewatch_config::AppConfig;
use sitewatch_storage::{JobStatusCounts, Storage, StorageError};
use sitewatch_types::{Job, JobStatus, JobType};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::dispatcher::{DispatcherConfig, JobDispatcher};
use crate::orchestrator::ScanOrchestrator;
use crate::reaper::{Reaper, ReaperConfig};

/// User-facing job action errors, mapped to HTTP statuses by the API.
#[derive(Error, Debug)]
pub enum JobActionError {
    #[error("job not found: {0}")]
    JobNotFound(Uuid),

    #[error("site not found: {0}")]
    SiteNotFound(Uuid),

    #[error("invalid job state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Constructed-once job system with explicit lifecycle: build, `start`,
/// serve, `stop`. Holds the dispatcher and reaper loops.
pub struct WorkerService {
    storage: Arc<dyn Storage>,
    dispatcher: Arc<JobDispatcher>,
    reaper: Arc<Reaper>,
    handles: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerService {
    pub fn new(storage: Arc<dyn Storage>, config: AppConfig) -> Self {
        let orchestrator = Arc::new(ScanOrchestrator::new(storage.clone(), config.clone()));
        let dispatcher = Arc::new(JobDispatcher::new(
            storage.clone(),
            orchestrator,
            DispatcherConfig {
                poll_interval: config.dispatcher_poll_interval(),
                max_concurrent: config.dispatcher_max_concurrent,
                ..DispatcherConfig::default()
            },
        ));
        let reaper = Arc::new(Reaper::new(
            storage.clone(),
            ReaperConfig {
                interval: config.reaper_interval(),
                stuck_job_hours: config.stuck_job_hours,
                old_job_days: config.old_job_days,
                archive_retention_days: config.archive_retention_days,
            },
        ));

        Self {
            storage,
            dispatcher,
            reaper,
            handles: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    /// Spawn the dispatcher and reaper loops.
    pub async fn start(&self) {
        let mut handles = self.handles.lock().await;
        if !handles.is_empty() {
            warn!("Worker service is already started");
            return;
        }

        let dispatcher = self.dispatcher.clone();
        handles.push(tokio::spawn(dispatcher.run()));
        let reaper = self.reaper.clone();
        handles.push(tokio::spawn(reaper.run()));
        info!("Worker service started");
    }

    /// Stop the loops and wait for them to drain.
    pub async fn stop(&self) {
        self.dispatcher.stop();
        self.reaper.stop();
        let mut handles = self.handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        info!("Worker service stopped");
    }

    pub fn storage(&self) -> Arc<dyn Storage> {
        self.storage.clone()
    }

    /// Validate the site and enqueue a job for it.
    pub async fn enqueue_job(
        &self,
        site_id: Uuid,
        job_type: JobType,
        priority: Option<i32>,
        scheduled_for: Option<DateTime<Utc>>,
    ) -> Result<Job, JobActionError> {
        if self.storage.get_site(site_id).await?.is_none() {
            return Err(JobActionError::SiteNotFound(site_id));
        }

        let mut job = Job::new(site_id, job_type);
        if let Some(priority) = priority {
            job = job.with_priority(priority);
        }
        if let Some(at) = scheduled_for {
            job = job.scheduled(at);
        }
        self.storage.create_job(job.clone()).await?;
        info!(job_id = %job.id, site_id = %site_id, "Job enqueued");
        Ok(job)
    }

    /// Cancel a queued or running job. Running scans observe the new
    /// status at their next batch boundary and finalize cleanly.
    pub async fn cancel_job(&self, job_id: Uuid) -> Result<Job, JobActionError> {
        let mut job = self
            .storage
            .get_job(job_id)
            .await?
            .ok_or(JobActionError::JobNotFound(job_id))?;

        match job.status {
            JobStatus::Queued | JobStatus::Running => {
                job.cancel();
                self.storage.update_job(job.clone()).await?;
                info!(job_id = %job_id, "Job cancelled");
                Ok(job)
            }
            other => Err(JobActionError::InvalidState(format!(
                "cannot cancel a {} job",
                other.as_str()
            ))),
        }
    }

    /// Requeue a failed job, consuming one retry.
    pub async fn retry_job(&self, job_id: Uuid) -> Result<Job, JobActionError> {
        let mut job = self
            .storage
            .get_job(job_id)
            .await?
            .ok_or(JobActionError::JobNotFound(job_id))?;

        if job.status != JobStatus::Failed {
            return Err(JobActionError::InvalidState(format!(
                "cannot retry a {} job",
                job.status.as_str()
            )));
        }
        if job.retry_count >= job.max_retries {
            return Err(JobActionError::InvalidState(format!(
                "retry budget exhausted ({} of {})",
                job.retry_count, job.max_retries
            )));
        }

        job.requeue();
        self.storage.update_job(job.clone()).await?;
        info!(job_id = %job_id, retry_count = job.retry_count, "Job requeued by user");
        Ok(job)
    }

    pub async fn queue_stats(&self) -> Result<JobStatusCounts, StorageError> {
        self.storage.count_jobs_by_status().await
    }
}
