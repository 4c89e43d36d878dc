use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sitewatch_types::{Job, JobStatus, JobType};
use uuid::Uuid;

/// `POST /jobs` request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobRequest {
    pub site_id: Uuid,
    #[serde(rename = "type", default = "default_job_type")]
    pub job_type: JobType,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
}

fn default_job_type() -> JobType {
    JobType::Scan
}

/// `POST /jobs` response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
}

/// Wire view of a job row.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub id: Uuid,
    pub site_id: Uuid,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub status: JobStatus,
    pub priority: i32,
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub max_retries: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Job> for JobView {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id,
            site_id: job.site_id,
            job_type: job.job_type,
            status: job.status,
            priority: job.priority,
            progress: job.progress,
            created_at: job.created_at,
            scheduled_for: job.scheduled_for,
            started_at: job.started_at,
            completed_at: job.completed_at,
            retry_count: job.retry_count,
            max_retries: job.max_retries,
            error: job.error.clone(),
        }
    }
}

/// `GET /jobs` query parameters.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobListQuery {
    pub status: Option<JobStatus>,
    pub site_id: Option<Uuid>,
    pub limit: Option<usize>,
}

/// `GET /jobs` response body.
#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<JobView>,
    pub total: usize,
}

/// `GET /health` response body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub version: &'static str,
}
