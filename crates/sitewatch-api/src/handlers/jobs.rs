use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use sitewatch_storage::{JobFilter, JobStatusCounts};
use uuid::Uuid;

use crate::errors::ApiError;
use crate::models::{JobListQuery, JobListResponse, JobView, SubmitJobRequest, SubmitJobResponse};
use crate::state::AppState;

/// Jobs listed per request at most.
const LIST_CAP: usize = 500;

pub async fn submit_job(
    State(state): State<AppState>,
    Json(request): Json<SubmitJobRequest>,
) -> Result<(StatusCode, Json<SubmitJobResponse>), ApiError> {
    let job = state
        .worker_service
        .enqueue_job(
            request.site_id,
            request.job_type,
            request.priority,
            request.scheduled_for,
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(SubmitJobResponse {
            job_id: job.id,
            status: job.status,
        }),
    ))
}

pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<JobListQuery>,
) -> Result<Json<JobListResponse>, ApiError> {
    let filter = JobFilter {
        status: query.status,
        site_id: query.site_id,
        limit: query.limit.unwrap_or(LIST_CAP).min(LIST_CAP),
    };
    let jobs = state.storage.list_jobs(filter).await?;
    let views: Vec<JobView> = jobs.iter().map(JobView::from).collect();
    Ok(Json(JobListResponse {
        total: views.len(),
        jobs: views,
    }))
}

pub async fn job_stats(
    State(state): State<AppState>,
) -> Result<Json<JobStatusCounts>, ApiError> {
    let counts = state.worker_service.queue_stats().await?;
    Ok(Json(counts))
}

pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobView>, ApiError> {
    let job = state.worker_service.cancel_job(job_id).await?;
    Ok(Json(JobView::from(&job)))
}

pub async fn retry_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobView>, ApiError> {
    let job = state.worker_service.retry_job(job_id).await?;
    Ok(Json(JobView::from(&job)))
}
