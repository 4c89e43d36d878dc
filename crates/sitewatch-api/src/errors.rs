use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use sitewatch_compare::CompareError;
use sitewatch_storage::StorageError;
use sitewatch_workers::JobActionError;
use thiserror::Error;

/// API error surface; each variant maps to one HTTP status.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.kind(),
            "message": self.to_string(),
        }));
        (self.status(), body).into_response()
    }
}

impl From<JobActionError> for ApiError {
    fn from(e: JobActionError) -> Self {
        match e {
            JobActionError::JobNotFound(_) | JobActionError::SiteNotFound(_) => {
                ApiError::NotFound(e.to_string())
            }
            JobActionError::InvalidState(_) => ApiError::Conflict(e.to_string()),
            JobActionError::Storage(inner) => ApiError::Internal(inner.to_string()),
        }
    }
}

impl From<CompareError> for ApiError {
    fn from(e: CompareError) -> Self {
        match e {
            CompareError::ScanNotFound(_) => ApiError::NotFound(e.to_string()),
            CompareError::SiteMismatch(_, _) => ApiError::BadRequest(e.to_string()),
            CompareError::Storage(inner) => ApiError::Internal(inner.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        ApiError::Internal(e.to_string())
    }
}
