use axum::extract::{Path, State};
use axum::Json;
use sitewatch_types::RunComparison;
use uuid::Uuid;

use crate::errors::ApiError;
use crate::state::AppState;

pub async fn compare_scans(
    State(state): State<AppState>,
    Path((base, other)): Path<(Uuid, Uuid)>,
) -> Result<Json<RunComparison>, ApiError> {
    let comparison = state.compare.compare(base, other).await?;
    Ok(Json(comparison))
}
