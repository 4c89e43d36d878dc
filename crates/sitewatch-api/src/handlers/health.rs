use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use tracing::warn;

use crate::models::HealthResponse;
use crate::state::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Liveness plus a storage probe; a failing probe is a 500 so load
/// balancers rotate the instance out.
pub async fn health(
    State(state): State<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    match state.storage.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                timestamp: Utc::now(),
                version: VERSION,
            }),
        ),
        Err(e) => {
            warn!(error = %e, "Storage probe failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(HealthResponse {
                    status: "unhealthy",
                    timestamp: Utc::now(),
                    version: VERSION,
                }),
            )
        }
    }
}
