//! HTTP API surface for sitewatch.
//!
//! Thin axum handlers over the worker service, storage and comparison
//! engine held in [`state::AppState`]. Handlers do transport concerns
//! only; job and scan semantics live in the worker crates.

pub mod errors;
pub mod handlers;
pub mod models;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/jobs", post(handlers::jobs::submit_job).get(handlers::jobs::list_jobs))
        .route("/jobs/stats", get(handlers::jobs::job_stats))
        .route("/jobs/:id/cancel", post(handlers::jobs::cancel_job))
        .route("/jobs/:id/retry", post(handlers::jobs::retry_job))
        .route(
            "/scans/:base/compare/:other",
            post(handlers::compare::compare_scans),
        )
        .route("/health", get(handlers::health::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
