use std::sync::Arc;

use sitewatch_compare::ComparisonEngine;
use sitewatch_storage::Storage;
use sitewatch_workers::WorkerService;

/// Shared application state behind every handler.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub worker_service: Arc<WorkerService>,
    pub compare: Arc<ComparisonEngine>,
}

impl AppState {
    pub fn new(storage: Arc<dyn Storage>, worker_service: Arc<WorkerService>) -> Self {
        let compare = Arc::new(ComparisonEngine::new(storage.clone()));
        Self {
            storage,
            worker_service,
            compare,
        }
    }
}
