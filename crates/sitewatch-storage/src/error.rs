use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by storage adapters.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("site not found: {0}")]
    SiteNotFound(Uuid),

    #[error("scan not found: {0}")]
    ScanNotFound(Uuid),

    #[error("job not found: {0}")]
    JobNotFound(Uuid),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type StorageResult<T> = Result<T, StorageError>;
