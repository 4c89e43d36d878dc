//! Persistence contract for the sitewatch core.
//!
//! The core consumes the [`Storage`] trait and never talks to a database
//! directly. The guarantees it relies on:
//!
//! - `upsert_page` is idempotent on (site id, url) and preserves `first_seen`
//! - snapshot inserts do not deduplicate across scans
//! - `acquire_job_lease` is a CAS from queued to running; at most one
//!   caller wins a given job
//! - deletes cascade site → scans → snapshots, site → pages, site → jobs
//!
//! [`MemoryStorage`] is the in-process reference adapter used by tests and
//! single-node deployments; production adapters live outside the core.

pub mod error;
pub mod memory;
pub mod storage;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStorage;
pub use storage::{JobFilter, JobStatusCounts, Storage};
