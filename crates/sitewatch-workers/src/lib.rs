//! # Sitewatch Workers
//!
//! The job system driving scans end to end:
//!
//! - **Page worker pool**: bounded fetch+extract fan-out with global
//!   token-bucket pacing
//! - **Scan orchestrator**: one job = one scan; discover → fetch+extract →
//!   persist → counters, with progress updates and cancellation points
//!   between batches
//! - **Dispatcher**: polls queued jobs, claims them through the storage
//!   lease CAS, bounds concurrent scans, and is the only writer of retry
//!   transitions
//! - **Reaper**: periodic stuck-job timeout, terminal-job cleanup and
//!   archived-site retention
//! - **Worker service**: constructed-once wiring with explicit start/stop

pub mod dispatcher;
pub mod orchestrator;
pub mod pool;
pub mod reaper;
pub mod service;

pub use dispatcher::{DispatcherConfig, JobDispatcher, JobMessage};
pub use orchestrator::{ScanError, ScanOrchestrator};
pub use pool::{PageResult, PageWorkerPool, PoolConfig};
pub use reaper::{Reaper, ReaperConfig, ReaperStats};
pub use service::{JobActionError, WorkerService};
