//! HTTP fetch layer for sitewatch.
//!
//! One GET per call with per-request timeout, configured user-agent and a
//! bounded redirect policy. Transport failures never surface as errors;
//! they become status-0 result records so a scan can keep going (the
//! orchestrator is the only place that turns problems into failures).

pub mod fetch;
pub mod robots;

pub use fetch::{content_hash, FetchConfig, FetchResult, Fetcher};
pub use robots::RobotsManager;
