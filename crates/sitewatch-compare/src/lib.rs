//! Run comparison engine.
//!
//! Diffs two scans of the same site: the URL union is walked into
//! added / removed / modified / unchanged pages, each modified page gets
//! per-field change records with impact classification, and a summary
//! rolls the whole run up. Scans are immutable, so comparisons are pure
//! functions of their two snapshot sets and are recomputed on demand.

pub mod diff;
pub mod engine;

pub use diff::{compare_snapshots, field_changes_for_added, field_changes_for_removed};
pub use engine::{ComparisonEngine, CompareError};
