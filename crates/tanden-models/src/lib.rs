//! Shared data models for the pose overlay pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Job identifiers used to key progress slots
//! - Progress values, sentinels and poller snapshots

pub mod job;
pub mod progress;

// Re-export common types
pub use job::JobId;
pub use progress::{ProgressSnapshot, ProgressStatus, PROGRESS_COMPLETE, PROGRESS_FAILED, PROGRESS_START};
