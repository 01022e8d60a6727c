//! Pose overlay job runner.
//!
//! This crate provides:
//! - Input validation and job submission
//! - Bounded background execution of `VideoPipeline` jobs
//! - Job-keyed progress slots with a failure sentinel
//! - Structured job logging

pub mod config;
pub mod error;
pub mod logging;
pub mod runner;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::JobLogger;
pub use runner::{validate_input, JobHandle, JobHandler, JobRunner, PoseJobHandler};
