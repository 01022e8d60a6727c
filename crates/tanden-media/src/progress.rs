//! Per-frame progress reporting.
//!
//! The pipeline only knows a [`ProgressCallback`]. Whoever runs it decides
//! where values go; [`ProgressTable`] is the in-memory, job-keyed store used by
//! the worker and [`progress_callback_for`] binds one of its slots to a
//! callback.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tanden_models::{JobId, ProgressSnapshot, PROGRESS_COMPLETE, PROGRESS_FAILED, PROGRESS_START};

/// Callback receiving a percentage in `[0, 100]`.
pub type ProgressCallback = Box<dyn Fn(f64) + Send + Sync + 'static>;

/// Turns frame counts into percentages against the header's declared total.
#[derive(Debug, Clone, Copy)]
pub struct ProgressTracker {
    total: u64,
    frames: u64,
}

impl ProgressTracker {
    pub fn new(declared_total: u64) -> Self {
        Self {
            total: declared_total,
            frames: 0,
        }
    }

    /// Count one more frame and return the new percentage.
    pub fn advance(&mut self) -> f64 {
        self.frames += 1;
        self.percent()
    }

    /// Clamped into `[0, 100]`; `0` when no total was declared.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return PROGRESS_START;
        }
        (self.frames as f64 * 100.0 / self.total as f64).clamp(PROGRESS_START, PROGRESS_COMPLETE)
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

/// Destination for job progress values.
pub trait ProgressSink: Send + Sync {
    /// Overwrite the slot for `job_id`.
    fn set(&self, job_id: &JobId, value: f64);
}

/// Shared in-memory progress slots keyed by job.
///
/// Cloning shares the underlying table.
#[derive(Debug, Clone, Default)]
pub struct ProgressTable {
    slots: Arc<RwLock<HashMap<JobId, f64>>>,
}

impl ProgressTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<JobId, f64>> {
        self.slots.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<JobId, f64>> {
        self.slots.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create the slot for a new job at `0`.
    pub fn register(&self, job_id: &JobId) {
        self.write().insert(job_id.clone(), PROGRESS_START);
    }

    pub fn get(&self, job_id: &JobId) -> Option<f64> {
        self.read().get(job_id).copied()
    }

    pub fn snapshot(&self, job_id: &JobId) -> Option<ProgressSnapshot> {
        self.get(job_id).map(ProgressSnapshot::from_value)
    }

    /// Snapshots of every known job, ordered by job id.
    pub fn snapshots(&self) -> Vec<(JobId, ProgressSnapshot)> {
        let mut all: Vec<_> = self
            .read()
            .iter()
            .map(|(id, value)| (id.clone(), ProgressSnapshot::from_value(*value)))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Mark a job as failed.
    pub fn fail(&self, job_id: &JobId) {
        self.set(job_id, PROGRESS_FAILED);
    }

    pub fn remove(&self, job_id: &JobId) -> Option<f64> {
        self.write().remove(job_id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl ProgressSink for ProgressTable {
    fn set(&self, job_id: &JobId, value: f64) {
        self.write().insert(job_id.clone(), value);
    }
}

/// Bind one job's slot in `sink` to a pipeline callback.
pub fn progress_callback_for(sink: Arc<dyn ProgressSink>, job_id: JobId) -> ProgressCallback {
    Box::new(move |value| sink.set(&job_id, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_reaches_complete() {
        let mut tracker = ProgressTracker::new(4);
        let values: Vec<f64> = (0..4).map(|_| tracker.advance()).collect();
        assert_eq!(values, vec![25.0, 50.0, 75.0, 100.0]);
        assert_eq!(tracker.frames(), 4);
    }

    #[test]
    fn test_tracker_clamps_overshoot() {
        let mut tracker = ProgressTracker::new(2);
        tracker.advance();
        tracker.advance();
        assert_eq!(tracker.advance(), 100.0);
    }

    #[test]
    fn test_tracker_without_declared_total() {
        let mut tracker = ProgressTracker::new(0);
        assert_eq!(tracker.advance(), 0.0);
        assert_eq!(tracker.advance(), 0.0);
    }

    #[test]
    fn test_table_register_and_fail() {
        let table = ProgressTable::new();
        let job = JobId::from_string("job-a");

        assert!(table.get(&job).is_none());
        table.register(&job);
        assert_eq!(table.get(&job), Some(0.0));

        table.fail(&job);
        let snapshot = table.snapshot(&job).unwrap();
        assert_eq!(snapshot.progress, -1.0);
        assert!(snapshot.status.is_terminal());

        assert_eq!(table.remove(&job), Some(-1.0));
        assert!(table.is_empty());
    }

    #[test]
    fn test_callback_writes_only_its_slot() {
        let table = ProgressTable::new();
        let a = JobId::from_string("a");
        let b = JobId::from_string("b");
        table.register(&a);
        table.register(&b);

        let sink: Arc<dyn ProgressSink> = Arc::new(table.clone());
        let callback = progress_callback_for(sink, a.clone());
        callback(42.0);

        assert_eq!(table.get(&a), Some(42.0));
        assert_eq!(table.get(&b), Some(0.0));
        assert_eq!(table.snapshots().len(), 2);
    }
}
