use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{ReelError, Result};
use crate::pipeline::job::Job;

/// In-memory job table
///
/// Every mutation is a single closure under the write lock, so a check and
/// the change it guards cannot interleave with another caller.
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<String, Job>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    // a panic while holding the lock leaves the map itself intact
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Job>> {
        self.jobs.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Job>> {
        self.jobs.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert(&self, job: Job) {
        self.write().insert(job.id.clone(), job);
    }

    pub fn get(&self, id: &str) -> Option<Job> {
        self.read().get(id).cloned()
    }

    /// Apply `f` to the job atomically and return its result
    pub fn update<T, F>(&self, id: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Job) -> Result<T>,
    {
        let mut jobs = self.write();
        let job = jobs.get_mut(id).ok_or_else(|| ReelError::NotFound { job_id: id.to_string() })?;
        f(job)
    }

    /// Remove the job if `check` accepts it
    pub fn remove_if<F>(&self, id: &str, check: F) -> Result<Job>
    where
        F: FnOnce(&Job) -> Result<()>,
    {
        let mut jobs = self.write();
        let job = jobs.get(id).ok_or_else(|| ReelError::NotFound { job_id: id.to_string() })?;
        check(job)?;
        jobs.remove(id).ok_or_else(|| ReelError::NotFound { job_id: id.to_string() })
    }

    /// Newest first
    pub fn list(&self, limit: usize) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.read().values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        jobs.truncate(limit);
        jobs
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
