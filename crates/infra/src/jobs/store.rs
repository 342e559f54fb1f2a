//! Job storage implementations.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use statejob_core::{Job, JobId, JobState};

/// Job store abstraction.
///
/// Implementations must be safe for concurrent use: the dispatch loop, handlers
/// and outside callers share one store.
pub trait JobStore: Send + Sync {
    /// Add a new job. Fails if the id is already present.
    fn insert(&self, job: Job) -> Result<(), JobStoreError>;

    /// Get a snapshot of a job.
    fn get(&self, job_id: JobId) -> Result<Job, JobStoreError>;

    /// Overwrite the full record of an existing job.
    fn replace(&self, job: &Job) -> Result<(), JobStoreError>;

    /// Remove a job.
    fn delete(&self, job_id: JobId) -> Result<(), JobStoreError>;

    /// Number of stored jobs.
    fn len(&self) -> Result<usize, JobStoreError>;

    fn is_empty(&self) -> Result<bool, JobStoreError> {
        Ok(self.len()? == 0)
    }

    /// Jobs currently in `state`, oldest first.
    fn list_by_state(&self, state: JobState) -> Result<Vec<Job>, JobStoreError>;
}

impl<S> JobStore for Arc<S>
where
    S: JobStore + ?Sized,
{
    fn insert(&self, job: Job) -> Result<(), JobStoreError> {
        (**self).insert(job)
    }

    fn get(&self, job_id: JobId) -> Result<Job, JobStoreError> {
        (**self).get(job_id)
    }

    fn replace(&self, job: &Job) -> Result<(), JobStoreError> {
        (**self).replace(job)
    }

    fn delete(&self, job_id: JobId) -> Result<(), JobStoreError> {
        (**self).delete(job_id)
    }

    fn len(&self) -> Result<usize, JobStoreError> {
        (**self).len()
    }

    fn list_by_state(&self, state: JobState) -> Result<Vec<Job>, JobStoreError> {
        (**self).list_by_state(state)
    }
}

/// Job store error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
    #[error("storage error: {0}")]
    Storage(String),
}

/// In-memory job store (a map keyed by job id).
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<JobId, Job>>, JobStoreError> {
        self.jobs
            .read()
            .map_err(|_| JobStoreError::Storage("job map lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<JobId, Job>>, JobStoreError> {
        self.jobs
            .write()
            .map_err(|_| JobStoreError::Storage("job map lock poisoned".to_string()))
    }
}

impl JobStore for InMemoryJobStore {
    fn insert(&self, job: Job) -> Result<(), JobStoreError> {
        let mut jobs = self.write()?;
        if jobs.contains_key(&job.id) {
            return Err(JobStoreError::AlreadyExists(job.id));
        }
        jobs.insert(job.id, job);
        Ok(())
    }

    fn get(&self, job_id: JobId) -> Result<Job, JobStoreError> {
        self.read()?
            .get(&job_id)
            .cloned()
            .ok_or(JobStoreError::NotFound(job_id))
    }

    fn replace(&self, job: &Job) -> Result<(), JobStoreError> {
        let mut jobs = self.write()?;
        match jobs.get_mut(&job.id) {
            Some(slot) => {
                *slot = job.clone();
                Ok(())
            }
            None => Err(JobStoreError::NotFound(job.id)),
        }
    }

    fn delete(&self, job_id: JobId) -> Result<(), JobStoreError> {
        self.write()?
            .remove(&job_id)
            .map(|_| ())
            .ok_or(JobStoreError::NotFound(job_id))
    }

    fn len(&self) -> Result<usize, JobStoreError> {
        Ok(self.read()?.len())
    }

    fn list_by_state(&self, state: JobState) -> Result<Vec<Job>, JobStoreError> {
        let jobs = self.read()?;
        let mut result: Vec<_> = jobs.values().filter(|j| j.state == state).cloned().collect();

        // Ids are time-sortable, so this is creation order.
        result.sort_by_key(|j| j.id);
        Ok(result)
    }
}
