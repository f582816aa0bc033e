//! Registry of tracked jobs.
//!
//! Each job's [`JobRecord`] lives in a `watch` channel: the worker publishes
//! whole snapshots through a [`JobHandle`], pollers read the latest one
//! without waiting on the writer, and subscribers see every change in order.
//! The map lock only guards membership and is never held across an await.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::watch;
use tracing::{debug, info};
use vscan_models::{JobId, JobRecord, JobTransition, VideoUpload};

use crate::error::{QueueError, QueueResult};

struct JobEntry {
    upload: VideoUpload,
    record: Arc<watch::Sender<JobRecord>>,
    cancel: Arc<watch::Sender<bool>>,
}

/// All jobs known to this process.
#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, JobEntry>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new upload. The record starts in `uploaded`.
    pub fn register(&self, upload: VideoUpload) -> QueueResult<JobHandle> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        if jobs.contains_key(&upload.video_id) {
            return Err(QueueError::DuplicateJob(upload.video_id.to_string()));
        }

        let record = JobRecord::new(
            upload.video_id.clone(),
            upload.original_filename.clone(),
            upload.video_name.clone(),
        );
        let (record_tx, _) = watch::channel(record);
        let (cancel_tx, _) = watch::channel(false);
        let entry = JobEntry {
            upload,
            record: Arc::new(record_tx),
            cancel: Arc::new(cancel_tx),
        };
        let handle = JobHandle::from_entry(&entry);

        debug!(job_id = %entry.upload.video_id, "Job registered");
        jobs.insert(entry.upload.video_id.clone(), entry);
        Ok(handle)
    }

    /// Writer handle for a tracked job.
    pub fn handle(&self, id: &JobId) -> QueueResult<JobHandle> {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        jobs.get(id)
            .map(JobHandle::from_entry)
            .ok_or_else(|| QueueError::job_not_found(id.as_str()))
    }

    /// Latest record for a job.
    pub fn snapshot(&self, id: &JobId) -> Option<JobRecord> {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        jobs.get(id).map(|e| e.record.borrow().clone())
    }

    /// Receiver that observes every published record for a job.
    pub fn subscribe(&self, id: &JobId) -> Option<watch::Receiver<JobRecord>> {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        jobs.get(id).map(|e| e.record.subscribe())
    }

    /// Upload metadata for a job.
    pub fn upload(&self, id: &JobId) -> Option<VideoUpload> {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        jobs.get(id).map(|e| e.upload.clone())
    }

    /// Signal cancellation. Returns `false` for unknown jobs.
    pub fn cancel(&self, id: &JobId) -> bool {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        match jobs.get(id) {
            Some(entry) => {
                entry.cancel.send_replace(true);
                true
            }
            None => false,
        }
    }

    /// Cancel and forget a job, returning its upload metadata.
    pub fn remove(&self, id: &JobId) -> Option<VideoUpload> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let entry = jobs.remove(id)?;
        entry.cancel.send_replace(true);
        info!(job_id = %id, "Job removed from registry");
        Some(entry.upload)
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Write access to one job's record.
///
/// Stays usable after the job is removed from the registry; updates are
/// then simply unobserved.
#[derive(Clone)]
pub struct JobHandle {
    id: JobId,
    record: Arc<watch::Sender<JobRecord>>,
    cancel: watch::Receiver<bool>,
}

impl JobHandle {
    fn from_entry(entry: &JobEntry) -> Self {
        Self {
            id: entry.upload.video_id.clone(),
            record: Arc::clone(&entry.record),
            cancel: entry.cancel.subscribe(),
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// Apply a state machine step and publish the new record.
    ///
    /// A rejected step leaves the published record unchanged.
    pub fn apply(&self, transition: JobTransition) -> QueueResult<JobRecord> {
        let mut rejected = None;
        self.record.send_if_modified(|record| match record.apply(transition) {
            Ok(()) => true,
            Err(e) => {
                rejected = Some(e);
                false
            }
        });

        match rejected {
            Some(e) => Err(e.into()),
            None => Ok(self.record.borrow().clone()),
        }
    }

    pub fn snapshot(&self) -> JobRecord {
        self.record.borrow().clone()
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }
}
