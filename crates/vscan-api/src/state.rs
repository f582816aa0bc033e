//! Application state.

use std::sync::Arc;

use vscan_queue::{JobQueue, JobRegistry};
use vscan_storage::FsResultStore;

use crate::config::ApiConfig;

/// Shared application state.
///
/// The registry is the same instance the worker publishes into, so status
/// reads always see the worker's latest snapshot.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub registry: Arc<JobRegistry>,
    pub queue: JobQueue,
    pub store: FsResultStore,
}

impl AppState {
    pub fn new(
        config: ApiConfig,
        registry: Arc<JobRegistry>,
        queue: JobQueue,
        store: FsResultStore,
    ) -> Self {
        Self {
            config,
            registry,
            queue,
            store,
        }
    }
}
