//! Per-tenant periodic sync job: one task per
//! tenant, never per mapping, running the upload-side mappings on a
//! monotonic timer.

use std::collections::HashMap;
use std::sync::Mutex;
use tokio::task::JoinHandle;

#[derive(Default)]
pub struct PeriodicJobs {
    handles: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl PeriodicJobs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any existing job for `tenant_id` with `handle`, aborting
    /// the previous one.
    pub fn set(&self, tenant_id: &str, handle: JoinHandle<()>) {
        if let Some(old) = self.handles.lock().unwrap().insert(tenant_id.to_string(), handle) {
            old.abort();
        }
    }

    /// Cancels the job for `tenant_id`, if any. A tick already running is
    /// not interrupted; this only prevents future ticks from firing.
    pub fn cancel(&self, tenant_id: &str) {
        if let Some(handle) = self.handles.lock().unwrap().remove(tenant_id) {
            handle.abort();
        }
    }

    pub fn cancel_all(&self) {
        for (_, handle) in self.handles.lock().unwrap().drain() {
            handle.abort();
        }
    }
}
