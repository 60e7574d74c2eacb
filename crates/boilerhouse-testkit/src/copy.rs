//! Deterministic in-memory `CopyExecutor`. Records every job dispatched and can be scripted to
//! fail a fixed number of times with a given message before succeeding,
//! which is what the sync-error-classification scenarios in specification
//! §8 need.

use async_trait::async_trait;
use boilerhouse_copy_api::{CopyExecutor, CopyJob};
use boilerhouse_types::SyncResult;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub struct FakeCopyExecutor {
    jobs: Mutex<Vec<CopyJob>>,
    calls: AtomicUsize,
    concurrent: AtomicUsize,
    max_concurrent_seen: AtomicUsize,
    fail_times: usize,
    fail_message: String,
}

impl Default for FakeCopyExecutor {
    fn default() -> Self {
        Self::always_ok()
    }
}

impl FakeCopyExecutor {
    pub fn always_ok() -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            concurrent: AtomicUsize::new(0),
            max_concurrent_seen: AtomicUsize::new(0),
            fail_times: 0,
            fail_message: String::new(),
        }
    }

    pub fn failing(times: usize, message: impl Into<String>) -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            concurrent: AtomicUsize::new(0),
            max_concurrent_seen: AtomicUsize::new(0),
            fail_times: times,
            fail_message: message.into(),
        }
    }

    pub fn jobs(&self) -> Vec<CopyJob> {
        self.jobs.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_concurrent_seen(&self) -> usize {
        self.max_concurrent_seen.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CopyExecutor for FakeCopyExecutor {
    async fn run(&self, job: &CopyJob) -> SyncResult {
        self.jobs.lock().unwrap().push(job.clone());
        let concurrent = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent_seen.fetch_max(concurrent, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        self.concurrent.fetch_sub(1, Ordering::SeqCst);

        let call_idx = self.calls.fetch_add(1, Ordering::SeqCst);
        if call_idx < self.fail_times {
            SyncResult::failed(vec![self.fail_message.clone()], 10)
        } else {
            SyncResult::ok(1024, 4, 10)
        }
    }
}
