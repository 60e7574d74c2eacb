//! Bounded-concurrency scheduler: at most
//! `maxConcurrent` copy operations run at once, and waiters are served
//! strictly FIFO across all tenants and directions. `tokio::sync::Semaphore`
//! already guarantees FIFO wake order on its internal waiter queue, which
//! is exactly this requirement, so the gate is a thin wrapper rather than
//! a hand-rolled queue.

use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};

pub struct ConcurrencyGate {
    semaphore: Semaphore,
}

impl ConcurrencyGate {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Semaphore::new(max_concurrent.max(1)),
        }
    }

    /// Blocks until a slot is free, then holds it until the returned guard
    /// is dropped.
    pub async fn acquire(&self) -> SemaphorePermit<'_> {
        self.semaphore
        .acquire()
        .await
        .expect("gate semaphore is never closed")
    }
}

/// Shared handle, cloned into the periodic-job tasks.
pub type SharedGate = Arc<ConcurrencyGate>;
