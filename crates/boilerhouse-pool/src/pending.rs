//! FIFO queue of pending acquires: a FIFO of waiters woken on release or destroy,
//! with a time-based timeout per waiter rather than a sweeper, since each
//! waiter already holds its own deadline via `tokio::time::timeout_at`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Default)]
pub struct PendingQueue {
    waiters: Mutex<VecDeque<Arc<Notify>>>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the back of the queue; returns the handle to await.
    pub fn enqueue(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.waiters.lock().unwrap().push_back(notify.clone());
        notify
    }

    /// Put a spuriously-woken waiter back at the front — it keeps its
    /// place in line.
    pub fn requeue_front(&self, notify: Arc<Notify>) {
        self.waiters.lock().unwrap().push_front(notify);
    }

    /// Remove a waiter that gave up (timed out) without ever being popped.
    pub fn remove(&self, notify: &Arc<Notify>) {
        let mut w = self.waiters.lock().unwrap();
        if let Some(pos) = w.iter().position(|n| Arc::ptr_eq(n, notify)) {
            w.remove(pos);
        }
    }

    /// Pop and wake the head waiter, if any. Released capacity is handed to
    /// exactly one waiter, strictly FIFO.
    pub fn wake_next(&self) {
        let front = self.waiters.lock().unwrap().pop_front();
        if let Some(notify) = front {
            notify.notify_one();
        }
    }

    pub fn wake_all(&self) {
        let mut w = self.waiters.lock().unwrap();
        for n in w.drain(..) {
            n.notify_one();
        }
    }

    pub fn len(&self) -> usize {
        self.waiters.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
