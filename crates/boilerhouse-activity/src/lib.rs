//! Activity log: append-only event stream with
//! bounded retention. The store owns the SQL; this crate owns the
//! every-~100-inserts trim trigger and the higher-level reader API the rest
//! of the core programs against.

use anyhow::Result;
use boilerhouse_store::{activity as activity_store, Store};
use boilerhouse_types::{ActivityEvent, ActivityEventType, ActivityFilter, NewActivityEvent};
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::debug;

/// Default cap on retained rows, and the default trim check cadence.
pub const DEFAULT_MAX_EVENTS: u32 = 1_000;
const TRIM_CHECK_EVERY: u32 = 100;

pub struct ActivityLog {
    store: Store,
    max_events: u32,
    inserts_since_trim: AtomicU32,
}

impl ActivityLog {
    pub fn new(store: Store) -> Self {
        Self::with_max_events(store, DEFAULT_MAX_EVENTS)
    }

    pub fn with_max_events(store: Store, max_events: u32) -> Self {
        Self {
            store,
            max_events,
            inserts_since_trim: AtomicU32::new(0),
        }
    }

    /// Appends `entry` and, every `TRIM_CHECK_EVERY` inserts, trims the log
    /// down to `max_events` by id-ordered cutoff.
    pub async fn save(&self, entry: NewActivityEvent) -> Result<i64> {
        let id = activity_store::append_event(self.store.pool(), &entry).await?;
        let count = self.inserts_since_trim.fetch_add(1, Ordering::Relaxed) + 1;
        if count >= TRIM_CHECK_EVERY {
            self.inserts_since_trim.store(0, Ordering::Relaxed);
            let trimmed = activity_store::trim_to(self.store.pool(), self.max_events).await?;
            if trimmed > 0 {
                debug!(trimmed, max_events = self.max_events, "activity log trimmed");
            }
        }
        Ok(id)
    }

    /// Convenience constructor for the common case of a short message with
    /// no structured metadata.
    pub async fn log(
        &self,
        event_type: ActivityEventType,
        pool_id: Option<String>,
        container_id: Option<String>,
        tenant_id: Option<String>,
        message: impl Into<String>) -> Result<i64> {
        self.save(NewActivityEvent {
            event_type,
            pool_id,
            container_id,
            tenant_id,
            message: message.into(),
            metadata: None,
        })
        .await
    }

    pub async fn list(&self, filter: &ActivityFilter, limit: u32, offset: u32) -> Result<Vec<ActivityEvent>> {
        // The store's reader has no offset parameter of its own (it is a
        // single ordered window query); offset is applied here since every
        // caller so far wants small pages near the head of the log.
        let window = activity_store::list_events(self.store.pool(), filter, limit + offset).await?;
        Ok(window.into_iter().skip(offset as usize).collect())
    }

    /// Forces a trim regardless of the insert counter, used by shutdown and
    /// by tests.
    pub async fn trim_now(&self) -> Result<u64> {
        activity_store::trim_to(self.store.pool(), self.max_events).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_assigns_increasing_ids_and_lists_newest_first() {
        let store = Store::open_in_memory().await.unwrap();
        let log = ActivityLog::new(store);

        log.log(ActivityEventType::PoolCreated, Some("pool-1".to_string()), None, None, "created")
        .await
        .unwrap();
        log.log(ActivityEventType::ContainerCreated, Some("pool-1".to_string()), Some("c-1".to_string()), None, "created")
        .await
        .unwrap();

        let events = log.list(&ActivityFilter::default(), 10, 0).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, ActivityEventType::ContainerCreated);
        assert_eq!(events[1].event_type, ActivityEventType::PoolCreated);
    }

    #[tokio::test]
    async fn trims_after_threshold_inserts() {
        let store = Store::open_in_memory().await.unwrap();
        let log = ActivityLog::with_max_events(store, 5);

        for i in 0..TRIM_CHECK_EVERY {
            log.log(ActivityEventType::ContainerClaimed, None, None, Some(format!("t-{i}")), "claimed")
            .await
            .unwrap();
        }

        let events = log.list(&ActivityFilter::default(), 1000, 0).await.unwrap();
        assert_eq!(events.len(), 5);
    }

    #[tokio::test]
    async fn filters_by_tenant() {
        let store = Store::open_in_memory().await.unwrap();
        let log = ActivityLog::new(store);
        log.log(ActivityEventType::ContainerClaimed, None, None, Some("tenant-a".to_string()), "claimed")
        .await
        .unwrap();
        log.log(ActivityEventType::ContainerClaimed, None, None, Some("tenant-b".to_string()), "claimed")
        .await
        .unwrap();

        let filter = ActivityFilter {
            tenant_id: Some("tenant-a".to_string()),
            ..Default::default()
        };
        let events = log.list(&filter, 10, 0).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].tenant_id.as_deref(), Some("tenant-a"));
    }
}
