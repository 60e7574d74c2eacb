//! Shared runtime state for boilerhouse-daemon.
//!
//! The daemon's HTTP surface is intentionally narrow. What it does own is the
//! in-process pool registry, activity log, and the event bus that turns
//! activity-log writes into SSE.

use std::sync::{atomic::AtomicI64, Arc};
use std::time::Instant;

use boilerhouse_activity::ActivityLog;
use boilerhouse_registry::PoolRegistry;
use boilerhouse_store::Store;
use boilerhouse_testkit::FakeRuntime;
use boilerhouse_types::{ActivityEvent, ActivityEventType, NewActivityEvent};
use tokio::sync::broadcast;
use tracing::warn;

/// Static build metadata included in the status response.
#[derive(Clone, Debug, serde::Serialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

/// Cloneable (Arc) handle shared across all Axum handlers.
pub struct AppState {
    pub store: Store,
    pub registry: Arc<PoolRegistry<FakeRuntime>>,
    pub activity: Arc<ActivityLog>,
    /// Broadcast bus for SSE `/v1/events`; every persisted activity event is
    /// also published here.
    pub bus: broadcast::Sender<ActivityEvent>,
    pub build: BuildInfo,
    started_at: Instant,
    /// Last assigned activity-event id, surfaced in `/v1/status` so a
    /// dashboard can tell whether it missed events between polls.
    last_event_id: AtomicI64,
}

impl AppState {
    pub fn new(
        store: Store,
        registry: Arc<PoolRegistry<FakeRuntime>>,
        activity: Arc<ActivityLog>) -> Arc<Self> {
        let (bus, _rx) = broadcast::channel::<ActivityEvent>(1024);
        Arc::new(Self {
            store,
            registry,
            activity,
            bus,
            build: BuildInfo {
                service: "boilerhouse-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            started_at: Instant::now(),
            last_event_id: AtomicI64::new(0),
        })
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn last_event_id(&self) -> i64 {
        self.last_event_id.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Persists `entry` to the activity log and republishes it on the SSE
    /// bus. Used by recovery and (eventually) any other in-process
    /// component that needs to surface a noteworthy event; a full bus with
    /// no subscribers just drops the send, which is fine for SSE.
    pub async fn publish(
        &self,
        event_type: ActivityEventType,
        pool_id: Option<String>,
        container_id: Option<String>,
        tenant_id: Option<String>,
        message: impl Into<String>) {
        let message = message.into();
        let id = match self
        .activity
        .save(NewActivityEvent {
            event_type: event_type.clone(),
            pool_id: pool_id.clone(),
            container_id: container_id.clone(),
            tenant_id: tenant_id.clone(),
            message: message.clone(),
            metadata: None,
        })
        .await
        {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "failed to persist activity event");
                return;
            }
        };
        self.last_event_id.store(id, std::sync::atomic::Ordering::Relaxed);
        let event = ActivityEvent {
            id,
            event_type,
            pool_id,
            container_id,
            tenant_id,
            message,
            metadata: None,
            timestamp: chrono::Utc::now(),
        };
        let _ = self.bus.send(event);
    }
}
