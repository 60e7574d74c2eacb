//! ActivityEvent: the ring-buffered event stream persisted in the store and
//! consumed by the (external) dashboard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityEventType {
    PoolCreated,
    PoolDestroyed,
    ContainerCreated,
    ContainerDestroyed,
    ContainerClaimed,
    ContainerReleased,
    ContainerEvicted,
    SyncStarted,
    SyncSucceeded,
    SyncFailed,
    RecoveryPurged,
}

impl ActivityEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PoolCreated => "pool_created",
            Self::PoolDestroyed => "pool_destroyed",
            Self::ContainerCreated => "container_created",
            Self::ContainerDestroyed => "container_destroyed",
            Self::ContainerClaimed => "container_claimed",
            Self::ContainerReleased => "container_released",
            Self::ContainerEvicted => "container_evicted",
            Self::SyncStarted => "sync_started",
            Self::SyncSucceeded => "sync_succeeded",
            Self::SyncFailed => "sync_failed",
            Self::RecoveryPurged => "recovery_purged",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub id: i64,
    pub event_type: ActivityEventType,
    pub pool_id: Option<String>,
    pub container_id: Option<String>,
    pub tenant_id: Option<String>,
    pub message: String,
    pub metadata: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

/// A not-yet-persisted event, as produced by the components that record
/// activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewActivityEvent {
    pub event_type: ActivityEventType,
    pub pool_id: Option<String>,
    pub container_id: Option<String>,
    pub tenant_id: Option<String>,
    pub message: String,
    pub metadata: Option<Value>,
}

/// Filters accepted by activity log readers.
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub event_type: Option<ActivityEventType>,
    pub tenant_id: Option<String>,
    pub pool_id: Option<String>,
    pub container_id: Option<String>,
}
