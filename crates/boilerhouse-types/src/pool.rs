//! Pool and PoolContainer: the records the pool engine (C5) and registry
//! (C6) mutate and the store (C1) persists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-pool sizing and timeout configuration, owned by the pool registry
/// and persisted in the `pools` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    pub pool_id: String,
    pub workload_id: String,
    pub min_idle: u32,
    pub max_size: u32,
    pub idle_timeout_ms: i64,
    pub eviction_interval_ms: i64,
    pub acquire_timeout_ms: i64,
    pub networks: Vec<String>,
    pub file_idle_ttl_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Pool {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms.max(0) as u64)
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_millis(self.eviction_interval_ms.max(0) as u64)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms.max(0) as u64)
    }

    pub fn file_idle_ttl(&self) -> Option<Duration> {
        self.file_idle_ttl_ms.map(|ms| Duration::from_millis(ms.max(0) as u64))
    }
}

/// A container's lifecycle position within its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Idle,
    Claimed,
    Stopping,
}

impl ContainerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Claimed => "claimed",
            Self::Stopping => "stopping",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "claimed" => Some(Self::Claimed),
            "stopping" => Some(Self::Stopping),
            _ => None,
        }
    }
}

/// Host-side filesystem paths allocated for a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostPaths {
    pub socket_path: String,
    pub state_dir: String,
    pub secrets_dir: String,
}

/// A single pool-managed container instance.
///
/// Created by the container manager (C4), mutated by the pool engine (C5),
/// removed by the pool engine on destroy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolContainer {
    pub container_id: String,
    pub pool_id: String,
    pub status: ContainerStatus,
    pub tenant_id: Option<String>,
    pub last_tenant_id: Option<String>,
    pub last_activity: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub idle_expires_at: Option<DateTime<Utc>>,
    pub host_paths: HostPaths,
    pub created_at: DateTime<Utc>,
}

impl PoolContainer {
    pub fn is_idle(&self) -> bool {
        self.status == ContainerStatus::Idle
    }

    pub fn is_claimed(&self) -> bool {
        self.status == ContainerStatus::Claimed
    }

    /// Whether this idle container still falls within the affinity window
    /// for `tenant_id`: it was last used
    /// by that tenant and has not yet passed `idle_expires_at`.
    pub fn has_affinity_for(&self, tenant_id: &str, now: DateTime<Utc>) -> bool {
        self.is_idle()
        && self.last_tenant_id.as_deref() == Some(tenant_id)
        && self.idle_expires_at.map(|t| now < t).unwrap_or(false)
    }
}
