//! Domain types shared across the Boilerhouse core: the Workload spec, the
//! Pool/PoolContainer/SyncStatus/SyncError/ActivityEvent records, and the
//! closed `BoilerhouseError` taxonomy. No behaviour lives here — every
//! operation on these types lives in the crate that owns the invariant
//! (pool engine, sync coordinator, registry, ...).

pub mod activity;
pub mod error;
pub mod pool;
pub mod sync;
pub mod workload;

pub use activity::{ActivityEvent, ActivityEventType, ActivityFilter, NewActivityEvent};
pub use error::{BoilerhouseError, Result};
pub use pool::{ContainerStatus, HostPaths, Pool, PoolContainer};
pub use sync::{SyncError, SyncFailureClass, SyncResult, SyncState, SyncStatus};
pub use workload::{
    Deploy, DeployResources, HealthCheck, Hook, HookErrorPolicy, Hooks, MemoryBytes,
    PoolDefaults, ResourceLimits, SecurityPosture, Sink, SyncConfig, SyncDirection, SyncMapping,
    SyncMode, SyncPolicy, VolumeMount, Volumes, Workload,
};

pub const BOILERHOUSE_MANAGED_LABEL: &str = "boilerhouse.managed";
pub const BOILERHOUSE_CONTAINER_ID_LABEL: &str = "boilerhouse.container-id";
pub const BOILERHOUSE_POOL_ID_LABEL: &str = "boilerhouse.pool-id";
pub const BOILERHOUSE_WORKLOAD_ID_LABEL: &str = "boilerhouse.workload-id";
