//! The closed set of domain errors surfaced at component boundaries.
//!
//! A fixed, closed set of error kinds represented as a tagged variant
//! rather than scattered ad-hoc string errors. Internal plumbing (IO,
//! YAML parsing, migrations) still uses `anyhow`; this type is for errors
//! that cross an operation boundary (pool engine, registry, sync
//! coordinator, container manager) and that a caller must be able to
//! match on.

use std::fmt;

/// A domain error kind, closed over a fixed taxonomy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoilerhouseError {
    // --- Not-found ---
    PoolNotFound { pool_id: String },
    TenantNotClaimed { tenant_id: String },
    ContainerNotFound { container_id: String },
    WorkloadNotFound { workload_id: String },

    // --- Capacity ---
    PoolAtCapacity { pool_id: String },

    // --- Timeouts ---
    AcquireTimeout { pool_id: String, tenant_id: String },
    StartTimeout { container_id: String },
    HookTimeout { container_id: String, hook: String },
    HookFailed { container_id: String, hook: String, exit_code: i32 },

    // --- Configuration ---
    SyncNotConfigured { tenant_id: String },
    InvalidWorkload { reason: String },
    InvalidDuration { input: String },
    InvalidMemory { input: String },

    // --- Runtime failures ---
    ImageUnavailable { image: String },
    RuntimeUnavailable { reason: String },
    ContainerCreateFailed { reason: String },

    // --- Invariants ---
    InvariantViolation { detail: String },

    // --- Already exists ---
    PoolExists { pool_id: String },

    // --- Persistence ---
    PersistenceFailure { detail: String },
}

impl fmt::Display for BoilerhouseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PoolNotFound { pool_id } => write!(f, "pool_not_found: {pool_id}"),
            Self::TenantNotClaimed { tenant_id } => {
                write!(f, "tenant_not_claimed: {tenant_id}")
            }
            Self::ContainerNotFound { container_id } => {
                write!(f, "container_not_found: {container_id}")
            }
            Self::WorkloadNotFound { workload_id } => {
                write!(f, "workload_not_found: {workload_id}")
            }
            Self::PoolAtCapacity { pool_id } => write!(f, "pool_at_capacity: {pool_id}"),
            Self::AcquireTimeout { pool_id, tenant_id } => {
                write!(f, "acquire_timeout: pool={pool_id} tenant={tenant_id}")
            }
            Self::StartTimeout { container_id } => {
                write!(f, "start_timeout: {container_id}")
            }
            Self::HookTimeout { container_id, hook } => {
                write!(f, "hook_timeout: container={container_id} hook={hook}")
            }
            Self::HookFailed { container_id, hook, exit_code } => {
                write!(f, "hook_failed: container={container_id} hook={hook} exit_code={exit_code}")
            }
            Self::SyncNotConfigured { tenant_id } => {
                write!(f, "sync_not_configured: {tenant_id}")
            }
            Self::InvalidWorkload { reason } => write!(f, "invalid_workload: {reason}"),
            Self::InvalidDuration { input } => write!(f, "invalid_duration: {input}"),
            Self::InvalidMemory { input } => write!(f, "invalid_memory: {input}"),
            Self::ImageUnavailable { image } => write!(f, "image_unavailable: {image}"),
            Self::RuntimeUnavailable { reason } => write!(f, "runtime_unavailable: {reason}"),
            Self::ContainerCreateFailed { reason } => {
                write!(f, "container_create_failed: {reason}")
            }
            Self::InvariantViolation { detail } => {
                write!(f, "invariant_violation: {detail}")
            }
            Self::PoolExists { pool_id } => write!(f, "pool_exists: {pool_id}"),
            Self::PersistenceFailure { detail } => write!(f, "persistence_failure: {detail}"),
        }
    }
}

impl std::error::Error for BoilerhouseError {}

/// Stable string identifier for the error kind, used in API responses and
/// activity log metadata (never the `Display` text, which carries detail).
impl BoilerhouseError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PoolNotFound { .. } => "pool_not_found",
            Self::TenantNotClaimed { .. } => "tenant_not_claimed",
            Self::ContainerNotFound { .. } => "container_not_found",
            Self::WorkloadNotFound { .. } => "workload_not_found",
            Self::PoolAtCapacity { .. } => "pool_at_capacity",
            Self::AcquireTimeout { .. } => "acquire_timeout",
            Self::StartTimeout { .. } => "start_timeout",
            Self::HookTimeout { .. } => "hook_timeout",
            Self::HookFailed { .. } => "hook_failed",
            Self::SyncNotConfigured { .. } => "sync_not_configured",
            Self::InvalidWorkload { .. } => "invalid_workload",
            Self::InvalidDuration { .. } => "invalid_duration",
            Self::InvalidMemory { .. } => "invalid_memory",
            Self::ImageUnavailable { .. } => "image_unavailable",
            Self::RuntimeUnavailable { .. } => "runtime_unavailable",
            Self::ContainerCreateFailed { .. } => "container_create_failed",
            Self::InvariantViolation { .. } => "invariant_violation",
            Self::PoolExists { .. } => "pool_exists",
            Self::PersistenceFailure { .. } => "persistence_failure",
        }
    }
}

pub type Result<T> = std::result::Result<T, BoilerhouseError>;
