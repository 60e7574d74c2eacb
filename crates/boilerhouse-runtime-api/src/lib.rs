//! The container runtime boundary: the single trait every concrete runtime
//! (Docker, containerd, ...) and every test fake must implement. No
//! implementation lives here — only the contract the container manager
//! (C4) and recovery (C9) program against.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountSpec {
    pub host_path: String,
    pub target: String,
    pub read_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckSpec {
    pub test: Vec<String>,
    pub interval: Duration,
    pub timeout: Duration,
    pub retries: u32,
    pub start_period: Option<Duration>,
}

/// Everything the runtime needs to create a container; built by the
/// container manager from a `Workload` plus allocated host paths.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub command: Option<Vec<String>>,
    pub env: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    pub mounts: Vec<MountSpec>,
    pub networks: Vec<String>,
    pub dns: Vec<String>,
    pub network_mode: Option<String>,
    pub read_only_rootfs: bool,
    pub user: Option<String>,
    pub cpus: Option<f64>,
    pub memory_bytes: Option<u64>,
    pub healthcheck: Option<HealthCheckSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Starting,
    Healthy,
    Unhealthy,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInspect {
    pub runtime_id: String,
    pub running: bool,
    pub health: HealthState,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    ImageUnavailable(String),
    CreateFailed(String),
    StartTimeout(String),
    NotFound(String),
    ExecFailed(String),
    Unavailable(String),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImageUnavailable(image) => write!(f, "image unavailable: {image}"),
            Self::CreateFailed(reason) => write!(f, "container create failed: {reason}"),
            Self::StartTimeout(id) => write!(f, "container start timed out: {id}"),
            Self::NotFound(id) => write!(f, "container not found: {id}"),
            Self::ExecFailed(reason) => write!(f, "exec failed: {reason}"),
            Self::Unavailable(reason) => write!(f, "runtime unavailable: {reason}"),
        }
    }
}

impl std::error::Error for RuntimeError {}

/// The single choke-point through which the container manager reaches an
/// actual container runtime. Every method is fallible in its own right;
/// callers decide retry/backoff policy, this trait only describes the
/// operation.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Create (but do not start) a container, returning the runtime's own
    /// container id.
    async fn create(&self, spec: &ContainerSpec) -> Result<String, RuntimeError>;

    async fn start(&self, runtime_id: &str) -> Result<(), RuntimeError>;

    async fn stop(&self, runtime_id: &str, grace: Duration) -> Result<(), RuntimeError>;

    async fn remove(&self, runtime_id: &str) -> Result<(), RuntimeError>;

    async fn inspect(&self, runtime_id: &str) -> Result<ContainerInspect, RuntimeError>;

    async fn exec(
        &self,
        runtime_id: &str,
        command: &[String]) -> Result<ExecResult, RuntimeError>;

    /// List every container carrying all of `labels` — used by recovery (C9)
    /// to discover containers this daemon manages across a restart.
    async fn list_by_labels(
        &self,
        labels: &BTreeMap<String, String>) -> Result<Vec<ContainerInspect>, RuntimeError>;
}
