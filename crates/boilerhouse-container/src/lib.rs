//! Container manager: translates a `Workload` into a
//! runtime `ContainerSpec`, allocates the on-disk layout, and wraps the
//! create/destroy/exec lifecycle against the `ContainerRuntime` boundary.

use boilerhouse_runtime_api::{
    ContainerInspect, ContainerRuntime, ContainerSpec, ExecResult, HealthCheckSpec, HealthState,
    MountSpec, RuntimeError,
};
use boilerhouse_types::{BoilerhouseError, HostPaths, Pool, PoolContainer, Workload};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Where on the host the container manager allocates per-container
/// directories.
#[derive(Debug, Clone)]
pub struct ContainerManagerConfig {
    pub state_base_dir: PathBuf,
    pub secrets_base_dir: PathBuf,
    pub socket_base_dir: PathBuf,
    pub container_start_timeout: Duration,
}

impl Default for ContainerManagerConfig {
    fn default() -> Self {
        Self {
            state_base_dir: PathBuf::from("/var/lib/boilerhouse/state"),
            secrets_base_dir: PathBuf::from("/var/lib/boilerhouse/secrets"),
            socket_base_dir: PathBuf::from("/var/run/boilerhouse/sockets"),
            container_start_timeout: Duration::from_secs(30),
        }
    }
}

/// Result of `ContainerManager::create`: the domain record plus the
/// runtime's own container id, which the caller persists alongside it.
#[derive(Debug, Clone)]
pub struct CreatedContainer {
    pub container: PoolContainer,
    pub runtime_id: String,
}

pub struct ContainerManager<R: ContainerRuntime> {
    runtime: Arc<R>,
    config: ContainerManagerConfig,
}

impl<R: ContainerRuntime> Clone for ContainerManager<R> {
    fn clone(&self) -> Self {
        Self {
            runtime: Arc::clone(&self.runtime),
            config: self.config.clone(),
        }
    }
}

impl<R: ContainerRuntime> ContainerManager<R> {
    pub fn new(runtime: Arc<R>, config: ContainerManagerConfig) -> Self {
        Self { runtime, config }
    }

    /// The underlying runtime handle, used directly by recovery (C9) to
    /// discover and reconcile managed containers outside the
    /// create/start/stop lifecycle this manager otherwise owns.
    pub fn runtime(&self) -> &Arc<R> {
        &self.runtime
    }

    /// Build the managed labels for a container. Exposed so recovery (C9) can build the same filter it
    /// uses to discover managed containers.
    pub fn labels(container_id: &str, pool: &Pool) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::new();
        labels.insert(boilerhouse_types::BOILERHOUSE_MANAGED_LABEL.to_string(), "true".to_string());
        labels.insert(
            boilerhouse_types::BOILERHOUSE_CONTAINER_ID_LABEL.to_string(),
            container_id.to_string());
        labels.insert(
            boilerhouse_types::BOILERHOUSE_POOL_ID_LABEL.to_string(),
            pool.pool_id.clone());
        labels.insert(
            boilerhouse_types::BOILERHOUSE_WORKLOAD_ID_LABEL.to_string(),
            pool.workload_id.clone());
        labels
    }

    fn host_paths(&self, container_id: &str) -> HostPaths {
        HostPaths {
            socket_path: self
            .config
            .socket_base_dir
            .join(container_id)
            .join("app.sock")
            .to_string_lossy()
            .into_owned(),
            state_dir: self
            .config
            .state_base_dir
            .join(container_id)
            .to_string_lossy()
            .into_owned(),
            secrets_dir: self
            .config
            .secrets_base_dir
            .join(container_id)
            .to_string_lossy()
            .into_owned(),
        }
    }

    fn build_spec(
        &self,
        workload: &Workload,
        pool: &Pool,
        container_id: &str,
        host_paths: &HostPaths) -> ContainerSpec {
        let mut mounts = Vec::new();
        mounts.push(MountSpec {
            host_path: host_paths.state_dir.clone(),
            target: workload
            .volumes
            .state
            .as_ref()
            .map(|v| v.target.clone())
            .unwrap_or_else(|| "/state".to_string()),
            read_only: workload.volumes.state.as_ref().map(|v| v.read_only).unwrap_or(false),
        });
        mounts.push(MountSpec {
            host_path: host_paths.secrets_dir.clone(),
            target: workload
            .volumes
            .secrets
            .as_ref()
            .map(|v| v.target.clone())
            .unwrap_or_else(|| "/secrets".to_string()),
            read_only: workload.volumes.secrets.as_ref().map(|v| v.read_only).unwrap_or(true),
        });
        if let Some(comm) = &workload.volumes.comm {
            mounts.push(MountSpec {
                host_path: PathBuf::from(&host_paths.socket_path)
                .parent()
                .unwrap()
                .to_string_lossy()
                .into_owned(),
                target: comm.target.clone(),
                read_only: comm.read_only,
            });
        }

        let networks = pool
        .networks
        .iter()
        .cloned()
        .chain(workload.security.networks.iter().cloned())
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();

        ContainerSpec {
            name: format!("boilerhouse-{container_id}"),
            image: workload.image.clone(),
            command: workload.command.clone(),
            env: workload.environment.clone().into_iter().collect(),
            labels: Self::labels(container_id, pool),
            mounts,
            networks,
            dns: workload.security.dns.clone(),
            network_mode: workload.security.network_mode.clone(),
            read_only_rootfs: workload.security.read_only,
            user: workload.security.user.clone(),
            cpus: workload.deploy.resources.limits.cpus,
            memory_bytes: workload.deploy.resources.limits.memory.map(|m| m.0),
            healthcheck: Some(HealthCheckSpec {
                test: workload.healthcheck.test.clone(),
                interval: workload.healthcheck.interval,
                timeout: workload.healthcheck.timeout,
                retries: workload.healthcheck.retries,
                start_period: workload.healthcheck.start_period,
            }),
        }
    }

    /// Allocates host directories, creates and starts the container, and
    /// waits (bounded by `containerStartTimeoutMs`) for the runtime to
    /// report it running.
    pub async fn create(
        &self,
        workload: &Workload,
        pool: &Pool,
        container_id: &str) -> Result<CreatedContainer, BoilerhouseError> {
        let host_paths = self.host_paths(container_id);
        for dir in [&host_paths.state_dir, &host_paths.secrets_dir] {
            std::fs::create_dir_all(dir).map_err(|e| BoilerhouseError::ContainerCreateFailed {
                reason: format!("create_dir_all({dir}): {e}"),
            })?;
        }
        if let Some(parent) = PathBuf::from(&host_paths.socket_path).parent() {
            std::fs::create_dir_all(parent).map_err(|e| BoilerhouseError::ContainerCreateFailed {
                reason: format!("create_dir_all({}): {e}", parent.display()),
            })?;
        }

        let spec = self.build_spec(workload, pool, container_id, &host_paths);

        let runtime_id = self.runtime.create(&spec).await.map_err(|e| match e {
            RuntimeError::ImageUnavailable(image) => BoilerhouseError::ImageUnavailable { image },
            other => BoilerhouseError::ContainerCreateFailed {
                reason: other.to_string(),
            },
        })?;

        self.runtime
        .start(&runtime_id)
        .await
        .map_err(|e| BoilerhouseError::ContainerCreateFailed {
            reason: e.to_string(),
        })?;

        self.wait_until_running(&runtime_id).await?;

        info!(container_id, pool_id = %pool.pool_id, "container created");

        let now = Utc::now();
        Ok(CreatedContainer {
            container: PoolContainer {
                container_id: container_id.to_string(),
                pool_id: pool.pool_id.clone(),
                status: boilerhouse_types::ContainerStatus::Idle,
                tenant_id: None,
                last_tenant_id: None,
                last_activity: now,
                claimed_at: None,
                idle_expires_at: Some(now + chrono::Duration::milliseconds(pool.idle_timeout_ms)),
                host_paths,
                created_at: now,
            },
            runtime_id,
        })
    }

    async fn wait_until_running(&self, runtime_id: &str) -> Result<(), BoilerhouseError> {
        let deadline = tokio::time::Instant::now() + self.config.container_start_timeout;
        loop {
            let inspect: ContainerInspect =
            self.runtime.inspect(runtime_id).await.map_err(|e| {
                BoilerhouseError::ContainerCreateFailed {
                    reason: e.to_string(),
                }
            })?;
            if inspect.running
            && matches!(inspect.health, HealthState::Healthy | HealthState::None)
            {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(BoilerhouseError::StartTimeout {
                    container_id: runtime_id.to_string(),
                });
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Stops then removes the container, tolerating not-found on either
    /// step so the operation is idempotent.
    pub async fn destroy(&self, runtime_id: &str, grace: Duration) -> Result<(), BoilerhouseError> {
        match self.runtime.stop(runtime_id, grace).await {
            Ok(()) | Err(RuntimeError::NotFound(_)) => {}
            Err(e) => warn!(runtime_id, error = %e, "stop failed, attempting remove anyway"),
        }
        match self.runtime.remove(runtime_id).await {
            Ok(()) | Err(RuntimeError::NotFound(_)) => Ok(()),
            Err(e) => Err(BoilerhouseError::RuntimeUnavailable {
                reason: e.to_string(),
            }),
        }
    }

    /// Runs a lifecycle hook or ad-hoc command inside the container, bounded
    /// by `timeout`.
    pub async fn exec(
        &self,
        runtime_id: &str,
        command: &[String],
        timeout: Duration) -> Result<ExecResult, BoilerhouseError> {
        tokio::time::timeout(timeout, self.runtime.exec(runtime_id, command))
        .await
        .map_err(|_| BoilerhouseError::HookTimeout {
            container_id: runtime_id.to_string(),
            hook: command.join(" "),
        })?
        .map_err(|e| BoilerhouseError::RuntimeUnavailable {
            reason: e.to_string(),
        })
    }
}
