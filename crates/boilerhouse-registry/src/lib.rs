//! Pool registry: owns the set of live pools, the
//! canonical tenant→container lookup (a single query against the store,
//! never the in-memory pool state), and the sequencing of sync-coordinator
//! calls around a pool engine's claim/release transitions.

use boilerhouse_container::ContainerManager;
use boilerhouse_pool::{AutoReleaseEvent, PoolEngine};
use boilerhouse_runtime_api::ContainerRuntime;
use boilerhouse_store::{containers, pools, sync as sync_store, workloads, Store};
use boilerhouse_types::{BoilerhouseError, Hook, HookErrorPolicy, Pool, PoolContainer, SyncStatus, Workload};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{info, warn};

/// Default sizing knobs not carried on the Workload spec.
pub const DEFAULT_ACQUIRE_TIMEOUT_MS: i64 = 30_000;
pub const DEFAULT_EVICTION_INTERVAL_MS: i64 = 30_000;

#[derive(Debug, Clone, Default)]
pub struct PoolOverrides {
    pub min_idle: Option<u32>,
    pub max_size: Option<u32>,
    pub idle_timeout_ms: Option<i64>,
    pub acquire_timeout_ms: Option<i64>,
    pub eviction_interval_ms: Option<i64>,
    pub file_idle_ttl_ms: Option<i64>,
    pub networks: Option<Vec<String>>,
}

/// The sync coordinator's claim/release hooks, as
/// seen from the registry's orchestration point of view. Implemented by
/// `boilerhouse-sync`; kept as a trait here so this crate doesn't need to
/// depend on the sync coordinator's own storage/scheduling internals.
#[async_trait::async_trait]
pub trait SyncCoordinator: Send + Sync {
    async fn on_claim(&self, tenant_id: &str, workload: &Workload) -> Result<(), BoilerhouseError>;
    async fn on_release(&self, tenant_id: &str, workload: &Workload) -> Result<(), BoilerhouseError>;
}

/// A tenant's live claim/release transition, tracked only while the
/// corresponding registry call is in flight — cleared the moment it returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TenantTransition {
    Provisioning,
    Releasing,
}

/// `getTenantStatus`'s status axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantState {
    Warm,
    Cold,
    Provisioning,
    Releasing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TenantStatus {
    pub status: TenantState,
    pub sync_status: Option<SyncStatus>,
}

pub struct PoolRegistry<R: ContainerRuntime> {
    store: Store,
    container_manager: Arc<ContainerManager<R>>,
    sync: Arc<dyn SyncCoordinator>,
    pools: RwLock<HashMap<String, PoolEngine<R>>>,
    transitions: Mutex<HashMap<String, TenantTransition>>,
}

impl<R: ContainerRuntime + 'static> PoolRegistry<R> {
    pub fn new(
        store: Store,
        container_manager: Arc<ContainerManager<R>>,
        sync: Arc<dyn SyncCoordinator>) -> Arc<Self> {
        Arc::new(Self {
            store,
            container_manager,
            sync,
            pools: RwLock::new(HashMap::new()),
            transitions: Mutex::new(HashMap::new()),
        })
    }

    fn set_transition(&self, tenant_id: &str, transition: TenantTransition) {
        self.transitions.lock().unwrap().insert(tenant_id.to_string(), transition);
    }

    fn clear_transition(&self, tenant_id: &str) {
        self.transitions.lock().unwrap().remove(tenant_id);
    }

    fn transition_of(&self, tenant_id: &str) -> Option<TenantTransition> {
        self.transitions.lock().unwrap().get(tenant_id).copied()
    }

    fn build_pool(pool_id: &str, workload: &Workload, overrides: &PoolOverrides) -> Pool {
        Pool {
            pool_id: pool_id.to_string(),
            workload_id: workload.id.clone(),
            min_idle: overrides.min_idle.unwrap_or(workload.pool.min_idle),
            max_size: overrides.max_size.unwrap_or(workload.pool.max_size),
            idle_timeout_ms: overrides
            .idle_timeout_ms
            .unwrap_or_else(|| workload.pool.idle_timeout.as_millis() as i64),
            eviction_interval_ms: overrides
            .eviction_interval_ms
            .unwrap_or(DEFAULT_EVICTION_INTERVAL_MS),
            acquire_timeout_ms: overrides
            .acquire_timeout_ms
            .unwrap_or(DEFAULT_ACQUIRE_TIMEOUT_MS),
            networks: overrides
            .networks
            .clone()
            .or_else(|| workload.pool.networks.clone())
            .unwrap_or_default(),
            file_idle_ttl_ms: overrides
            .file_idle_ttl_ms
            .or_else(|| workload.pool.file_idle_ttl.map(|d| d.as_millis() as i64)),
            created_at: Utc::now(),
        }
    }

    /// Drains the pool engine's auto-release channel for as long as the
    /// engine lives, running the sync coordinator's `onRelease` before
    /// completing the release.
    fn spawn_auto_release_relay(
        self: &Arc<Self>,
        mut rx: tokio::sync::mpsc::UnboundedReceiver<AutoReleaseEvent>) {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(e) = registry.handle_auto_release(event).await {
                    tracing::warn!(error = %e, "auto-release failed");
                }
            }
        });
    }

    async fn handle_auto_release(&self, event: AutoReleaseEvent) -> Result<(), BoilerhouseError> {
        let engine = self.get_engine(&event.pool_id).ok_or_else(|| BoilerhouseError::PoolNotFound {
            pool_id: event.pool_id.clone(),
        })?;
        let workload = engine.workload();
        self.sync.on_release(&event.tenant_id, &workload).await?;
        engine.release(&event.tenant_id).await
    }

    async fn spawn_engine(
        self: &Arc<Self>,
        pool: Pool,
        workload: Workload) -> Result<(), BoilerhouseError> {
        let (engine, rx) = PoolEngine::new(
            pool.clone(),
            workload,
            self.store.clone(),
            self.container_manager.clone());
        self.spawn_auto_release_relay(rx);
        engine.start().await?;
        self.pools.write().unwrap().insert(pool.pool_id.clone(), engine);
        Ok(())
    }

    pub async fn create_pool(
        self: &Arc<Self>,
        pool_id: &str,
        workload_id: &str,
        overrides: PoolOverrides) -> Result<Pool, BoilerhouseError> {
        if self.pools.read().unwrap().contains_key(pool_id) {
            return Err(BoilerhouseError::PoolExists {
                pool_id: pool_id.to_string(),
            });
        }
        let workload = workloads::get_workload(self.store.pool(), workload_id)
        .await
        .map_err(store_err)?
        .ok_or_else(|| BoilerhouseError::WorkloadNotFound {
            workload_id: workload_id.to_string(),
        })?;

        let pool = Self::build_pool(pool_id, &workload, &overrides);
        pools::insert_pool(self.store.pool(), &pool).await.map_err(store_err)?;
        self.spawn_engine(pool.clone(), workload).await?;
        info!(pool_id, workload_id, "pool created");
        Ok(pool)
    }

    pub async fn destroy_pool(&self, pool_id: &str) -> Result<(), BoilerhouseError> {
        let engine = self
        .pools
        .write()
        .unwrap()
        .remove(pool_id)
        .ok_or_else(|| BoilerhouseError::PoolNotFound {
            pool_id: pool_id.to_string(),
        })?;
        engine.drain().await?;
        pools::delete_pool(self.store.pool(), pool_id).await.map_err(store_err)?;
        info!(pool_id, "pool destroyed");
        Ok(())
    }

    /// Restores pools from the `pools` table, skipping any whose workload
    /// is no longer registered.
    pub async fn restore_from_db(self: &Arc<Self>) -> Result<(), BoilerhouseError> {
        let persisted = pools::list_pools(self.store.pool()).await.map_err(store_err)?;
        for pool in persisted {
            match workloads::get_workload(self.store.pool(), &pool.workload_id)
            .await
            .map_err(store_err)?
            {
                Some(workload) => {
                    self.spawn_engine(pool, workload).await?;
                }
                None => {
                    tracing::warn!(
                        pool_id = %pool.pool_id,
                        workload_id = %pool.workload_id,
                        "skipping pool restore: workload no longer registered"
                    );
                }
            }
        }
        Ok(())
    }

    pub async fn get_pool_info(&self, pool_id: &str) -> Result<Option<Pool>, BoilerhouseError> {
        if !self.pools.read().unwrap().contains_key(pool_id) {
            return Ok(None);
        }
        pools::get_pool(self.store.pool(), pool_id).await.map_err(store_err)
    }

    pub async fn list_containers_info(&self) -> Result<Vec<PoolContainer>, BoilerhouseError> {
        containers::list_all_containers(self.store.pool()).await.map_err(store_err)
    }

    pub async fn destroy_container(&self, container_id: &str) -> Result<(), BoilerhouseError> {
        let c = containers::get_container(self.store.pool(), container_id)
        .await
        .map_err(store_err)?
        .ok_or_else(|| BoilerhouseError::ContainerNotFound {
            container_id: container_id.to_string(),
        })?;
        let engine = self.get_engine(&c.pool_id).ok_or_else(|| BoilerhouseError::PoolNotFound {
            pool_id: c.pool_id.clone(),
        })?;
        engine.destroy_container(container_id).await
    }

    pub async fn get_pool_for_tenant(&self, tenant_id: &str) -> Result<Option<String>, BoilerhouseError> {
        Ok(containers::get_container_for_tenant(self.store.pool(), tenant_id)
            .await
            .map_err(store_err)?
            .map(|c| c.pool_id))
    }

    pub async fn get_container_for_tenant(
        &self,
        tenant_id: &str) -> Result<Option<PoolContainer>, BoilerhouseError> {
        containers::get_container_for_tenant(self.store.pool(), tenant_id)
        .await
        .map_err(store_err)
    }

    pub fn get_engine(&self, pool_id: &str) -> Option<PoolEngine<R>> {
        self.pools.read().unwrap().get(pool_id).cloned()
    }

    /// Runs `hooks` in order against `runtime_id`. A hook's own `on_error`
    /// policy governs its failure: `continue` logs and moves on, `retry`
    /// re-attempts up to `retries` times before being treated as `fail`,
    /// and `fail` (the default) returns the error immediately, aborting
    /// any hooks after it.
    async fn run_hooks(&self, runtime_id: &str, hooks: &[Hook]) -> Result<(), BoilerhouseError> {
        for hook in hooks {
            let attempts = if hook.on_error == HookErrorPolicy::Retry {
                hook.retries.max(1)
            } else {
                1
            };
            let mut last_err = None;
            for attempt in 1..=attempts {
                let outcome = self.container_manager.exec(runtime_id, &hook.command, hook.timeout).await;
                match outcome {
                    Ok(result) if result.exit_code == 0 => {
                        last_err = None;
                        break;
                    }
                    Ok(result) => {
                        last_err = Some(BoilerhouseError::HookFailed {
                            container_id: runtime_id.to_string(),
                            hook: hook.command.join(" "),
                            exit_code: result.exit_code,
                        });
                    }
                    Err(e) => last_err = Some(e),
                }
                if attempt < attempts {
                    warn!(container_id = runtime_id, attempt, "hook attempt failed; retrying");
                }
            }
            if let Some(err) = last_err {
                match hook.on_error {
                    HookErrorPolicy::Continue => {
                        warn!(error = %err, "hook failed; continuing per on_error=continue");
                    }
                    HookErrorPolicy::Fail | HookErrorPolicy::Retry => return Err(err),
                }
            }
        }
        Ok(())
    }

    async fn runtime_id_for(&self, container_id: &str) -> Result<Option<String>, BoilerhouseError> {
        containers::runtime_container_id(self.store.pool(), container_id).await.map_err(store_err)
    }

    /// Claims a container for `tenant_id` in `pool_id`: acquires it, runs
    /// the sync coordinator's `onClaim`, then the workload's `post_claim`
    /// hooks. A hook failure aborts the claim; the container is left
    /// claimed, consistent with how any other post-acquire failure is
    /// handled today.
    pub async fn claim(&self, pool_id: &str, tenant_id: &str) -> Result<PoolContainer, BoilerhouseError> {
        let engine = self.get_engine(pool_id).ok_or_else(|| BoilerhouseError::PoolNotFound {
            pool_id: pool_id.to_string(),
        })?;
        self.set_transition(tenant_id, TenantTransition::Provisioning);
        let result = self.claim_inner(&engine, tenant_id).await;
        self.clear_transition(tenant_id);
        result
    }

    async fn claim_inner(&self, engine: &PoolEngine<R>, tenant_id: &str) -> Result<PoolContainer, BoilerhouseError> {
        let container = engine.acquire(tenant_id).await?;
        let workload = engine.workload();
        self.sync.on_claim(tenant_id, &workload).await?;
        if !workload.hooks.post_claim.is_empty() {
            if let Some(runtime_id) = self.runtime_id_for(&container.container_id).await? {
                self.run_hooks(&runtime_id, &workload.hooks.post_claim).await?;
            }
        }
        Ok(container)
    }

    /// Releases the container held by `tenant_id` in `pool_id`. Runs the
    /// workload's `pre_release` hooks first — failures are logged only,
    /// never abort the release — then, iff `sync` is not explicitly
    /// `false`, runs the sync coordinator's `onRelease` before the pool
    /// transition.
    pub async fn release(
        &self,
        pool_id: &str,
        tenant_id: &str,
        sync: Option<bool>) -> Result<(), BoilerhouseError> {
        let engine = self.get_engine(pool_id).ok_or_else(|| BoilerhouseError::PoolNotFound {
            pool_id: pool_id.to_string(),
        })?;
        self.set_transition(tenant_id, TenantTransition::Releasing);
        let result = self.release_inner(&engine, tenant_id, sync).await;
        self.clear_transition(tenant_id);
        result
    }

    async fn release_inner(
        &self,
        engine: &PoolEngine<R>,
        tenant_id: &str,
        sync: Option<bool>) -> Result<(), BoilerhouseError> {
        let workload = engine.workload();
        if !workload.hooks.pre_release.is_empty() {
            if let Some(container) = self.get_container_for_tenant(tenant_id).await? {
                if let Some(runtime_id) = self.runtime_id_for(&container.container_id).await? {
                    if let Err(e) = self.run_hooks(&runtime_id, &workload.hooks.pre_release).await {
                        warn!(error = %e, tenant_id, "pre_release hook failed; release proceeding");
                    }
                }
            }
        }
        if sync.unwrap_or(true) {
            self.sync.on_release(tenant_id, &workload).await?;
        }
        engine.release(tenant_id).await
    }

    /// Resolves the workload id backing `pool_id`, checking the live
    /// engine first and falling back to the persisted pool row so a status
    /// lookup still works for a pool not currently loaded in-process.
    async fn workload_id_for_pool(&self, pool_id: &str) -> Result<Option<String>, BoilerhouseError> {
        if let Some(engine) = self.get_engine(pool_id) {
            return Ok(Some(engine.workload().id.clone()));
        }
        Ok(pools::get_pool(self.store.pool(), pool_id).await.map_err(store_err)?.map(|p| p.workload_id))
    }

    /// Synthesizes tenant status from the current container state, any
    /// in-flight claim/release transition, and the sync tracker's
    /// persisted status — there is no single stored "tenant status" field
    /// to read back.
    pub async fn get_tenant_status(&self, tenant_id: &str) -> Result<TenantStatus, BoilerhouseError> {
        let container = self.get_container_for_tenant(tenant_id).await?;
        let transition = self.transition_of(tenant_id);
        let status = match (&container, transition) {
            (Some(_), Some(TenantTransition::Releasing)) => TenantState::Releasing,
            (Some(_), _) => TenantState::Warm,
            (None, Some(TenantTransition::Provisioning)) => TenantState::Provisioning,
            (None, _) => TenantState::Cold,
        };
        let sync_status = match &container {
            Some(c) => match self.workload_id_for_pool(&c.pool_id).await? {
                Some(sync_id) => sync_store::get_sync_status(self.store.pool(), tenant_id, &sync_id)
                .await
                .map_err(store_err)?,
                None => None,
            },
            None => None,
        };
        Ok(TenantStatus { status, sync_status })
    }

    /// Stops all pools without destroying containers.
    pub fn shutdown(&self) {
        for engine in self.pools.read().unwrap().values() {
            engine.stop();
        }
    }
}

fn store_err(e: anyhow::Error) -> BoilerhouseError {
    BoilerhouseError::PersistenceFailure {
        detail: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use boilerhouse_container::ContainerManagerConfig;
    use boilerhouse_runtime_api::{ContainerInspect, ContainerSpec, ExecResult, HealthState, RuntimeError};
    use boilerhouse_types::{Deploy, HealthCheck, PoolDefaults, SecurityPosture, Volumes};
    use std::collections::BTreeMap;
    use std::time::Duration;

    struct NoopSync;

    #[async_trait]
    impl SyncCoordinator for NoopSync {
        async fn on_claim(&self, _tenant_id: &str, _workload: &Workload) -> Result<(), BoilerhouseError> {
            Ok(())
        }
        async fn on_release(&self, _tenant_id: &str, _workload: &Workload) -> Result<(), BoilerhouseError> {
            Ok(())
        }
    }

    /// Scripted exit code for every `exec` call; swap with `set_exec_exit_code`
    /// to exercise hook failure paths.
    #[derive(Default)]
    struct FakeRuntime {
        exec_exit_code: std::sync::atomic::AtomicI32,
    }

    impl FakeRuntime {
        fn set_exec_exit_code(&self, code: i32) {
            self.exec_exit_code.store(code, std::sync::atomic::Ordering::Relaxed);
        }
    }

    #[async_trait]
    impl ContainerRuntime for FakeRuntime {
        async fn create(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
            Ok(format!("runtime-{}", spec.name))
        }
        async fn start(&self, _id: &str) -> Result<(), RuntimeError> {
            Ok(())
        }
        async fn stop(&self, _id: &str, _grace: Duration) -> Result<(), RuntimeError> {
            Ok(())
        }
        async fn remove(&self, _id: &str) -> Result<(), RuntimeError> {
            Ok(())
        }
        async fn inspect(&self, id: &str) -> Result<ContainerInspect, RuntimeError> {
            Ok(ContainerInspect {
                runtime_id: id.to_string(),
                running: true,
                health: HealthState::Healthy,
                labels: BTreeMap::new(),
            })
        }
        async fn exec(&self, _id: &str, _cmd: &[String]) -> Result<ExecResult, RuntimeError> {
            Ok(ExecResult {
                exit_code: self.exec_exit_code.load(std::sync::atomic::Ordering::Relaxed),
                stdout: Vec::new(),
                stderr: Vec::new(),
            })
        }
        async fn list_by_labels(&self, _labels: &BTreeMap<String, String>) -> Result<Vec<ContainerInspect>, RuntimeError> {
            Ok(Vec::new())
        }
    }

    fn sample_workload() -> Workload {
        Workload {
            id: "api".to_string(),
            name: "api".to_string(),
            image: "example/api:latest".to_string(),
            command: None,
            volumes: Volumes::default(),
            environment: BTreeMap::new(),
            healthcheck: HealthCheck {
                test: vec!["true".to_string()],
                interval: Duration::from_secs(1),
                timeout: Duration::from_secs(1),
                retries: 1,
                start_period: None,
            },
            deploy: Deploy::default(),
            security: SecurityPosture::default(),
            pool: PoolDefaults {
                min_idle: 0,
                max_size: 2,
                idle_timeout: Duration::from_secs(60),
                file_idle_ttl: None,
                networks: None,
                dns: None,
            },
            sync: None,
            hooks: Default::default(),
        }
    }

    #[tokio::test]
    async fn create_pool_rejects_unknown_workload() {
        let store = boilerhouse_store::Store::open_in_memory().await.unwrap();
        let cm = Arc::new(ContainerManager::new(Arc::new(FakeRuntime::default()), ContainerManagerConfig::default()));
        let registry = PoolRegistry::new(store, cm, Arc::new(NoopSync));

        let err = registry
        .create_pool("pool-1", "does-not-exist", PoolOverrides::default())
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "workload_not_found");
    }

    #[tokio::test]
    async fn create_pool_prewarms_and_claims() {
        let store = boilerhouse_store::Store::open_in_memory().await.unwrap();
        boilerhouse_store::workloads::upsert_workload(store.pool(), &sample_workload(), "hash-1")
        .await
        .unwrap();
        let cm = Arc::new(ContainerManager::new(Arc::new(FakeRuntime::default()), ContainerManagerConfig::default()));
        let registry = PoolRegistry::new(store, cm, Arc::new(NoopSync));

        registry
        .create_pool("pool-1", "api", PoolOverrides {
            min_idle: Some(1),
            ..Default::default()
        })
        .await
        .unwrap();

        let container = registry.claim("pool-1", "tenant-a").await.unwrap();
        assert_eq!(container.tenant_id.as_deref(), Some("tenant-a"));

        registry.release("pool-1", "tenant-a", None).await.unwrap();
        let after = registry.get_container_for_tenant("tenant-a").await.unwrap();
        assert!(after.is_none());
    }

    fn workload_with_hooks(post_claim: Vec<Hook>, pre_release: Vec<Hook>) -> Workload {
        Workload {
            hooks: boilerhouse_types::Hooks { post_claim, pre_release },
            ..sample_workload()
        }
    }

    fn noop_hook() -> Hook {
        Hook {
            command: vec!["true".to_string()],
            timeout: Duration::from_secs(1),
            on_error: HookErrorPolicy::Fail,
            retries: 1,
        }
    }

    #[tokio::test]
    async fn claim_runs_post_claim_hooks() {
        let store = boilerhouse_store::Store::open_in_memory().await.unwrap();
        boilerhouse_store::workloads::upsert_workload(
            store.pool(),
            &workload_with_hooks(vec![noop_hook()], Vec::new()),
            "hash-1")
        .await
        .unwrap();
        let cm = Arc::new(ContainerManager::new(Arc::new(FakeRuntime::default()), ContainerManagerConfig::default()));
        let registry = PoolRegistry::new(store, cm, Arc::new(NoopSync));
        registry.create_pool("pool-1", "api", PoolOverrides::default()).await.unwrap();

        let container = registry.claim("pool-1", "tenant-a").await.unwrap();
        assert_eq!(container.tenant_id.as_deref(), Some("tenant-a"));
    }

    #[tokio::test]
    async fn claim_fails_when_post_claim_hook_fails() {
        let store = boilerhouse_store::Store::open_in_memory().await.unwrap();
        boilerhouse_store::workloads::upsert_workload(
            store.pool(),
            &workload_with_hooks(vec![noop_hook()], Vec::new()),
            "hash-1")
        .await
        .unwrap();
        let runtime = Arc::new(FakeRuntime::default());
        runtime.set_exec_exit_code(1);
        let cm = Arc::new(ContainerManager::new(runtime, ContainerManagerConfig::default()));
        let registry = PoolRegistry::new(store, cm, Arc::new(NoopSync));
        registry.create_pool("pool-1", "api", PoolOverrides::default()).await.unwrap();

        let err = registry.claim("pool-1", "tenant-a").await.unwrap_err();
        assert_eq!(err.kind(), "hook_failed");
        assert_eq!(registry.get_tenant_status("tenant-a").await.unwrap().status, TenantState::Warm);
    }

    #[tokio::test]
    async fn release_proceeds_despite_pre_release_hook_failure() {
        let store = boilerhouse_store::Store::open_in_memory().await.unwrap();
        boilerhouse_store::workloads::upsert_workload(
            store.pool(),
            &workload_with_hooks(Vec::new(), vec![noop_hook()]),
            "hash-1")
        .await
        .unwrap();
        let runtime = Arc::new(FakeRuntime::default());
        let cm = Arc::new(ContainerManager::new(runtime.clone(), ContainerManagerConfig::default()));
        let registry = PoolRegistry::new(store, cm, Arc::new(NoopSync));
        registry.create_pool("pool-1", "api", PoolOverrides::default()).await.unwrap();
        registry.claim("pool-1", "tenant-a").await.unwrap();

        runtime.set_exec_exit_code(1);
        registry.release("pool-1", "tenant-a", None).await.unwrap();
        let after = registry.get_container_for_tenant("tenant-a").await.unwrap();
        assert!(after.is_none());
    }

    #[tokio::test]
    async fn release_skips_sync_when_sync_false() {
        struct RecordingSync {
            on_release_calls: std::sync::atomic::AtomicU32,
        }
        #[async_trait]
        impl SyncCoordinator for RecordingSync {
            async fn on_claim(&self, _tenant_id: &str, _workload: &Workload) -> Result<(), BoilerhouseError> {
                Ok(())
            }
            async fn on_release(&self, _tenant_id: &str, _workload: &Workload) -> Result<(), BoilerhouseError> {
                self.on_release_calls.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                Ok(())
            }
        }

        let store = boilerhouse_store::Store::open_in_memory().await.unwrap();
        boilerhouse_store::workloads::upsert_workload(store.pool(), &sample_workload(), "hash-1")
        .await
        .unwrap();
        let cm = Arc::new(ContainerManager::new(Arc::new(FakeRuntime::default()), ContainerManagerConfig::default()));
        let sync = Arc::new(RecordingSync { on_release_calls: std::sync::atomic::AtomicU32::new(0) });
        let registry = PoolRegistry::new(store, cm, sync.clone());
        registry.create_pool("pool-1", "api", PoolOverrides::default()).await.unwrap();
        registry.claim("pool-1", "tenant-a").await.unwrap();

        registry.release("pool-1", "tenant-a", Some(false)).await.unwrap();
        assert_eq!(sync.on_release_calls.load(std::sync::atomic::Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn get_tenant_status_reflects_container_state() {
        let store = boilerhouse_store::Store::open_in_memory().await.unwrap();
        boilerhouse_store::workloads::upsert_workload(store.pool(), &sample_workload(), "hash-1")
        .await
        .unwrap();
        let cm = Arc::new(ContainerManager::new(Arc::new(FakeRuntime::default()), ContainerManagerConfig::default()));
        let registry = PoolRegistry::new(store, cm, Arc::new(NoopSync));
        registry.create_pool("pool-1", "api", PoolOverrides::default()).await.unwrap();

        assert_eq!(registry.get_tenant_status("tenant-a").await.unwrap().status, TenantState::Cold);

        registry.claim("pool-1", "tenant-a").await.unwrap();
        assert_eq!(registry.get_tenant_status("tenant-a").await.unwrap().status, TenantState::Warm);

        registry.release("pool-1", "tenant-a", None).await.unwrap();
        assert_eq!(registry.get_tenant_status("tenant-a").await.unwrap().status, TenantState::Cold);
    }
}
