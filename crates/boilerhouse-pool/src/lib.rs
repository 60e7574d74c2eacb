//! Pool engine: one instance per pool.
//! Owns the pre-warm loop, the eviction sweep, and the claim/release
//! transitions. The `containers` table in the store is the single source
//! of truth for idle/claimed/stopping state — the engine keeps no
//! shadow copy of it, only the FIFO queue of pending acquires and the
//! background task handles, matching the write-through policy of C1.

mod pending;
mod stats;

pub use pending::PendingQueue;
pub use stats::PoolStats;

use boilerhouse_container::{ContainerManager, ContainerManagerConfig};
use boilerhouse_runtime_api::ContainerRuntime;
use boilerhouse_store::{containers, Store};
use boilerhouse_types::{BoilerhouseError, ContainerStatus, Pool, PoolContainer, Workload};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Emitted by the eviction sweep when a claimed container's file-idle-ttl
/// has elapsed. The pool engine cannot finish this release itself — the
/// sync coordinator must run `onRelease` first, the same as any other
/// release — so it hands the event to whoever owns that orchestration
/// (the registry) instead of acting on it inline.
#[derive(Debug, Clone)]
pub struct AutoReleaseEvent {
    pub pool_id: String,
    pub tenant_id: String,
    pub container_id: String,
}

struct PoolEngineState {
    pool: std::sync::RwLock<Pool>,
    workload: Workload,
    draining: AtomicBool,
    last_error: Mutex<Option<String>>,
    pending: PendingQueue,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    auto_release_tx: mpsc::UnboundedSender<AutoReleaseEvent>,
}

/// Handle to a running pool. Cheap to clone — every clone shares the same
/// background tasks and in-memory queue.
#[derive(Clone)]
pub struct PoolEngine<R: ContainerRuntime> {
    state: Arc<PoolEngineState>,
    store: Store,
    container_manager: Arc<ContainerManager<R>>,
}

impl<R: ContainerRuntime + 'static> PoolEngine<R> {
    pub fn new(
        pool: Pool,
        workload: Workload,
        store: Store,
        container_manager: Arc<ContainerManager<R>>) -> (Self, mpsc::UnboundedReceiver<AutoReleaseEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = Self {
            state: Arc::new(PoolEngineState {
                pool: std::sync::RwLock::new(pool),
                workload,
                draining: AtomicBool::new(false),
                last_error: Mutex::new(None),
                pending: PendingQueue::new(),
                tasks: Mutex::new(Vec::new()),
                auto_release_tx: tx,
            }),
            store,
            container_manager,
        };
        (engine, rx)
    }

    pub fn pool_id(&self) -> String {
        self.state.pool.read().unwrap().pool_id.clone()
    }

    pub fn workload(&self) -> Workload {
        self.state.workload.clone()
    }

    fn pool_snapshot(&self) -> Pool {
        self.state.pool.read().unwrap().clone()
    }

    pub fn get_last_error(&self) -> Option<String> {
        self.state.last_error.lock().unwrap().clone()
    }

    fn record_last_error(&self, err: impl std::fmt::Display) {
        *self.state.last_error.lock().unwrap() = Some(err.to_string());
    }

    /// Begins the pre-warm loop and the periodic eviction sweep.
    pub async fn start(&self) -> Result<(), BoilerhouseError> {
        self.pre_warm().await;

        let sweep_engine = self.clone();
        let eviction_interval = self.pool_snapshot().eviction_interval();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(eviction_interval);
            loop {
                ticker.tick().await;
                if sweep_engine.state.draining.load(Ordering::SeqCst) {
                    return;
                }
                sweep_engine.eviction_sweep().await;
            }
        });
        self.state.tasks.lock().unwrap().push(handle);
        Ok(())
    }

    /// Cancels timers; does not destroy containers (recovery will adopt
    /// them on the next boot).
    pub fn stop(&self) {
        self.state.draining.store(true, Ordering::SeqCst);
        for handle in self.state.tasks.lock().unwrap().drain(..) {
            handle.abort();
        }
        self.state.pending.wake_all();
    }

    /// Destroys every container in the pool and clears in-memory state.
    pub async fn drain(&self) -> Result<(), BoilerhouseError> {
        self.stop();
        let pool_id = self.pool_id();
        let all = containers::list_containers_for_pool(self.store.pool(), &pool_id)
        .await
        .map_err(store_err)?;
        for c in all {
            self.force_destroy(&c).await?;
        }
        Ok(())
    }

    async fn force_destroy(&self, c: &PoolContainer) -> Result<(), BoilerhouseError> {
        if let Some(runtime_id) = containers::runtime_container_id(self.store.pool(), &c.container_id)
        .await
        .map_err(store_err)?
        {
            self.container_manager.destroy(&runtime_id, Duration::from_secs(10)).await?;
        }
        containers::delete_container(self.store.pool(), &c.container_id)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn pre_warm(&self) {
        let pool = self.pool_snapshot();
        let stats = match self.get_stats().await {
            Ok(s) => s,
            Err(e) => {
                self.record_last_error(e);
                return;
            }
        };
        let deficit = pool.min_idle.saturating_sub(stats.idle);
        for _ in 0..deficit {
            if let Err(e) = self.create_idle_container().await {
                warn!(pool_id = %pool.pool_id, error = %e, "pre-warm creation failed");
                self.record_last_error(e);
            }
        }
    }

    async fn create_idle_container(&self) -> Result<PoolContainer, BoilerhouseError> {
        let pool = self.pool_snapshot();
        let container_id = uuid::Uuid::new_v4().to_string();
        let created = self
        .container_manager
        .create(&self.state.workload, &pool, &container_id)
        .await?;
        containers::insert_container(self.store.pool(), &created.container, &created.runtime_id)
        .await
        .map_err(store_err)?;
        info!(pool_id = %pool.pool_id, container_id = %created.container.container_id, "container pre-warmed");
        Ok(created.container)
    }

    /// Eviction sweep.
    async fn eviction_sweep(&self) {
        let pool = self.pool_snapshot();
        let now = Utc::now();

        let idle = match containers::list_idle_fifo(self.store.pool(), &pool.pool_id).await {
            Ok(v) => v,
            Err(e) => {
                warn!(pool_id = %pool.pool_id, error = %e, "eviction sweep: list_idle_fifo failed");
                return;
            }
        };
        let mut remaining_idle = idle.len() as u32;
        for c in idle {
            if remaining_idle <= pool.min_idle {
                break;
            }
            let expired = c
            .idle_expires_at
            .map(|exp| now >= exp)
            .unwrap_or(false);
            if !expired {
                continue;
            }
            if containers::mark_stopping(self.store.pool(), &c.container_id)
            .await
            .unwrap_or(false)
            {
                if let Err(e) = self.force_destroy(&c).await {
                    warn!(pool_id = %pool.pool_id, container_id = %c.container_id, error = %e, "eviction destroy failed");
                } else {
                    remaining_idle -= 1;
                    self.state.pending.wake_next();
                }
            }
        }

        if let Some(file_idle_ttl) = pool.file_idle_ttl() {
            let claimed = containers::list_containers_for_pool(self.store.pool(), &pool.pool_id)
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|c| c.status == ContainerStatus::Claimed);
            for c in claimed {
                let elapsed = now.signed_duration_since(c.last_activity);
                if elapsed.to_std().unwrap_or_default() >= file_idle_ttl {
                    if let Some(tenant_id) = c.tenant_id.clone() {
                        let _ = self.state.auto_release_tx.send(AutoReleaseEvent {
                            pool_id: pool.pool_id.clone(),
                            tenant_id,
                            container_id: c.container_id.clone(),
                        });
                    }
                }
            }
        }

        let stats = self.get_stats().await.unwrap_or_default();
        if stats.idle < pool.min_idle {
            for _ in 0..(pool.min_idle - stats.idle) {
                if let Err(e) = self.create_idle_container().await {
                    self.record_last_error(e);
                }
            }
        }
    }

    /// Acquire algorithm.
    pub async fn acquire(&self, tenant_id: &str) -> Result<PoolContainer, BoilerhouseError> {
        let pool_id = self.pool_id();

        // 1. Idempotency.
        if let Some(existing) = containers::get_container_for_tenant(self.store.pool(), tenant_id)
        .await
        .map_err(store_err)?
        {
            if existing.pool_id == pool_id {
                return Ok(existing);
            }
        }

        if let Some(claimed) = self.try_claim_or_scale(tenant_id).await? {
            return Ok(claimed);
        }

        // 5. Capacity: enqueue and wait.
        let pool = self.pool_snapshot();
        let notify = self.state.pending.enqueue();
        let deadline = tokio::time::Instant::now() + pool.acquire_timeout();

        loop {
            match tokio::time::timeout_at(deadline, notify.notified()).await {
                Ok(()) => match self.try_claim_or_scale(tenant_id).await? {
                    Some(c) => return Ok(c),
                    None => {
                        self.state.pending.requeue_front(notify.clone());
                        continue;
                    }
                },
                Err(_) => {
                    self.state.pending.remove(&notify);
                    return Err(BoilerhouseError::AcquireTimeout {
                        pool_id,
                        tenant_id: tenant_id.to_string(),
                    });
                }
            }
        }
    }

    /// Steps 2-4 of the acquire algorithm: affinity pick, FIFO fallback
    /// pick, or scale-on-demand. Returns `None` when the pool is at
    /// capacity with no usable idle container (the caller must enqueue).
    async fn try_claim_or_scale(
        &self,
        tenant_id: &str) -> Result<Option<PoolContainer>, BoilerhouseError> {
        let pool = self.pool_snapshot();
        let now = Utc::now();

        // 2. Affinity preference.
        let affinity = containers::list_affinity_candidates(self.store.pool(), &pool.pool_id, tenant_id, now)
        .await
        .map_err(store_err)?;
        for candidate in affinity {
            if let Some(claimed) = self.claim(&candidate.container_id, tenant_id, now).await? {
                return Ok(Some(claimed));
            }
        }

        // 3. Fallback FIFO pick.
        let idle = containers::list_idle_fifo(self.store.pool(), &pool.pool_id)
        .await
        .map_err(store_err)?;
        for candidate in idle {
            if let Some(claimed) = self.claim(&candidate.container_id, tenant_id, now).await? {
                return Ok(Some(claimed));
            }
        }

        // 4. Scale on demand.
        let stats = self.get_stats().await?;
        if stats.size < pool.max_size {
            let created = self.create_idle_container().await?;
            if let Some(claimed) = self.claim(&created.container_id, tenant_id, now).await? {
                return Ok(Some(claimed));
            }
        }

        Ok(None)
    }

    async fn claim(
        &self,
        container_id: &str,
        tenant_id: &str,
        now: chrono::DateTime<Utc>) -> Result<Option<PoolContainer>, BoilerhouseError> {
        let claimed = containers::claim_idle_container(self.store.pool(), container_id, tenant_id, now)
        .await
        .map_err(store_err)?;
        if let Some(c) = &claimed {
            self.check_single_claim_invariant(tenant_id, container_id).await?;
            info!(pool_id = %c.pool_id, container_id, tenant_id, "container claimed");
        }
        Ok(claimed)
    }

    /// Post-claim invariant check: exactly
    /// one claimed row for this tenant pool-wide.
    async fn check_single_claim_invariant(
        &self,
        tenant_id: &str,
        container_id: &str) -> Result<(), BoilerhouseError> {
        let claimed_rows = containers::list_containers_for_pool(self.store.pool(), &self.pool_id())
        .await
        .map_err(store_err)?
        .into_iter()
        .filter(|c| c.tenant_id.as_deref() == Some(tenant_id))
        .count();
        if claimed_rows != 1 {
            containers::release_container(self.store.pool(), container_id, tenant_id, None, Utc::now())
            .await
            .map_err(store_err)?;
            return Err(BoilerhouseError::InvariantViolation {
                detail: format!(
                    "tenant {tenant_id} has {claimed_rows} claimed containers in pool {}",
                    self.pool_id()
                ),
            });
        }
        Ok(())
    }

    /// Release algorithm. Orchestration of the
    /// sync coordinator's `onRelease` happens one layer up (the registry),
    /// before this is called.
    pub async fn release(&self, tenant_id: &str) -> Result<(), BoilerhouseError> {
        let existing = containers::get_container_for_tenant(self.store.pool(), tenant_id)
        .await
        .map_err(store_err)?
        .filter(|c| c.pool_id == self.pool_id())
        .ok_or_else(|| BoilerhouseError::TenantNotClaimed {
            tenant_id: tenant_id.to_string(),
        })?;

        let pool = self.pool_snapshot();
        let now = Utc::now();
        let idle_expires_at = Some(now + chrono::Duration::from_std(pool.idle_timeout()).unwrap());

        containers::release_container(
            self.store.pool(),
            &existing.container_id,
            tenant_id,
            idle_expires_at,
            now)
        .await
        .map_err(store_err)?
        .ok_or_else(|| BoilerhouseError::TenantNotClaimed {
            tenant_id: tenant_id.to_string(),
        })?;

        info!(pool_id = %self.pool_id(), container_id = %existing.container_id, tenant_id, "container released");
        self.state.pending.wake_next();
        Ok(())
    }

    /// Force-destroy irrespective of state.
    pub async fn destroy_container(&self, container_id: &str) -> Result<(), BoilerhouseError> {
        let c = containers::get_container(self.store.pool(), container_id)
        .await
        .map_err(store_err)?
        .ok_or_else(|| BoilerhouseError::ContainerNotFound {
            container_id: container_id.to_string(),
        })?;
        self.force_destroy(&c).await?;
        self.state.pending.wake_next();
        Ok(())
    }

    pub async fn get_stats(&self) -> Result<PoolStats, BoilerhouseError> {
        let pool = self.pool_snapshot();
        let all = containers::list_containers_for_pool(self.store.pool(), &pool.pool_id)
        .await
        .map_err(store_err)?;
        let mut stats = PoolStats {
            max_size: pool.max_size,
            min_idle: pool.min_idle,
            pending: self.state.pending.len() as u32,
            ..Default::default()
        };
        for c in &all {
            match c.status {
                ContainerStatus::Idle => stats.idle += 1,
                ContainerStatus::Claimed => stats.claimed += 1,
                ContainerStatus::Stopping => stats.stopping += 1,
            }
        }
        stats.size = all.len() as u32;
        Ok(stats)
    }

    pub async fn get_container_for_tenant(
        &self,
        tenant_id: &str) -> Result<Option<PoolContainer>, BoilerhouseError> {
        Ok(containers::get_container_for_tenant(self.store.pool(), tenant_id)
            .await
            .map_err(store_err)?
            .filter(|c| c.pool_id == self.pool_id()))
    }

    pub async fn get_all_containers(&self) -> Result<Vec<PoolContainer>, BoilerhouseError> {
        containers::list_containers_for_pool(self.store.pool(), &self.pool_id())
        .await
        .map_err(store_err)
    }

    pub async fn get_tenants_with_claims(&self) -> Result<Vec<String>, BoilerhouseError> {
        Ok(self
            .get_all_containers()
            .await?
            .into_iter()
            .filter_map(|c| c.tenant_id)
            .collect())
    }
}

fn store_err(e: anyhow::Error) -> BoilerhouseError {
    BoilerhouseError::PersistenceFailure {
        detail: e.to_string(),
    }
}
