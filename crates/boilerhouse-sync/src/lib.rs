//! Sync coordinator: drives lifecycle syncs on claim/release, runs the
//! per-tenant periodic job, enforces the bounded-concurrency gate, and
//! classifies copy failures. The coordinator never talks to the pool
//! engine or the runtime directly — it is handed a `PoolContainer`
//! snapshot and a `Workload` by whatever called it (the registry, for
//! lifecycle hooks; the API layer, for `triggerSync`).

mod gate;
mod periodic;
pub mod status;

pub use gate::ConcurrencyGate;
pub use periodic::PeriodicJobs;
pub use status::{SyncTracker, DEFAULT_MAX_ERRORS_PER_SYNC};

use boilerhouse_copy_api::{CopyExecutor, CopyJob};
use boilerhouse_store::{containers, Store};
use boilerhouse_types::{
    BoilerhouseError, PoolContainer, SyncConfig, SyncDirection, SyncFailureClass, SyncMapping,
    SyncResult, Workload,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

/// Floor under any workload-specified periodic interval.
pub const DEFAULT_MIN_SYNC_INTERVAL: Duration = Duration::from_secs(30);
/// Default bounded-concurrency gate width.
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerDirection {
    Upload,
    Download,
    Both,
}

impl TriggerDirection {
    fn wants(self, direction: SyncDirection) -> bool {
        match (self, direction) {
            (Self::Both, _) => true,
            (Self::Upload, SyncDirection::Upload | SyncDirection::Bidirectional) => true,
            (Self::Download, SyncDirection::Download | SyncDirection::Bidirectional) => true,
            _ => false,
        }
    }
}

fn is_download_side(direction: SyncDirection) -> bool {
    matches!(direction, SyncDirection::Download | SyncDirection::Bidirectional)
}

fn is_upload_side(direction: SyncDirection) -> bool {
    matches!(direction, SyncDirection::Upload | SyncDirection::Bidirectional)
}

/// The sync coordinator (C8). Construct once per process and share behind
/// an `Arc` — the periodic-job tasks hold a clone of it.
pub struct SyncEngine {
    store: Store,
    executor: Arc<dyn CopyExecutor>,
    tracker: SyncTracker,
    gate: Arc<ConcurrencyGate>,
    periodic: PeriodicJobs,
    min_sync_interval: Duration,
    resync_flags: Mutex<HashSet<(String, String)>>,
}

impl SyncEngine {
    pub fn new(store: Store, executor: Arc<dyn CopyExecutor>) -> Arc<Self> {
        Self::with_config(store, executor, DEFAULT_MAX_CONCURRENT, DEFAULT_MIN_SYNC_INTERVAL)
    }

    pub fn with_config(
        store: Store,
        executor: Arc<dyn CopyExecutor>,
        max_concurrent: usize,
        min_sync_interval: Duration) -> Arc<Self> {
        let tracker = SyncTracker::new(store.clone());
        Arc::new(Self {
            store,
            executor,
            tracker,
            gate: Arc::new(ConcurrencyGate::new(max_concurrent)),
            periodic: PeriodicJobs::new(),
            min_sync_interval,
            resync_flags: Mutex::new(HashSet::new()),
        })
    }

    pub fn tracker(&self) -> &SyncTracker {
        &self.tracker
    }

    fn take_resync_flag(&self, tenant_id: &str, container_id: &str) -> bool {
        self.resync_flags
        .lock()
        .unwrap()
        .remove(&(tenant_id.to_string(), container_id.to_string()))
    }

    fn set_resync_flag(&self, tenant_id: &str, container_id: &str) {
        self.resync_flags
        .lock()
        .unwrap()
        .insert((tenant_id.to_string(), container_id.to_string()));
    }

    /// Runs one mapping through the gate and records the result
    ///
    /// `container_path` is the host-resolvable directory backing the
    /// container's synced volume; this port resolves every mapping against
    /// the container's `state_dir` (the one volume the container manager
    /// always mounts), since the workload schema does not carry a
    /// per-mapping host path of its own.
    async fn dispatch_one(
        &self,
        tenant_id: &str,
        sync_id: &str,
        container: &PoolContainer,
        cfg: &SyncConfig,
        mapping: &SyncMapping,
        initial_sync: bool) -> SyncResult {
        self.tracker
        .mark_started(tenant_id, sync_id)
        .await
        .unwrap_or_else(|e| warn!(tenant_id, sync_id, error = %e, "mark_started failed"));

        let job = CopyJob {
            tenant_id: tenant_id.to_string(),
            container_path: container.host_paths.state_dir.clone(),
            sink: cfg.sink.clone(),
            mapping: mapping.clone(),
            initial_sync,
        };

        let _permit = self.gate.acquire().await;
        let result = self.executor.run(&job).await;
        drop(_permit);

        if result.success {
            if let Err(e) = self.tracker.mark_completed(tenant_id, sync_id).await {
                warn!(tenant_id, sync_id, error = %e, "mark_completed failed");
            }
        } else {
            let message = result.error_message();
            match SyncFailureClass::classify(&message) {
                SyncFailureClass::SourceDirectoryNotFound => {
                    warn!(tenant_id, sync_id, "source directory not found on download");
                }
                SyncFailureClass::BisyncResyncRequired => {
                    self.set_resync_flag(tenant_id, &container.container_id);
                    warn!(tenant_id, sync_id, "bisync resync required; next download will resync");
                }
                SyncFailureClass::Unknown => {}
            }
            if let Err(e) = self
            .tracker
            .mark_failed(tenant_id, sync_id, &message, Some(&mapping.container_path))
            .await
            {
                warn!(tenant_id, sync_id, error = %e, "mark_failed failed");
            }
        }
        result
    }

    async fn dispatch_sequential(
        &self,
        tenant_id: &str,
        sync_id: &str,
        container: &PoolContainer,
        cfg: &SyncConfig,
        mappings: impl Iterator<Item = &SyncMapping>,
        initial_sync: bool) -> Vec<SyncResult> {
        let mut results = Vec::new();
        for mapping in mappings {
            results.push(
                self.dispatch_one(tenant_id, sync_id, container, cfg, mapping, initial_sync)
                .await);
        }
        results
    }

    /// Specification §4.C8 `onClaim`.
    pub async fn on_claim(
        &self,
        tenant_id: &str,
        container: &PoolContainer,
        workload: &Workload) -> Vec<SyncResult> {
        let Some(cfg) = &workload.sync else {
            return Vec::new();
        };
        if !cfg.policy.on_claim {
            return Vec::new();
        }
        let sync_id = &workload.id;

        let initial_sync = self.take_resync_flag(tenant_id, &container.container_id);
        let synced_before = self.tracker.has_synced_before(tenant_id, sync_id).await.unwrap_or(false);
        let results = if !initial_sync && !synced_before {
            info!(tenant_id, sync_id, "first claim with no prior sync: skipping download");
            Vec::new()
        } else {
            self.dispatch_sequential(
                tenant_id,
                sync_id,
                container,
                cfg,
                cfg.mappings.iter().filter(|m| is_download_side(m.direction)),
                initial_sync)
            .await
        };

        if let Some(interval) = cfg.policy.interval {
            self.start_periodic(tenant_id, container, workload, interval);
        }
        results
    }

    /// Specification §4.C8 `onRelease`.
    pub async fn on_release(
        &self,
        tenant_id: &str,
        container: &PoolContainer,
        workload: &Workload) -> Vec<SyncResult> {
        self.periodic.cancel(tenant_id);

        let Some(cfg) = &workload.sync else {
            return Vec::new();
        };
        if !cfg.policy.on_release {
            return Vec::new();
        }
        let sync_id = &workload.id;
        self.dispatch_sequential(
            tenant_id,
            sync_id,
            container,
            cfg,
            cfg.mappings.iter().filter(|m| is_upload_side(m.direction)),
            false)
        .await
    }

    /// Specification §4.C8 `triggerSync`.
    pub async fn trigger_sync(
        &self,
        tenant_id: &str,
        container: &PoolContainer,
        workload: &Workload,
        direction: TriggerDirection) -> Result<Vec<SyncResult>, BoilerhouseError> {
        let cfg = workload.sync.as_ref().ok_or_else(|| BoilerhouseError::SyncNotConfigured {
            tenant_id: tenant_id.to_string(),
        })?;
        if !cfg.policy.manual {
            return Ok(Vec::new());
        }
        let sync_id = &workload.id;
        Ok(self
            .dispatch_sequential(
                tenant_id,
                sync_id,
                container,
                cfg,
                cfg.mappings.iter().filter(|m| direction.wants(m.direction)),
                false)
            .await)
    }

    fn start_periodic(&self, tenant_id: &str, container: &PoolContainer, workload: &Workload, interval: Duration) {
        let effective = interval.max(self.min_sync_interval);
        let tenant_id = tenant_id.to_string();
        let sync_id = workload.id.clone();
        let cfg = match &workload.sync {
            Some(cfg) => cfg.clone(),
            None => return,
        };
        let pool_id = container.pool_id.clone();

        let store = self.store.clone();
        let executor = self.executor.clone();
        let gate = self.gate.clone();
        let tracker_store = self.store.clone();

        let handle = tokio::spawn(async move {
            let tracker = SyncTracker::new(tracker_store);
            let mut ticker = tokio::time::interval(effective);
            ticker.tick().await; // first tick fires immediately; consume it
            loop {
                ticker.tick().await;
                let current = match containers::get_container_for_tenant(store.pool(), &tenant_id).await {
                    Ok(Some(c)) if c.pool_id == pool_id => c,
                    _ => {
                        // Tenant released or reassigned; nothing left to upload.
                        return;
                    }
                };
                for mapping in cfg.mappings.iter().filter(|m| is_upload_side(m.direction)) {
                    tracker
                    .mark_started(&tenant_id, &sync_id)
                    .await
                    .unwrap_or_else(|e| warn!(tenant_id = %tenant_id, error = %e, "periodic mark_started failed"));
                    let job = CopyJob {
                        tenant_id: tenant_id.clone(),
                        container_path: current.host_paths.state_dir.clone(),
                        sink: cfg.sink.clone(),
                        mapping: mapping.clone(),
                        initial_sync: false,
                    };
                    let _permit = gate.acquire().await;
                    let result = executor.run(&job).await;
                    drop(_permit);
                    let outcome = if result.success {
                        tracker.mark_completed(&tenant_id, &sync_id).await
                    } else {
                        tracker
                        .mark_failed(&tenant_id, &sync_id, &result.error_message(), Some(&mapping.container_path))
                        .await
                    };
                    if let Err(e) = outcome {
                        warn!(tenant_id = %tenant_id, error = %e, "periodic sync status update failed");
                    }
                }
            }
        });
        self.periodic.set(&tenant_id, handle);
    }

    /// Cancels all periodic timers; does not cancel in-flight copies.
    pub fn shutdown(&self) {
        self.periodic.cancel_all();
    }
}

/// Adapter implementing the registry's generic claim/release hook against
/// this coordinator's richer, container-aware API.
#[async_trait::async_trait]
impl boilerhouse_registry::SyncCoordinator for SyncEngine {
    async fn on_claim(&self, tenant_id: &str, workload: &Workload) -> Result<(), BoilerhouseError> {
        let container = containers::get_container_for_tenant(self.store.pool(), tenant_id)
        .await
        .map_err(|e| BoilerhouseError::PersistenceFailure { detail: e.to_string() })?
        .ok_or_else(|| BoilerhouseError::TenantNotClaimed {
            tenant_id: tenant_id.to_string(),
        })?;
        SyncEngine::on_claim(self, tenant_id, &container, workload).await;
        Ok(())
    }

    async fn on_release(&self, tenant_id: &str, workload: &Workload) -> Result<(), BoilerhouseError> {
        let container = containers::get_container_for_tenant(self.store.pool(), tenant_id)
        .await
        .map_err(|e| BoilerhouseError::PersistenceFailure { detail: e.to_string() })?
        .ok_or_else(|| BoilerhouseError::TenantNotClaimed {
            tenant_id: tenant_id.to_string(),
        })?;
        SyncEngine::on_release(self, tenant_id, &container, workload).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boilerhouse_types::{ContainerStatus, HostPaths, Sink, SyncDirection, SyncMapping, SyncMode, SyncPolicy};
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedExecutor {
        calls: AtomicUsize,
        concurrent: AtomicUsize,
        max_concurrent_seen: AtomicUsize,
        fail_times: usize,
        fail_message: String,
    }

    impl ScriptedExecutor {
        fn always_ok() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                concurrent: AtomicUsize::new(0),
                max_concurrent_seen: AtomicUsize::new(0),
                fail_times: 0,
                fail_message: String::new(),
            }
        }

        fn failing(times: usize, message: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                concurrent: AtomicUsize::new(0),
                max_concurrent_seen: AtomicUsize::new(0),
                fail_times: times,
                fail_message: message.to_string(),
            }
        }
    }

    #[async_trait::async_trait]
    impl CopyExecutor for ScriptedExecutor {
        async fn run(&self, _job: &CopyJob) -> SyncResult {
            let concurrent = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_concurrent_seen.fetch_max(concurrent, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(15)).await;
            self.concurrent.fetch_sub(1, Ordering::SeqCst);
            let call_idx = self.calls.fetch_add(1, Ordering::SeqCst);
            if call_idx < self.fail_times {
                SyncResult::failed(vec![self.fail_message.clone()], 15)
            } else {
                SyncResult::ok(10, 1, 15)
            }
        }
    }

    fn sample_mapping(direction: SyncDirection) -> SyncMapping {
        SyncMapping {
            container_path: "/data".to_string(),
            pattern: None,
            sink_path: None,
            direction,
            mode: SyncMode::Sync,
        }
    }

    fn sample_workload(direction: SyncDirection, interval: Option<Duration>) -> Workload {
        boilerhouse_types::Workload {
            id: "api".to_string(),
            name: "api".to_string(),
            image: "example/api:latest".to_string(),
            command: None,
            volumes: Default::default(),
            environment: Default::default(),
            healthcheck: boilerhouse_types::HealthCheck {
                test: vec!["true".to_string()],
                interval: Duration::from_secs(1),
                timeout: Duration::from_secs(1),
                retries: 1,
                start_period: None,
            },
            deploy: Default::default(),
            security: Default::default(),
            pool: boilerhouse_types::PoolDefaults {
                min_idle: 0,
                max_size: 1,
                idle_timeout: Duration::from_secs(60),
                file_idle_ttl: None,
                networks: None,
                dns: None,
            },
            sync: Some(SyncConfig {
                sink: Sink::S3 {
                    bucket: "bucket".to_string(),
                    prefix: String::new(),
                    region: None,
                    endpoint: None,
                },
                mappings: vec![sample_mapping(direction)],
                policy: SyncPolicy {
                    on_claim: true,
                    on_release: true,
                    interval,
                    manual: true,
                },
            }),
            hooks: Default::default(),
        }
    }

    fn sample_container(pool_id: &str, container_id: &str) -> PoolContainer {
        PoolContainer {
            container_id: container_id.to_string(),
            pool_id: pool_id.to_string(),
            status: ContainerStatus::Claimed,
            tenant_id: None,
            last_tenant_id: None,
            last_activity: Utc::now(),
            claimed_at: Some(Utc::now()),
            idle_expires_at: None,
            host_paths: HostPaths {
                socket_path: format!("/run/{container_id}/app.sock"),
                state_dir: format!("/state/{container_id}"),
                secrets_dir: format!("/secrets/{container_id}"),
            },
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn first_claim_with_no_prior_sync_skips_download() {
        let store = boilerhouse_store::Store::open_in_memory().await.unwrap();
        let executor = Arc::new(ScriptedExecutor::always_ok());
        let engine = SyncEngine::new(store, executor.clone());
        let workload = sample_workload(SyncDirection::Bidirectional, None);
        let container = sample_container("pool-1", "c-1");

        let results = engine.on_claim("t-b", &container, &workload).await;
        assert!(results.is_empty());
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn claim_downloads_and_release_uploads_when_already_synced() {
        let store = boilerhouse_store::Store::open_in_memory().await.unwrap();
        let executor = Arc::new(ScriptedExecutor::always_ok());
        let engine = SyncEngine::new(store, executor.clone());
        let workload = sample_workload(SyncDirection::Bidirectional, None);
        let container = sample_container("pool-1", "c-1");

        // Simulate a prior completed sync so `hasSyncedBefore` is true.
        engine.tracker().mark_started("t-a", &workload.id).await.unwrap();
        engine.tracker().mark_completed("t-a", &workload.id).await.unwrap();

        let claimed = engine.on_claim("t-a", &container, &workload).await;
        assert_eq!(claimed.len(), 1);
        assert!(claimed[0].success);

        let released = engine.on_release("t-a", &container, &workload).await;
        assert_eq!(released.len(), 1);
        assert!(released[0].success);

        let status = engine.tracker().get_status("t-a", &workload.id).await.unwrap().unwrap();
        assert_eq!(status.pending_count, 0);
        assert!(status.last_sync_at.is_some());
    }

    #[tokio::test]
    async fn classified_failures_are_retained_and_cleared_on_success() {
        let store = boilerhouse_store::Store::open_in_memory().await.unwrap();
        let executor = Arc::new(ScriptedExecutor::failing(
            3,
            "Bisync aborted. Must run --resync to recover."));
        let engine = SyncEngine::new(store.clone(), executor.clone());
        let workload = sample_workload(SyncDirection::Upload, None);
        let container = sample_container("pool-1", "c-1");

        for _ in 0..3 {
            let result = engine
            .trigger_sync("t-a", &container, &workload, TriggerDirection::Upload)
            .await
            .unwrap();
            assert!(!result[0].success);
        }
        let status = engine.tracker().get_status("t-a", &workload.id).await.unwrap().unwrap();
        assert_eq!(status.state, boilerhouse_types::SyncState::Error);
        let errors = boilerhouse_store::sync::list_sync_errors(store.pool(), "t-a", &workload.id)
        .await
        .unwrap();
        assert_eq!(errors.len(), 3);

        let result = engine
        .trigger_sync("t-a", &container, &workload, TriggerDirection::Upload)
        .await
        .unwrap();
        assert!(result[0].success);
        let status = engine.tracker().get_status("t-a", &workload.id).await.unwrap().unwrap();
        assert_eq!(status.state, boilerhouse_types::SyncState::Idle);
        let errors = boilerhouse_store::sync::list_sync_errors(store.pool(), "t-a", &workload.id)
        .await
        .unwrap();
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn concurrency_gate_bounds_simultaneous_dispatches() {
        let store = boilerhouse_store::Store::open_in_memory().await.unwrap();
        let executor = Arc::new(ScriptedExecutor::always_ok());
        let engine = SyncEngine::with_config(store, executor.clone(), 2, Duration::from_millis(1));
        let workload = sample_workload(SyncDirection::Upload, None);
        let container = sample_container("pool-1", "c-1");

        let mut handles = Vec::new();
        for i in 0..5 {
            let engine = engine.clone();
            let workload = workload.clone();
            let container = container.clone();
            handles.push(tokio::spawn(async move {
                engine
                .trigger_sync(&format!("t-{i}"), &container, &workload, TriggerDirection::Upload)
                .await
                .unwrap()
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert!(executor.max_concurrent_seen.load(Ordering::SeqCst) <= 2);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 5);
    }
}
