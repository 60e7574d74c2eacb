//! Startup reconciliation: the runtime is the single
//! authority for container *existence*, the store is the single authority
//! for domain *state*. Recovery never trusts the store alone — it always
//! starts from what the runtime actually reports under the managed label,
//! then brings C1's `containers` rows in line, then lets the registry (C6)
//! restore pools from what remains.

use anyhow::{Context, Result};
use boilerhouse_container::ContainerManager;
use boilerhouse_registry::PoolRegistry;
use boilerhouse_runtime_api::ContainerRuntime;
use boilerhouse_store::{containers, Store};
use boilerhouse_types::{BOILERHOUSE_CONTAINER_ID_LABEL, BOILERHOUSE_MANAGED_LABEL};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of a single recovery pass, surfaced for logging and for tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Managed containers the runtime reported as not running; removed.
    pub removed_non_running: Vec<String>,
    /// `containers` rows deleted because no matching running managed
    /// container was found under that id.
    pub pruned_rows: Vec<String>,
    /// Running managed container-ids the runtime reported, kept as-is.
    pub retained: Vec<String>,
}

/// Runs the five-step reconciliation described in and
/// then hands off to the registry to restore pools.
///
/// `container_manager` is only used to reach the concrete runtime; recovery
/// talks to the runtime directly rather than through the container manager's
/// higher-level create/start/stop lifecycle, since it's reconciling records
/// the manager never created in this process.
pub async fn recover<R: ContainerRuntime + 'static>(
    store: &Store,
    container_manager: &ContainerManager<R>,
    registry: &Arc<PoolRegistry<R>>) -> Result<RecoveryReport> {
    let mut report = RecoveryReport::default();

    let mut labels = BTreeMap::new();
    labels.insert(BOILERHOUSE_MANAGED_LABEL.to_string(), "true".to_string());

    let managed = container_manager
    .runtime()
    .list_by_labels(&labels)
    .await
    .context("recovery: list_by_labels failed")?;

    let mut running_ids = HashSet::new();
    for inspect in &managed {
        let container_id = inspect.labels.get(BOILERHOUSE_CONTAINER_ID_LABEL).cloned();
        if !inspect.running {
            warn!(runtime_id = %inspect.runtime_id, "recovery: removing non-running managed container");
            if let Err(e) = container_manager.runtime().remove(&inspect.runtime_id).await {
                warn!(runtime_id = %inspect.runtime_id, error = %e, "recovery: remove failed, continuing");
            }
            if let Some(id) = container_id {
                report.removed_non_running.push(id);
            }
            continue;
        }
        if let Some(id) = container_id {
            running_ids.insert(id.clone());
            report.retained.push(id);
        } else {
            warn!(runtime_id = %inspect.runtime_id, "recovery: running managed container missing container-id label");
        }
    }

    let persisted = containers::list_all_containers(store.pool())
    .await
    .context("recovery: list_all_containers failed")?;
    for row in persisted {
        if !running_ids.contains(&row.container_id) {
            warn!(container_id = %row.container_id, "recovery: pruning stale container row");
            containers::delete_container(store.pool(), &row.container_id)
            .await
            .context("recovery: delete_container failed")?;
            report.pruned_rows.push(row.container_id);
        }
    }

    registry
    .restore_from_db()
    .await
    .context("recovery: restore_from_db failed")?;

    info!(
        removed_non_running = report.removed_non_running.len(),
        pruned_rows = report.pruned_rows.len(),
        retained = report.retained.len(),
        "recovery pass complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use boilerhouse_container::ContainerManagerConfig;
    use boilerhouse_registry::SyncCoordinator;
    use boilerhouse_runtime_api::{ContainerInspect, ContainerSpec, ExecResult, HealthState, RuntimeError};
    use boilerhouse_types::{BoilerhouseError, ContainerStatus, HostPaths, PoolContainer, Workload};
    use chrono::Utc;
    use std::sync::Mutex;
    use std::time::Duration;

    struct FakeRuntime {
        inspects: Vec<ContainerInspect>,
        removed: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl ContainerRuntime for FakeRuntime {
        async fn create(&self, _spec: &ContainerSpec) -> Result<String, RuntimeError> {
            unreachable!("recovery never creates containers")
        }
        async fn start(&self, _runtime_id: &str) -> Result<(), RuntimeError> {
            unreachable!("recovery never starts containers")
        }
        async fn stop(&self, _runtime_id: &str, _grace: Duration) -> Result<(), RuntimeError> {
            unreachable!("recovery never stops containers")
        }
        async fn remove(&self, runtime_id: &str) -> Result<(), RuntimeError> {
            self.removed.lock().unwrap().push(runtime_id.to_string());
            Ok(())
        }
        async fn inspect(&self, _runtime_id: &str) -> Result<ContainerInspect, RuntimeError> {
            unreachable!("recovery never inspects directly")
        }
        async fn exec(&self, _runtime_id: &str, _command: &[String]) -> Result<ExecResult, RuntimeError> {
            unreachable!("recovery never execs")
        }
        async fn list_by_labels(
            &self,
            _labels: &BTreeMap<String, String>) -> Result<Vec<ContainerInspect>, RuntimeError> {
            Ok(self.inspects.clone())
        }
    }

    struct NoopSync;

    #[async_trait::async_trait]
    impl SyncCoordinator for NoopSync {
        async fn on_claim(&self, _tenant_id: &str, _workload: &Workload) -> Result<(), BoilerhouseError> {
            Ok(())
        }
        async fn on_release(&self, _tenant_id: &str, _workload: &Workload) -> Result<(), BoilerhouseError> {
            Ok(())
        }
    }

    fn sample_row(container_id: &str) -> PoolContainer {
        PoolContainer {
            container_id: container_id.to_string(),
            pool_id: "pool-1".to_string(),
            status: ContainerStatus::Idle,
            tenant_id: None,
            last_tenant_id: None,
            last_activity: Utc::now(),
            claimed_at: None,
            idle_expires_at: None,
            host_paths: HostPaths {
                socket_path: format!("/run/{container_id}/app.sock"),
                state_dir: format!("/state/{container_id}"),
                secrets_dir: format!("/secrets/{container_id}"),
            },
            created_at: Utc::now(),
        }
    }

    fn inspect(container_id: &str, running: bool) -> ContainerInspect {
        let mut labels = BTreeMap::new();
        labels.insert(BOILERHOUSE_MANAGED_LABEL.to_string(), "true".to_string());
        labels.insert(BOILERHOUSE_CONTAINER_ID_LABEL.to_string(), container_id.to_string());
        ContainerInspect {
            runtime_id: format!("rt-{container_id}"),
            running,
            health: if running { HealthState::Healthy } else { HealthState::None },
            labels,
        }
    }

    #[tokio::test]
    async fn prunes_rows_with_no_matching_running_container() {
        let store = Store::open_in_memory().await.unwrap();
        containers::insert_container(store.pool(), &sample_row("c-1"), "rt-c-1")
        .await
        .unwrap();
        containers::insert_container(store.pool(), &sample_row("c-2"), "rt-c-2")
        .await
        .unwrap();
        containers::insert_container(store.pool(), &sample_row("c-3"), "rt-c-3")
        .await
        .unwrap();

        let runtime = Arc::new(FakeRuntime {
            inspects: vec![inspect("c-1", true), inspect("c-2", true)],
            removed: Mutex::new(Vec::new()),
        });
        let container_manager = ContainerManager::new(runtime, ContainerManagerConfig::default());
        let registry = PoolRegistry::new(
            store.clone(),
            Arc::new(container_manager.clone()),
            Arc::new(NoopSync));

        let report = recover(&store, &container_manager, &registry).await.unwrap();
        assert_eq!(report.pruned_rows, vec!["c-3".to_string()]);
        assert!(report.removed_non_running.is_empty());

        let remaining = containers::list_all_containers(store.pool()).await.unwrap();
        let ids: HashSet<_> = remaining.into_iter().map(|c| c.container_id).collect();
        assert_eq!(ids, HashSet::from(["c-1".to_string(), "c-2".to_string()]));
    }

    #[tokio::test]
    async fn removes_non_running_managed_containers() {
        let store = Store::open_in_memory().await.unwrap();
        containers::insert_container(store.pool(), &sample_row("c-1"), "rt-c-1")
        .await
        .unwrap();

        let runtime = Arc::new(FakeRuntime {
            inspects: vec![inspect("c-1", false)],
            removed: Mutex::new(Vec::new()),
        });
        let container_manager = ContainerManager::new(runtime.clone(), ContainerManagerConfig::default());
        let registry = PoolRegistry::new(
            store.clone(),
            Arc::new(container_manager.clone()),
            Arc::new(NoopSync));

        let report = recover(&store, &container_manager, &registry).await.unwrap();
        assert_eq!(report.removed_non_running, vec!["c-1".to_string()]);
        assert_eq!(*runtime.removed.lock().unwrap(), vec!["rt-c-1".to_string()]);

        let remaining = containers::list_all_containers(store.pool()).await.unwrap();
        assert!(remaining.is_empty());
    }
}
