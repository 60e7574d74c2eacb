//! In-memory fakes and fixtures shared by scenario tests across the
//! workspace. Deterministic, no randomness, no real I/O: a container
//! runtime and a copy executor, both scriptable, plus the workload/
//! container fixtures every scenario test builds on.

pub mod copy;
pub mod fixtures;
pub mod runtime;

pub use copy::FakeCopyExecutor;
pub use runtime::FakeRuntime;

use boilerhouse_container::{ContainerManager, ContainerManagerConfig};
use boilerhouse_registry::{PoolRegistry, SyncCoordinator};
use boilerhouse_store::Store;
use boilerhouse_sync::SyncEngine;
use std::sync::Arc;

/// Opens an ephemeral, migrated, in-memory store — the fixture every
/// scenario test starts from.
pub async fn ephemeral_store() -> anyhow::Result<Store> {
    Store::open_in_memory().await
}

/// Wires a full in-memory stack: store, fake runtime, fake copy executor,
/// a [`SyncEngine`] as the registry's [`SyncCoordinator`], and the
/// registry itself. This is the stack every end-to-end scenario test
/// drives claim/release through.
pub struct TestStack {
    pub store: Store,
    pub runtime: Arc<FakeRuntime>,
    pub executor: Arc<FakeCopyExecutor>,
    pub sync: Arc<SyncEngine>,
    pub registry: Arc<PoolRegistry<FakeRuntime>>,
}

pub async fn build_stack() -> anyhow::Result<TestStack> {
    build_stack_with_executor(Arc::new(FakeCopyExecutor::always_ok())).await
}

pub async fn build_stack_with_executor(executor: Arc<FakeCopyExecutor>) -> anyhow::Result<TestStack> {
    let store = ephemeral_store().await?;
    let runtime = Arc::new(FakeRuntime::new());
    let container_manager = Arc::new(ContainerManager::new(runtime.clone(), ContainerManagerConfig::default()));
    let copy_executor: Arc<dyn boilerhouse_copy_api::CopyExecutor> = executor.clone();
    let sync = SyncEngine::new(store.clone(), copy_executor);
    let coordinator: Arc<dyn SyncCoordinator> = sync.clone();
    let registry = PoolRegistry::new(store.clone(), container_manager, coordinator);
    Ok(TestStack {
        store,
        runtime,
        executor,
        sync,
        registry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use boilerhouse_registry::PoolOverrides;
    use boilerhouse_store::workloads;
    use boilerhouse_types::SyncDirection;
    use fixtures::{bare_workload, workload_with_sync};
    use std::time::Duration;

    #[tokio::test]
    async fn warm_acquire_with_affinity() {
        let stack = build_stack().await.unwrap();
        let workload = bare_workload("api");
        workloads::upsert_workload(stack.store.pool(), &workload, "hash-1").await.unwrap();

        let overrides = PoolOverrides {
            min_idle: Some(2),
            max_size: Some(5),
            ..Default::default()
        };
        stack.registry.create_pool("p1", "api", overrides).await.unwrap();

        let first = stack.registry.claim("p1", "t-a").await.unwrap();
        stack.registry.release("p1", "t-a", None).await.unwrap();
        let second = stack.registry.claim("p1", "t-a").await.unwrap();

        assert_eq!(first.container_id, second.container_id);
    }

    #[tokio::test]
    async fn sync_on_claim_downloads_on_release_uploads() {
        let executor = Arc::new(FakeCopyExecutor::always_ok());
        let stack = build_stack_with_executor(executor.clone()).await.unwrap();
        let workload = workload_with_sync("api", SyncDirection::Bidirectional, None);
        workloads::upsert_workload(stack.store.pool(), &workload, "hash-1").await.unwrap();

        stack
            .registry
            .create_pool(
                "p1",
                "api",
                PoolOverrides {
                    min_idle: Some(1),
                    max_size: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        // Seed a prior completed sync so the first-claim guard doesn't skip.
        stack.sync.tracker().mark_started("t-a", "api").await.unwrap();
        stack.sync.tracker().mark_completed("t-a", "api").await.unwrap();

        stack.registry.claim("p1", "t-a").await.unwrap();
        stack.registry.release("p1", "t-a", None).await.unwrap();

        assert_eq!(executor.call_count(), 2);
        let status = stack.sync.tracker().get_status("t-a", "api").await.unwrap().unwrap();
        assert_eq!(status.pending_count, 0);
    }

    #[tokio::test]
    async fn recovery_prunes_rows_the_runtime_no_longer_reports() {
        let stack = build_stack().await.unwrap();
        let workload = bare_workload("api");
        workloads::upsert_workload(stack.store.pool(), &workload, "hash-1").await.unwrap();

        boilerhouse_store::containers::insert_container(
            stack.store.pool(),
            &fixtures::idle_container("p1", "ghost"),
            "rt-ghost",
        )
        .await
        .unwrap();

        let container_manager = ContainerManager::new(stack.runtime.clone(), ContainerManagerConfig::default());
        let report = boilerhouse_recovery::recover(&stack.store, &container_manager, &stack.registry)
            .await
            .unwrap();

        assert_eq!(report.pruned_rows, vec!["ghost".to_string()]);
        let remaining = boilerhouse_store::containers::list_all_containers(stack.store.pool()).await.unwrap();
        assert!(remaining.is_empty());
    }
}
