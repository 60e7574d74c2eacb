//! Scenario: idle eviction respects minIdle. minIdle=2,
//! maxSize=5, idleTimeoutMs/evictionIntervalMs scaled down for test speed.
//! Pre-warm brings the pool to 2 idle containers; a claim+release cycle
//! creates no new container; after the idle timeout elapses the floor of
//! 2 idle containers still holds.

use std::time::Duration;

use boilerhouse_registry::PoolOverrides;
use boilerhouse_store::workloads;
use boilerhouse_testkit::{build_stack, fixtures::bare_workload};
use boilerhouse_types::ContainerStatus;

#[tokio::test]
async fn min_idle_floor_survives_eviction_sweep() {
    let stack = build_stack().await.unwrap();
    let workload = bare_workload("api");
    workloads::upsert_workload(stack.store.pool(), &workload, "hash-1").await.unwrap();

    stack
    .registry
    .create_pool(
        "p1",
        "api",
        PoolOverrides {
            min_idle: Some(2),
            max_size: Some(5),
            idle_timeout_ms: Some(150),
            eviction_interval_ms: Some(30),
            ..Default::default()
    })
    .await
    .unwrap();

    // Pre-warm runs on pool start; give it a moment to create the floor.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let idle_count = |containers: &[boilerhouse_types::PoolContainer]| {
        containers.iter().filter(|c| c.status == ContainerStatus::Idle).count()
    };
    let containers = stack.registry.list_containers_info().await.unwrap();
    assert_eq!(idle_count(&containers), 2);

    let claimed = stack.registry.claim("p1", "t-a").await.unwrap();
    stack.registry.release("p1", "t-a", None).await.unwrap();

    let containers = stack.registry.list_containers_info().await.unwrap();
    assert_eq!(containers.len(), 2, "claim+release of an existing idle container creates no new one");
    assert!(containers.iter().any(|c| c.container_id == claimed.container_id));

    // Wait past the idle timeout and several eviction sweeps.
    tokio::time::sleep(Duration::from_millis(300)).await;

    let containers = stack.registry.list_containers_info().await.unwrap();
    assert_eq!(idle_count(&containers), 2, "eviction never drops idle count below minIdle");
}
