//! Scenario: capacity and FIFO queue. minIdle=1,
//! maxSize=2, acquireTimeoutMs scaled down for test speed. Two tenants
//! claim successfully, filling the pool; a third waits; a fourth queued
//! behind it times out while the third is served by the first release.

use std::time::Duration;

use boilerhouse_registry::PoolOverrides;
use boilerhouse_store::workloads;
use boilerhouse_testkit::{build_stack, fixtures::bare_workload};
use boilerhouse_types::BoilerhouseError;

#[tokio::test]
async fn third_claim_is_served_by_release_fourth_times_out() {
    let stack = build_stack().await.unwrap();
    let workload = bare_workload("api");
    workloads::upsert_workload(stack.store.pool(), &workload, "hash-1").await.unwrap();

    stack
    .registry
    .create_pool(
        "p1",
        "api",
        PoolOverrides {
            min_idle: Some(1),
            max_size: Some(2),
            acquire_timeout_ms: Some(300),
            ..Default::default()
    })
    .await
    .unwrap();

    let c1 = stack.registry.claim("p1", "t1").await.unwrap();
    stack.registry.claim("p1", "t2").await.unwrap();

    let registry = stack.registry.clone();
    let t3 = tokio::spawn(async move { registry.claim("p1", "t3").await });

    // t4 starts slightly after t3, both queued behind the full pool.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let registry = stack.registry.clone();
    let t4 = tokio::spawn(async move { registry.claim("p1", "t4").await });

    // Release t1's container partway through the wait window; only one
    // waiter can be served, and FIFO order means it's t3.
    tokio::time::sleep(Duration::from_millis(100)).await;
    stack.registry.release("p1", "t1", None).await.unwrap();

    let t3_result = t3.await.unwrap().unwrap();
    assert_eq!(t3_result.container_id, c1.container_id);

    let t4_result = t4.await.unwrap();
    assert!(matches!(t4_result, Err(BoilerhouseError::AcquireTimeout { .. })));
}
