//! Scenario: the daemon's own HTTP surface — `/healthz`, `/v1/status`, and
//! the `/v1/events` SSE feed — reflects live pool state without exposing
//! the claim/release API.

use std::sync::Arc;

use axum::http::{Request, StatusCode};
use boilerhouse_activity::ActivityLog;
use boilerhouse_daemon::{routes, state::AppState};
use boilerhouse_registry::PoolOverrides;
use boilerhouse_store::workloads;
use boilerhouse_testkit::{build_stack, fixtures::bare_workload};
use http_body_util::BodyExt;
use tower::ServiceExt;

async fn call(router: axum::Router, req: Request<axum::body::Body>) -> (StatusCode, bytes::Bytes) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let body = resp.into_body().collect().await.expect("body collect failed").to_bytes();
    (status, body)
}

fn parse_json(b: bytes::Bytes) -> serde_json::Value {
    serde_json::from_slice(&b).expect("body is not valid JSON")
}

#[tokio::test]
async fn healthz_reports_ok() {
    let stack = build_stack().await.unwrap();
    let activity = Arc::new(ActivityLog::new(stack.store.clone()));
    let st = AppState::new(stack.store, stack.registry, activity);

    let req = Request::builder().uri("/healthz").body(axum::body::Body::empty()).unwrap();
    let (status, body) = call(routes::build_router(st), req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(body)["ok"], true);
}

#[tokio::test]
async fn status_reflects_live_pool_stats() {
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
            max_size: Some(4),
            ..Default::default()
    })
    .await
    .unwrap();

    let activity = Arc::new(ActivityLog::new(stack.store.clone()));
    let st = AppState::new(stack.store, stack.registry, activity);

    let req = Request::builder().uri("/v1/status").body(axum::body::Body::empty()).unwrap();
    let (status, body) = call(routes::build_router(st), req).await;

    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    let pools = json["pools"].as_array().unwrap();
    assert_eq!(pools.len(), 1);
    assert_eq!(pools[0]["pool_id"], "p1");
    assert_eq!(pools[0]["max_size"], 4);
}

#[tokio::test]
async fn recovery_purge_is_published_as_an_activity_event() {
    let stack = build_stack().await.unwrap();
    boilerhouse_store::containers::insert_container(
        stack.store.pool(),
        &boilerhouse_testkit::fixtures::idle_container("p1", "ghost"),
        "rt-ghost")
    .await
    .unwrap();

    let container_manager =
    boilerhouse_container::ContainerManager::new(stack.runtime.clone(), boilerhouse_container::ContainerManagerConfig::default());
    let report = boilerhouse_recovery::recover(&stack.store, &container_manager, &stack.registry).await.unwrap();
    assert_eq!(report.pruned_rows, vec!["ghost".to_string()]);

    let activity = Arc::new(ActivityLog::new(stack.store.clone()));
    let st = AppState::new(stack.store.clone(), stack.registry, activity);
    st.publish(
        boilerhouse_types::ActivityEventType::RecoveryPurged,
        None,
        None,
        None,
        "startup recovery pruned 1 stale container row(s)")
    .await;

    let events =
    boilerhouse_store::activity::list_events(stack.store.pool(), &Default::default(), 10).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, boilerhouse_types::ActivityEventType::RecoveryPurged);
}
