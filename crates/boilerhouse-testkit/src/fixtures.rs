//! Workload and container fixture builders shared across scenario tests.

use boilerhouse_types::{
    ContainerStatus, Deploy, HealthCheck, HostPaths, PoolContainer, PoolDefaults, SecurityPosture,
    Sink, SyncConfig, SyncDirection, SyncMapping, SyncMode, SyncPolicy, Workload,
};
use chrono::Utc;
use std::collections::BTreeMap;
use std::time::Duration;

/// A minimal valid workload with no sync configuration, suitable for pool
/// and recovery scenarios that don't exercise C7/C8.
pub fn bare_workload(id: &str) -> Workload {
    Workload {
        id: id.to_string(),
        name: id.to_string(),
        image: "example/app:latest".to_string(),
        command: None,
        volumes: Default::default(),
        environment: BTreeMap::new(),
        healthcheck: HealthCheck {
            test: vec!["true".to_string()],
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(1),
            retries: 1,
            start_period: None,
        },
        deploy: Deploy::default(),
        security: SecurityPosture::default(),
        pool: PoolDefaults {
            min_idle: 0,
            max_size: 1,
            idle_timeout: Duration::from_secs(60),
            file_idle_ttl: None,
            networks: None,
            dns: None,
        },
        sync: None,
        hooks: Default::default(),
    }
}

/// A workload with a single bidirectional sync mapping against an S3-shaped
/// sink, matching the "sync on claim downloads, on release uploads"
/// scenario.
pub fn workload_with_sync(id: &str, direction: SyncDirection, interval: Option<Duration>) -> Workload {
    let mut w = bare_workload(id);
    w.sync = Some(SyncConfig {
        sink: Sink::S3 {
            bucket: "test-bucket".to_string(),
            prefix: String::new(),
            region: None,
            endpoint: None,
        },
        mappings: vec![SyncMapping {
            container_path: "/data".to_string(),
            pattern: None,
            sink_path: None,
            direction,
            mode: SyncMode::Sync,
        }],
        policy: SyncPolicy {
            on_claim: true,
            on_release: true,
            interval,
            manual: true,
        },
    });
    w
}

/// A bare idle `PoolContainer` row, as recovery and pool-engine scenarios
/// need to seed the store directly.
pub fn idle_container(pool_id: &str, container_id: &str) -> PoolContainer {
    PoolContainer {
        container_id: container_id.to_string(),
        pool_id: pool_id.to_string(),
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
