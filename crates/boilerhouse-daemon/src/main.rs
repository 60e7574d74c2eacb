//! boilerhouse-daemon entry point.
//!
//! Boots the store, runs startup recovery, restores
//! pools from what recovery leaves behind, and serves the daemon's status/
//! event surface. The container runtime and copy executor are the fakes
//! from `boilerhouse-testkit`: a real Docker driver and remote-copy backend
//! are external collaborators this workspace doesn't implement

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use boilerhouse_activity::ActivityLog;
use boilerhouse_container::{ContainerManager, ContainerManagerConfig};
use boilerhouse_daemon::{routes, state::AppState};
use boilerhouse_registry::{PoolRegistry, SyncCoordinator};
use boilerhouse_store::Store;
use boilerhouse_sync::SyncEngine;
use boilerhouse_testkit::{FakeCopyExecutor, FakeRuntime};
use boilerhouse_types::ActivityEventType;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, Level};

const ENV_ADDR: &str = "BOILERHOUSE_DAEMON_ADDR";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let store = match open_store().await {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "failed to open store");
            std::process::exit(1);
        }
    };

    let runtime = Arc::new(FakeRuntime::new());
    let container_manager = Arc::new(ContainerManager::new(runtime.clone(), ContainerManagerConfig::default()));
    let executor = Arc::new(FakeCopyExecutor::always_ok());
    let sync = SyncEngine::new(store.clone(), executor);
    let coordinator: Arc<dyn SyncCoordinator> = sync.clone();
    let registry = PoolRegistry::new(store.clone(), container_manager.clone(), coordinator);

    let report = match boilerhouse_recovery::recover(&store, &container_manager, &registry).await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "startup recovery failed");
            std::process::exit(1);
        }
    };
    info!(
        removed = report.removed_non_running.len(),
        pruned = report.pruned_rows.len(),
        retained = report.retained.len(),
        "startup recovery complete"
    );

    let activity = Arc::new(ActivityLog::new(store.clone()));
    let shared = AppState::new(store, registry, activity);

    if !report.pruned_rows.is_empty() {
        shared
        .publish(
            ActivityEventType::RecoveryPurged,
            None,
            None,
            None,
            format!("startup recovery pruned {} stale container row(s)", report.pruned_rows.len()))
        .await;
    }

    let app = routes::build_router(Arc::clone(&shared))
    .layer(
        TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO)))
    .layer(cors_localhost_only());

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8980)));
    info!("boilerhouse-daemon listening on http://{addr}");

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
    .await
    .context("server crashed")?;

    Ok(())
}

async fn open_store() -> anyhow::Result<Store> {
    let store = match std::env::var(boilerhouse_store::ENV_DB_URL) {
        Ok(_) => Store::connect_from_env().await?,
        Err(_) => Store::open("boilerhouse.db").await?,
    };
    store.migrate().await?;
    Ok(store)
}

fn init_tracing() {
    tracing_subscriber::fmt()
    .with_env_filter(
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
    .init();
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var(ENV_ADDR).ok()?.parse().ok()
}

fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
    .iter()
    .filter_map(|o| HeaderValue::from_str(o).ok())
    .collect();

    CorsLayer::new()
    .allow_origin(origins)
    .allow_methods([Method::GET])
    .allow_headers(tower_http::cors::Any)
}
