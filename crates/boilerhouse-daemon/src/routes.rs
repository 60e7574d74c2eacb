//! Axum router and handlers for boilerhouse-daemon.
//!
//! The daemon's own HTTP surface is deliberately small: a liveness probe, an
//! aggregate status snapshot, and an SSE feed of the activity log. The
//! claim/release API that workload owners actually call against is an
//! external collaborator, not something this process
//! serves.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::get,
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use boilerhouse_types::ActivityEvent;

use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
    .route("/healthz", get(healthz))
    .route("/v1/status", get(status))
    .route("/v1/events", get(events))
    .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    service: &'static str,
    version: &'static str,
}

async fn healthz(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
    }))
}

#[derive(Serialize)]
struct PoolStatus {
    pool_id: String,
    workload_id: String,
    idle: u32,
    claimed: u32,
    stopping: u32,
    size: u32,
    max_size: u32,
    min_idle: u32,
    pending: u32,
}

#[derive(Serialize)]
struct StatusResponse {
    service: &'static str,
    version: &'static str,
    uptime_secs: u64,
    last_event_id: i64,
    pools: Vec<PoolStatus>,
}

async fn status(State(st): State<Arc<AppState>>) -> Response {
    let pools = match boilerhouse_store::pools::list_pools(st.store.pool()).await {
        Ok(pools) => pools,
        Err(e) => {
            tracing::error!(error = %e, "status: list_pools failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "store unavailable").into_response();
        }
    };

    let mut pool_status = Vec::with_capacity(pools.len());
    for pool in pools {
        let stats = match st.registry.get_engine(&pool.pool_id) {
            Some(engine) => match engine.get_stats().await {
                Ok(stats) => stats,
                Err(e) => {
                    tracing::warn!(pool_id = %pool.pool_id, error = %e, "status: get_stats failed");
                    continue;
                }
            },
            // Persisted but not currently loaded in the registry (e.g. its
            // workload was deleted); report it with all-zero live stats.
            None => Default::default(),
        };
        pool_status.push(PoolStatus {
            pool_id: pool.pool_id,
            workload_id: pool.workload_id,
            idle: stats.idle,
            claimed: stats.claimed,
            stopping: stats.stopping,
            size: stats.size,
            max_size: stats.max_size,
            min_idle: stats.min_idle,
            pending: stats.pending,
        });
    }

    Json(StatusResponse {
        service: st.build.service,
        version: st.build.version,
        uptime_secs: st.uptime_secs(),
        last_event_id: st.last_event_id(),
        pools: pool_status,
    })
    .into_response()
}

async fn events(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let rx = st.bus.subscribe();
    Sse::new(broadcast_to_sse(rx)).keep_alive(KeepAlive::new())
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<ActivityEvent>) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(ev) => {
                let data = serde_json::to_string(&ev).ok()?;
                Some(Ok(Event::default().event(ev.event_type.as_str()).data(data)))
            }
            // Receiver lagged behind the bus's ring buffer; drop and keep
            // streaming rather than closing the connection.
            Err(_) => None,
        }
    })
}
