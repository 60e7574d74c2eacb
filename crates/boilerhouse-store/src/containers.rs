//! CRUD and atomic lifecycle transitions for the `containers` table
//!
//! `claim_idle_container` and `release_container` are single `UPDATE ...
//! RETURNING` statements guarded by a `WHERE status = ...` predicate, the
//! same shape the outbox claim/release pair uses: the predicate makes the
//! transition a no-op (zero rows) rather than a race if another writer beat
//! us to it.

use anyhow::{Context, Result};
use boilerhouse_types::{ContainerStatus, HostPaths, PoolContainer};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

pub async fn insert_container(pool: &SqlitePool, c: &PoolContainer, runtime_id: &str) -> Result<()> {
    sqlx::query(
        r#"
            insert into containers (
            container_id, pool_id, runtime_container_id, status, tenant_id,
            last_tenant_id, last_activity, claimed_at, idle_expires_at,
            socket_path, state_dir, secrets_dir, created_at
            ) values (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#)
    .bind(&c.container_id)
    .bind(&c.pool_id)
    .bind(runtime_id)
    .bind(c.status.as_str())
    .bind(&c.tenant_id)
    .bind(&c.last_tenant_id)
    .bind(c.last_activity.to_rfc3339())
    .bind(c.claimed_at.map(|t| t.to_rfc3339()))
    .bind(c.idle_expires_at.map(|t| t.to_rfc3339()))
    .bind(&c.host_paths.socket_path)
    .bind(&c.host_paths.state_dir)
    .bind(&c.host_paths.secrets_dir)
    .bind(c.created_at.to_rfc3339())
    .execute(pool)
    .await
    .context("insert_container failed")?;
    Ok(())
}

pub async fn delete_container(pool: &SqlitePool, container_id: &str) -> Result<()> {
    sqlx::query("delete from containers where container_id = ?1")
    .bind(container_id)
    .execute(pool)
    .await
    .context("delete_container failed")?;
    Ok(())
}

pub async fn get_container(pool: &SqlitePool, container_id: &str) -> Result<Option<PoolContainer>> {
    let row = sqlx::query(&select_clause("container_id = ?1"))
    .bind(container_id)
    .fetch_optional(pool)
    .await
    .context("get_container failed")?;
    row.map(row_to_container).transpose()
}

pub async fn list_containers_for_pool(
    pool: &SqlitePool,
    pool_id: &str) -> Result<Vec<PoolContainer>> {
    let rows = sqlx::query(&format!(
        "{} order by created_at asc",
        select_clause("pool_id = ?1")
    ))
    .bind(pool_id)
    .fetch_all(pool)
    .await
    .context("list_containers_for_pool failed")?;
    rows.into_iter().map(row_to_container).collect()
}

pub async fn list_all_containers(pool: &SqlitePool) -> Result<Vec<PoolContainer>> {
    let rows = sqlx::query(&format!("{} order by pool_id, created_at asc", select_all()))
    .fetch_all(pool)
    .await
    .context("list_all_containers failed")?;
    rows.into_iter().map(row_to_container).collect()
}

pub async fn get_container_for_tenant(
    pool: &SqlitePool,
    tenant_id: &str) -> Result<Option<PoolContainer>> {
    let row = sqlx::query(&select_clause("tenant_id = ?1 and status = 'claimed'"))
    .bind(tenant_id)
    .fetch_optional(pool)
    .await
    .context("get_container_for_tenant failed")?;
    row.map(row_to_container).transpose()
}

/// List idle containers for a pool whose `last_tenant_id` matches
/// `tenant_id` and whose affinity window has not expired, most-recently
/// released first.
pub async fn list_affinity_candidates(
    pool: &SqlitePool,
    pool_id: &str,
    tenant_id: &str,
    now: DateTime<Utc>) -> Result<Vec<PoolContainer>> {
    let rows = sqlx::query(&format!(
        "{} and last_tenant_id = ?2 and idle_expires_at is not null and idle_expires_at > ?3 order by last_activity desc",
        select_clause("pool_id = ?1 and status = 'idle'")
    ))
    .bind(pool_id)
    .bind(tenant_id)
    .bind(now.to_rfc3339())
    .fetch_all(pool)
    .await
    .context("list_affinity_candidates failed")?;
    rows.into_iter().map(row_to_container).collect()
}

/// Oldest-idle-first candidate list for the fallback FIFO pick
pub async fn list_idle_fifo(pool: &SqlitePool, pool_id: &str) -> Result<Vec<PoolContainer>> {
    let rows = sqlx::query(&format!(
        "{} order by last_activity asc",
        select_clause("pool_id = ?1 and status = 'idle'")
    ))
    .bind(pool_id)
    .fetch_all(pool)
    .await
    .context("list_idle_fifo failed")?;
    rows.into_iter().map(row_to_container).collect()
}

/// Atomically transition an idle container to claimed. Returns `None` if the
/// container was not idle (lost the race to another claimant, or does not
/// exist) rather than erroring — the caller falls back to the next
/// candidate.
pub async fn claim_idle_container(
    pool: &SqlitePool,
    container_id: &str,
    tenant_id: &str,
    now: DateTime<Utc>) -> Result<Option<PoolContainer>> {
    let row = sqlx::query(&format!(
        r#"
            update containers
            set status = 'claimed',
            tenant_id = ?2,
            last_tenant_id = ?2,
            claimed_at = ?3,
            last_activity = ?3,
            idle_expires_at = null
            where container_id = ?1
            and status = 'idle'
            returning {COLS}
            "#,
        COLS = ALL_COLS))
    .bind(container_id)
    .bind(tenant_id)
    .bind(now.to_rfc3339())
    .fetch_optional(pool)
    .await
    .context("claim_idle_container failed")?;
    row.map(row_to_container).transpose()
}

/// Atomically transition a claimed container back to idle, stamping the
/// affinity window. Returns `None` if the container was not claimed by
/// `tenant_id`.
pub async fn release_container(
    pool: &SqlitePool,
    container_id: &str,
    tenant_id: &str,
    idle_expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>) -> Result<Option<PoolContainer>> {
    let row = sqlx::query(&format!(
        r#"
            update containers
            set status = 'idle',
            tenant_id = null,
            last_activity = ?3,
            idle_expires_at = ?4
            where container_id = ?1
            and tenant_id = ?2
            and status = 'claimed'
            returning {COLS}
            "#,
        COLS = ALL_COLS))
    .bind(container_id)
    .bind(tenant_id)
    .bind(now.to_rfc3339())
    .bind(idle_expires_at.map(|t| t.to_rfc3339()))
    .fetch_optional(pool)
    .await
    .context("release_container failed")?;
    row.map(row_to_container).transpose()
}

/// Mark a container `stopping` so no further claims can land on it while
/// its teardown (sync flush, runtime stop) runs. Returns `false` if it was
/// already claimed by someone else.
pub async fn mark_stopping(pool: &SqlitePool, container_id: &str) -> Result<bool> {
    let row: Option<(String)> = sqlx::query_as(
        r#"
            update containers
            set status = 'stopping'
            where container_id = ?1
            and status = 'idle'
            returning container_id
            "#)
    .bind(container_id)
    .fetch_optional(pool)
    .await
    .context("mark_stopping failed")?;
    Ok(row.is_some())
}

pub async fn runtime_container_id(pool: &SqlitePool, container_id: &str) -> Result<Option<String>> {
    let row: Option<(String)> =
    sqlx::query_as("select runtime_container_id from containers where container_id = ?1")
    .bind(container_id)
    .fetch_optional(pool)
    .await
    .context("runtime_container_id failed")?;
    Ok(row.map(|(id)| id))
}

const ALL_COLS: &str = "container_id, pool_id, status, tenant_id, last_tenant_id, \
last_activity, claimed_at, idle_expires_at, socket_path, state_dir, secrets_dir, created_at";

fn select_all() -> String {
    format!("select {ALL_COLS} from containers where 1 = 1")
}

fn select_clause(predicate: &str) -> String {
    format!("select {ALL_COLS} from containers where {predicate}")
}

fn row_to_container(row: sqlx::sqlite::SqliteRow) -> Result<PoolContainer> {
    let status: String = row.try_get("status")?;
    let last_activity: String = row.try_get("last_activity")?;
    let created_at: String = row.try_get("created_at")?;
    let claimed_at: Option<String> = row.try_get("claimed_at")?;
    let idle_expires_at: Option<String> = row.try_get("idle_expires_at")?;

    Ok(PoolContainer {
        container_id: row.try_get("container_id")?,
        pool_id: row.try_get("pool_id")?,
        status: ContainerStatus::parse(&status)
        .with_context(|| format!("unknown container status {status:?}"))?,
        tenant_id: row.try_get("tenant_id")?,
        last_tenant_id: row.try_get("last_tenant_id")?,
        last_activity: parse_rfc3339(&last_activity)?,
        claimed_at: claimed_at.as_deref().map(parse_rfc3339).transpose()?,
        idle_expires_at: idle_expires_at.as_deref().map(parse_rfc3339).transpose()?,
        host_paths: HostPaths {
            socket_path: row.try_get("socket_path")?,
            state_dir: row.try_get("state_dir")?,
            secrets_dir: row.try_get("secrets_dir")?,
        },
        created_at: parse_rfc3339(&created_at)?,
    })
}

fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("parse timestamp {s:?}"))?
        .with_timezone(&Utc))
}
