//! CRUD for the `pools` table.

use anyhow::{Context, Result};
use boilerhouse_types::Pool;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

pub async fn insert_pool(pool: &SqlitePool, p: &Pool) -> Result<()> {
    let networks_json = serde_json::to_string(&p.networks).context("serialize networks")?;
    sqlx::query(
        r#"
            insert into pools (
            pool_id, workload_id, min_idle, max_size, idle_timeout_ms,
            eviction_interval_ms, acquire_timeout_ms, networks_json,
            file_idle_ttl_ms, created_at
            ) values (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#)
    .bind(&p.pool_id)
    .bind(&p.workload_id)
    .bind(p.min_idle as i64)
    .bind(p.max_size as i64)
    .bind(p.idle_timeout_ms)
    .bind(p.eviction_interval_ms)
    .bind(p.acquire_timeout_ms)
    .bind(&networks_json)
    .bind(p.file_idle_ttl_ms)
    .bind(p.created_at.to_rfc3339())
    .execute(pool)
    .await
    .context("insert_pool failed")?;
    Ok(())
}

pub async fn delete_pool(pool: &SqlitePool, pool_id: &str) -> Result<()> {
    sqlx::query("delete from pools where pool_id = ?1")
    .bind(pool_id)
    .execute(pool)
    .await
    .context("delete_pool failed")?;
    Ok(())
}

pub async fn get_pool(pool: &SqlitePool, pool_id: &str) -> Result<Option<Pool>> {
    let row = sqlx::query(
        r#"
            select pool_id, workload_id, min_idle, max_size, idle_timeout_ms,
            eviction_interval_ms, acquire_timeout_ms, networks_json,
            file_idle_ttl_ms, created_at
            from pools where pool_id = ?1
            "#)
    .bind(pool_id)
    .fetch_optional(pool)
    .await
    .context("get_pool failed")?;

    row.map(row_to_pool).transpose()
}

pub async fn list_pools(pool: &SqlitePool) -> Result<Vec<Pool>> {
    let rows = sqlx::query(
        r#"
            select pool_id, workload_id, min_idle, max_size, idle_timeout_ms,
            eviction_interval_ms, acquire_timeout_ms, networks_json,
            file_idle_ttl_ms, created_at
            from pools order by pool_id
            "#)
    .fetch_all(pool)
    .await
    .context("list_pools failed")?;

    rows.into_iter().map(row_to_pool).collect()
}

fn row_to_pool(row: sqlx::sqlite::SqliteRow) -> Result<Pool> {
    let networks_json: String = row.try_get("networks_json")?;
    let created_at: String = row.try_get("created_at")?;
    Ok(Pool {
        pool_id: row.try_get("pool_id")?,
        workload_id: row.try_get("workload_id")?,
        min_idle: row.try_get::<i64, _>("min_idle")? as u32,
        max_size: row.try_get::<i64, _>("max_size")? as u32,
        idle_timeout_ms: row.try_get("idle_timeout_ms")?,
        eviction_interval_ms: row.try_get("eviction_interval_ms")?,
        acquire_timeout_ms: row.try_get("acquire_timeout_ms")?,
        networks: serde_json::from_str(&networks_json).context("deserialize networks")?,
        file_idle_ttl_ms: row.try_get("file_idle_ttl_ms")?,
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
        .context("parse created_at")?
        .with_timezone(&Utc),
    })
}
