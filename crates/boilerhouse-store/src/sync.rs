//! CRUD for `sync_status` and the bounded `sync_errors` log.

use anyhow::{Context, Result};
use boilerhouse_types::{SyncError, SyncState, SyncStatus};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

pub async fn upsert_sync_status(pool: &SqlitePool, s: &SyncStatus) -> Result<()> {
    sqlx::query(
        r#"
            insert into sync_status (tenant_id, sync_id, last_sync_at, pending_count, state, updated_at)
            values (?1, ?2, ?3, ?4, ?5, ?6)
            on conflict(tenant_id, sync_id) do update set
            last_sync_at = excluded.last_sync_at,
            pending_count = excluded.pending_count,
            state = excluded.state,
            updated_at = excluded.updated_at
            "#)
    .bind(&s.tenant_id)
    .bind(&s.sync_id)
    .bind(s.last_sync_at.map(|t| t.to_rfc3339()))
    .bind(s.pending_count)
    .bind(s.state.as_str())
    .bind(s.updated_at.to_rfc3339())
    .execute(pool)
    .await
    .context("upsert_sync_status failed")?;
    Ok(())
}

pub async fn get_sync_status(
    pool: &SqlitePool,
    tenant_id: &str,
    sync_id: &str) -> Result<Option<SyncStatus>> {
    let row = sqlx::query(
        "select tenant_id, sync_id, last_sync_at, pending_count, state, updated_at \
        from sync_status where tenant_id = ?1 and sync_id = ?2")
    .bind(tenant_id)
    .bind(sync_id)
    .fetch_optional(pool)
    .await
    .context("get_sync_status failed")?;
    row.map(row_to_status).transpose()
}

pub async fn list_statuses_for_tenant(pool: &SqlitePool, tenant_id: &str) -> Result<Vec<SyncStatus>> {
    let rows = sqlx::query(
        "select tenant_id, sync_id, last_sync_at, pending_count, state, updated_at \
        from sync_status where tenant_id = ?1 order by sync_id")
    .bind(tenant_id)
    .fetch_all(pool)
    .await
    .context("list_statuses_for_tenant failed")?;
    rows.into_iter().map(row_to_status).collect()
}

pub async fn list_pending_syncs(pool: &SqlitePool) -> Result<Vec<SyncStatus>> {
    let rows = sqlx::query(
        "select tenant_id, sync_id, last_sync_at, pending_count, state, updated_at \
        from sync_status where pending_count > 0 order by updated_at asc")
    .fetch_all(pool)
    .await
    .context("list_pending_syncs failed")?;
    rows.into_iter().map(row_to_status).collect()
}

pub async fn list_error_syncs(pool: &SqlitePool) -> Result<Vec<SyncStatus>> {
    let rows = sqlx::query(
        "select tenant_id, sync_id, last_sync_at, pending_count, state, updated_at \
        from sync_status where state = 'error' order by updated_at asc")
    .fetch_all(pool)
    .await
    .context("list_error_syncs failed")?;
    rows.into_iter().map(row_to_status).collect()
}

pub async fn clear_status(pool: &SqlitePool, tenant_id: &str, sync_id: &str) -> Result<()> {
    sqlx::query("delete from sync_status where tenant_id = ?1 and sync_id = ?2")
    .bind(tenant_id)
    .bind(sync_id)
    .execute(pool)
    .await
    .context("clear_status failed")?;
    Ok(())
}

/// Clears the `sync_errors` ring for (tenant_id, sync_id) without touching
/// the `sync_status` row itself (used when a sync completes cleanly).
pub async fn clear_sync_errors(pool: &SqlitePool, tenant_id: &str, sync_id: &str) -> Result<()> {
    sqlx::query("delete from sync_errors where tenant_id = ?1 and sync_id = ?2")
    .bind(tenant_id)
    .bind(sync_id)
    .execute(pool)
    .await
    .context("clear_sync_errors failed")?;
    Ok(())
}

pub async fn clear_tenant(pool: &SqlitePool, tenant_id: &str) -> Result<()> {
    sqlx::query("delete from sync_status where tenant_id = ?1")
    .bind(tenant_id)
    .execute(pool)
    .await
    .context("clear_tenant (sync_status) failed")?;
    sqlx::query("delete from sync_errors where tenant_id = ?1")
    .bind(tenant_id)
    .execute(pool)
    .await
    .context("clear_tenant (sync_errors) failed")?;
    Ok(())
}

fn row_to_status(row: sqlx::sqlite::SqliteRow) -> Result<SyncStatus> {
    let last_sync_at: Option<String> = row.try_get("last_sync_at")?;
    let updated_at: String = row.try_get("updated_at")?;
    let state: String = row.try_get("state")?;
    Ok(SyncStatus {
        tenant_id: row.try_get("tenant_id")?,
        sync_id: row.try_get("sync_id")?,
        last_sync_at: last_sync_at.as_deref().map(parse_rfc3339).transpose()?,
        pending_count: row.try_get("pending_count")?,
        state: SyncState::parse(&state).with_context(|| format!("unknown sync state {state:?}"))?,
        updated_at: parse_rfc3339(&updated_at)?,
    })
}

/// Append one sync error, then trim the tenant/sync_id's error log down to
/// `retain` rows, newest first.
pub async fn append_sync_error(pool: &SqlitePool, e: &SyncError, retain: u32) -> Result<()> {
    let mut tx = pool.begin().await.context("begin append_sync_error")?;

    sqlx::query(
        "insert into sync_errors (tenant_id, sync_id, message, mapping, timestamp) \
        values (?1, ?2, ?3, ?4, ?5)")
    .bind(&e.tenant_id)
    .bind(&e.sync_id)
    .bind(&e.message)
    .bind(&e.mapping)
    .bind(e.timestamp.to_rfc3339())
    .execute(&mut *tx)
    .await
    .context("insert sync_error failed")?;

    sqlx::query(
        r#"
            delete from sync_errors
            where tenant_id = ?1 and sync_id = ?2
            and id not in (
            select id from sync_errors
            where tenant_id = ?1 and sync_id = ?2
            order by timestamp desc, id desc
            limit ?3
            )
            "#)
    .bind(&e.tenant_id)
    .bind(&e.sync_id)
    .bind(retain as i64)
    .execute(&mut *tx)
    .await
    .context("trim sync_errors failed")?;

    tx.commit().await.context("commit append_sync_error")?;
    Ok(())
}

pub async fn list_sync_errors(
    pool: &SqlitePool,
    tenant_id: &str,
    sync_id: &str) -> Result<Vec<SyncError>> {
    let rows = sqlx::query(
        "select id, tenant_id, sync_id, message, mapping, timestamp from sync_errors \
        where tenant_id = ?1 and sync_id = ?2 order by timestamp desc, id desc")
    .bind(tenant_id)
    .bind(sync_id)
    .fetch_all(pool)
    .await
    .context("list_sync_errors failed")?;

    rows.into_iter()
    .map(|row| {
        let timestamp: String = row.try_get("timestamp")?;
        Ok(SyncError {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            sync_id: row.try_get("sync_id")?,
            message: row.try_get("message")?,
            mapping: row.try_get("mapping")?,
            timestamp: parse_rfc3339(&timestamp)?,
        })
    })
    .collect()
}

fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("parse timestamp {s:?}"))?
        .with_timezone(&Utc))
}
