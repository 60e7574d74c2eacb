//! Append + bounded retention for the activity log.

use anyhow::{Context, Result};
use boilerhouse_types::{ActivityEvent, ActivityEventType, ActivityFilter, NewActivityEvent};
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

pub async fn append_event(pool: &SqlitePool, ev: &NewActivityEvent) -> Result<i64> {
    let metadata_json = ev
    .metadata
    .as_ref()
    .map(serde_json::to_string)
    .transpose()
    .context("serialize activity metadata")?;

    let row: (i64) = sqlx::query_as(
        r#"
            insert into activity_log (event_type, pool_id, container_id, tenant_id, message, metadata, timestamp)
            values (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            returning id
            "#)
    .bind(ev.event_type.as_str())
    .bind(&ev.pool_id)
    .bind(&ev.container_id)
    .bind(&ev.tenant_id)
    .bind(&ev.message)
    .bind(&metadata_json)
    .bind(Utc::now().to_rfc3339())
    .fetch_one(pool)
    .await
    .context("append_event failed")?;

    Ok(row.0)
}

/// Trim the activity log down to its `max_events` most recent rows
pub async fn trim_to(pool: &SqlitePool, max_events: u32) -> Result<u64> {
    let result = sqlx::query(
        r#"
            delete from activity_log
            where id not in (
            select id from activity_log order by timestamp desc, id desc limit ?1
            )
            "#)
    .bind(max_events as i64)
    .execute(pool)
    .await
    .context("trim activity_log failed")?;
    Ok(result.rows_affected())
}

pub async fn list_events(
    pool: &SqlitePool,
    filter: &ActivityFilter,
    limit: u32) -> Result<Vec<ActivityEvent>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "select id, event_type, pool_id, container_id, tenant_id, message, metadata, timestamp \
        from activity_log where 1 = 1");

    if let Some(event_type) = &filter.event_type {
        qb.push(" and event_type = ").push_bind(event_type.as_str());
    }
    if let Some(tenant_id) = &filter.tenant_id {
        qb.push(" and tenant_id = ").push_bind(tenant_id.clone());
    }
    if let Some(pool_id) = &filter.pool_id {
        qb.push(" and pool_id = ").push_bind(pool_id.clone());
    }
    if let Some(container_id) = &filter.container_id {
        qb.push(" and container_id = ").push_bind(container_id.clone());
    }
    qb.push(" order by timestamp desc, id desc limit ")
    .push_bind(limit as i64);

    let rows = qb
    .build()
    .fetch_all(pool)
    .await
    .context("list_events failed")?;

    rows.into_iter()
    .map(|row| {
        let event_type: String = row.try_get("event_type")?;
        let timestamp: String = row.try_get("timestamp")?;
        let metadata: Option<String> = row.try_get("metadata")?;
        Ok(ActivityEvent {
            id: row.try_get("id")?,
            event_type: parse_event_type(&event_type)?,
            pool_id: row.try_get("pool_id")?,
            container_id: row.try_get("container_id")?,
            tenant_id: row.try_get("tenant_id")?,
            message: row.try_get("message")?,
            metadata: metadata
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .context("deserialize activity metadata")?,
            timestamp: parse_rfc3339(&timestamp)?,
        })
    })
    .collect()
}

fn parse_event_type(s: &str) -> Result<ActivityEventType> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
    .with_context(|| format!("unknown activity event type {s:?}"))
}

fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("parse timestamp {s:?}"))?
        .with_timezone(&Utc))
}
