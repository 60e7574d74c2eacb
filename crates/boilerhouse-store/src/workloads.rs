//! Persisted Workload specs, keyed by id. Restored on daemon boot so the
//! registry (C6) can rebuild pools without re-reading the YAML files that
//! registered them originally.

use anyhow::{Context, Result};
use boilerhouse_types::Workload;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

pub async fn upsert_workload(
    pool: &SqlitePool,
    workload: &Workload,
    config_hash: &str,
) -> Result<()> {
    let spec_json = serde_json::to_string(workload).context("serialize workload")?;
    sqlx::query(
        r#"
        insert into workloads (id, spec_json, config_hash, registered_at)
        values (?1, ?2, ?3, ?4)
        on conflict(id) do update set
            spec_json = excluded.spec_json,
            config_hash = excluded.config_hash
        "#,
    )
    .bind(&workload.id)
    .bind(&spec_json)
    .bind(config_hash)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await
    .context("upsert_workload failed")?;
    Ok(())
}

pub async fn get_workload(pool: &SqlitePool, workload_id: &str) -> Result<Option<Workload>> {
    let row = sqlx::query("select spec_json from workloads where id = ?1")
        .bind(workload_id)
        .fetch_optional(pool)
        .await
        .context("get_workload failed")?;
    match row {
        Some(row) => {
            let spec_json: String = row.try_get("spec_json")?;
            Ok(Some(
                serde_json::from_str(&spec_json).context("deserialize workload")?,
            ))
        }
        None => Ok(None),
    }
}

pub async fn list_workloads(pool: &SqlitePool) -> Result<Vec<Workload>> {
    let rows = sqlx::query("select spec_json from workloads order by id")
        .fetch_all(pool)
        .await
        .context("list_workloads failed")?;
    rows.iter()
        .map(|row| {
            let spec_json: String = row.try_get("spec_json")?;
            serde_json::from_str(&spec_json).context("deserialize workload")
        })
        .collect()
}
