//! The embedded, single-node persistent store: one
//! SQLite database holding workloads, pools, containers, sync status/errors
//! and the activity log. Every write that crosses an invariant (claim,
//! release) is a single atomic `UPDATE ... RETURNING` statement rather than
//! a read-then-write pair, so SQLite's serialized-writer guarantee is enough
//! to make the transition race-free without explicit row locking.

pub mod activity;
pub mod containers;
pub mod pools;
pub mod sync;
pub mod workloads;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

pub const ENV_DB_URL: &str = "BOILERHOUSE_DATABASE_URL";

/// Handle to the embedded store. Cheap to clone (wraps a pooled connection).
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if absent) the SQLite database at `path` and run
    /// embedded migrations.
    pub async fn open(path: &str) -> Result<Self> {
        let opts = SqliteConnectOptions::from_str(path)
        .with_context(|| format!("invalid sqlite path: {path}"))?
        .create_if_missing(true)
        .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(opts)
        .await
        .with_context(|| format!("failed to open store at {path}"))?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Open using `BOILERHOUSE_DATABASE_URL`, e.g. `sqlite:///var/lib/boilerhouse/store.db`.
    pub async fn connect_from_env() -> Result<Self> {
        let url =
        std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;
        Self::open(&url).await
    }

    /// An ephemeral in-memory store, migrated and ready to use. Used by
    /// component tests and the testkit fixtures.
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .context("failed to open in-memory store")?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
        .run(&self.pool)
        .await
        .context("store migrate failed")?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
