//! Sync status tracker. A thin, stateless wrapper
//! over the store's `sync_status`/`sync_errors` tables — C1 is the single
//! source of truth, this module only owns the transition rules.

use boilerhouse_store::{sync as sync_store, Store};
use boilerhouse_types::{SyncError, SyncState, SyncStatus};
use chrono::Utc;

/// Default bound on `sync_errors` rows kept per (tenant, sync_id).
pub const DEFAULT_MAX_ERRORS_PER_SYNC: u32 = 10;

pub struct SyncTracker {
    store: Store,
    max_errors_per_sync: u32,
}

impl SyncTracker {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            max_errors_per_sync: DEFAULT_MAX_ERRORS_PER_SYNC,
        }
    }

    pub fn with_max_errors(store: Store, max_errors_per_sync: u32) -> Self {
        Self {
            store,
            max_errors_per_sync,
        }
    }

    async fn load_or_default(&self, tenant_id: &str, sync_id: &str) -> anyhow::Result<SyncStatus> {
        Ok(sync_store::get_sync_status(self.store.pool(), tenant_id, sync_id)
            .await?
            .unwrap_or_else(|| SyncStatus {
                tenant_id: tenant_id.to_string(),
                sync_id: sync_id.to_string(),
                last_sync_at: None,
                pending_count: 0,
                state: SyncState::Idle,
                updated_at: Utc::now(),
        }))
    }

    /// Increments `pending_count`, sets `state=syncing`, upserts the row.
    pub async fn mark_started(&self, tenant_id: &str, sync_id: &str) -> anyhow::Result<()> {
        let mut status = self.load_or_default(tenant_id, sync_id).await?;
        status.pending_count += 1;
        status.state = SyncState::Syncing;
        status.updated_at = Utc::now();
        sync_store::upsert_sync_status(self.store.pool(), &status).await
    }

    /// Decrements `pending_count` (floor 0); at zero, state becomes `idle`,
    /// `last_sync_at` is stamped, and the error ring is cleared.
    pub async fn mark_completed(&self, tenant_id: &str, sync_id: &str) -> anyhow::Result<()> {
        let mut status = self.load_or_default(tenant_id, sync_id).await?;
        status.pending_count = (status.pending_count - 1).max(0);
        let now = Utc::now();
        status.updated_at = now;
        if status.pending_count == 0 {
            status.state = SyncState::Idle;
            status.last_sync_at = Some(now);
        }
        sync_store::upsert_sync_status(self.store.pool(), &status).await?;
        if status.pending_count == 0 {
            sync_store::clear_sync_errors(self.store.pool(), tenant_id, sync_id).await?;
        }
        Ok(())
    }

    /// Decrements `pending_count`, sets `state=error`, appends a trimmed
    /// `sync_errors` row.
    pub async fn mark_failed(
        &self,
        tenant_id: &str,
        sync_id: &str,
        message: &str,
        mapping: Option<&str>) -> anyhow::Result<()> {
        let mut status = self.load_or_default(tenant_id, sync_id).await?;
        status.pending_count = (status.pending_count - 1).max(0);
        status.state = SyncState::Error;
        status.updated_at = Utc::now();
        sync_store::upsert_sync_status(self.store.pool(), &status).await?;

        let error = SyncError {
            id: 0,
            tenant_id: tenant_id.to_string(),
            sync_id: sync_id.to_string(),
            message: message.to_string(),
            mapping: mapping.map(str::to_string),
            timestamp: Utc::now(),
        };
        sync_store::append_sync_error(self.store.pool(), &error, self.max_errors_per_sync).await
    }

    pub async fn get_status(&self, tenant_id: &str, sync_id: &str) -> anyhow::Result<Option<SyncStatus>> {
        sync_store::get_sync_status(self.store.pool(), tenant_id, sync_id).await
    }

    pub async fn get_statuses_for_tenant(&self, tenant_id: &str) -> anyhow::Result<Vec<SyncStatus>> {
        sync_store::list_statuses_for_tenant(self.store.pool(), tenant_id).await
    }

    pub async fn clear_status(&self, tenant_id: &str, sync_id: &str) -> anyhow::Result<()> {
        sync_store::clear_status(self.store.pool(), tenant_id, sync_id).await
    }

    pub async fn clear_tenant(&self, tenant_id: &str) -> anyhow::Result<()> {
        sync_store::clear_tenant(self.store.pool(), tenant_id).await
    }

    pub async fn get_pending_syncs(&self) -> anyhow::Result<Vec<SyncStatus>> {
        sync_store::list_pending_syncs(self.store.pool()).await
    }

    pub async fn get_error_syncs(&self) -> anyhow::Result<Vec<SyncStatus>> {
        sync_store::list_error_syncs(self.store.pool()).await
    }

    pub async fn has_synced_before(&self, tenant_id: &str, sync_id: &str) -> anyhow::Result<bool> {
        Ok(self
            .get_status(tenant_id, sync_id)
            .await?
            .map(|s| s.has_synced_before())
            .unwrap_or(false))
    }
}
