//! The remote-copy boundary: the single trait the sync coordinator (C7/C8) programs
//! against, implemented by a concrete sync tool adapter (e.g. an rclone
//! wrapper) and by the in-memory testkit fake. Contract-only — no
//! implementation lives here.

use async_trait::async_trait;
use boilerhouse_types::{Sink, SyncMapping, SyncResult};

/// One fully-resolved copy job: a single mapping, with the container path
/// interpolated against the claiming tenant, ready to hand to the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct CopyJob {
    pub tenant_id: String,
    pub container_path: String,
    pub sink: Sink,
    pub mapping: SyncMapping,
    /// Signals the executor to use resync semantics for bidirectional
    /// mappings.
    pub initial_sync: bool,
}

#[async_trait]
pub trait CopyExecutor: Send + Sync {
    /// Execute one copy job and report a structured result — never an
    /// `Err`; every outcome (success, partial failure, tool error) is a
    /// `SyncResult` so the coordinator can classify and record it.
    async fn run(&self, job: &CopyJob) -> SyncResult;
}
