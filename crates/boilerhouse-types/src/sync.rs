//! SyncStatus and SyncError: the records the sync status tracker (C7)
//! mutates and the store (C1) persists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Idle,
    Syncing,
    Error,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Syncing => "syncing",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "syncing" => Some(Self::Syncing),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Keyed by (tenant_id, sync_id). `sync_id` identifies which sync
/// configuration/workload this status belongs to — a tenant can in
/// principle be tracked against more than one sync target over its
/// lifetime, though the common case is one per claimed workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub tenant_id: String,
    pub sync_id: String,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub pending_count: i64,
    pub state: SyncState,
    pub updated_at: DateTime<Utc>,
}

impl SyncStatus {
    pub fn has_synced_before(&self) -> bool {
        self.last_sync_at.is_some()
    }
}

/// Append-only per (tenant_id, sync_id); bounded to the N most recent by
/// (timestamp, id) ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncError {
    pub id: i64,
    pub tenant_id: String,
    pub sync_id: String,
    pub message: String,
    pub mapping: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Structured result of a single copy operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResult {
    pub success: bool,
    pub bytes_transferred: Option<u64>,
    pub files_transferred: Option<u64>,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

impl SyncResult {
    pub fn ok(bytes: u64, files: u64, duration_ms: u64) -> Self {
        Self {
            success: true,
            bytes_transferred: Some(bytes),
            files_transferred: Some(files),
            errors: Vec::new(),
            duration_ms,
        }
    }

    pub fn failed(errors: Vec<String>, duration_ms: u64) -> Self {
        Self {
            success: false,
            bytes_transferred: None,
            files_transferred: None,
            errors,
            duration_ms,
        }
    }

    /// Join of the error strings, used as the single message stored in a
    /// `SyncError` row.
    pub fn error_message(&self) -> String {
        self.errors.join("; ")
    }
}

/// The two error classes the coordinator pattern-matches on for automatic
/// recovery/metrics; everything else is `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncFailureClass {
    SourceDirectoryNotFound,
    BisyncResyncRequired,
    Unknown,
}

impl SyncFailureClass {
    pub fn classify(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if lower.contains("must run --resync") || lower.contains("bisync aborted") {
            Self::BisyncResyncRequired
        } else if lower.contains("directory not found") || lower.contains("no such file or directory")
        {
            Self::SourceDirectoryNotFound
        } else {
            Self::Unknown
        }
    }
}
